mod availability;
mod error;
mod mutations;
mod queries;
mod rating;
mod search;
mod store;

pub use availability::{check_bookable, check_no_approved_overlap, free_ranges, is_bookable};
pub use error::{EngineError, Entity, ErrorKind};
pub use mutations::{NewProperty, PropertyPatch};
pub use rating::average_rating;
pub use search::{SearchFilter, fold_key};
pub use store::{Store, email_key};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedPropertyState = Arc<RwLock<PropertyState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Each wake-up takes the first append plus everything already
/// queued behind it, writes the batch, and fsyncs once.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let mut batch: Vec<Pending> = Vec::new();
        let mut deferred = None;
        match cmd {
            WalCommand::Append { event, response } => batch.push((event, response)),
            other => deferred = Some(other),
        }
        while deferred.is_none() {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => deferred = Some(other),
                Err(_) => break,
            }
        }
        if !batch.is_empty() {
            commit_batch(&mut wal, batch);
        }
        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
    tracing::debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, batch: Vec<Pending>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut result = Ok(());
    for (event, _) in &batch {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    // Flush even after a failed append so half-written bytes do not leak
    // into the next batch.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    if let Err(e) = &result {
        tracing::error!("WAL batch of {} failed: {e}", batch.len());
    }
    for (_, tx) in batch {
        let reply = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched"),
    }
}

/// The marketplace engine: store, WAL, and the locks that keep check-then-act
/// sequences atomic.
pub struct Engine {
    pub store: Store,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Serialises the email-uniqueness check with user inserts and edits.
    pub(super) users_lock: Mutex<()>,
    /// Mutations hold it shared; compaction holds it exclusively so the
    /// snapshot it writes cannot miss an in-flight event.
    pub(super) write_gate: RwLock<()>,
}

impl Engine {
    /// Open (or create) the WAL at `wal_path`, replay it, and start the writer.
    /// Must be called inside a tokio runtime.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Store::from_events(&events);
        tracing::info!(
            events = events.len(),
            users = store.user_count(),
            properties = store.property_count(),
            "engine state replayed"
        );
        Ok(Self {
            store,
            wal_tx,
            users_lock: Mutex::new(()),
            write_gate: RwLock::new(()),
        })
    }

    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply to the locked property.
    pub(super) async fn persist_and_apply(
        &self,
        ps: &mut PropertyState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_event(ps, event);
        Ok(())
    }

    /// Write-lock a property, re-checking after the wait that it was not
    /// deleted while we queued for the lock.
    pub(super) async fn lock_property(
        &self,
        id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<PropertyState>, EngineError> {
        let state = self
            .store
            .property(id)
            .ok_or(EngineError::NotFound(Entity::Property, *id))?;
        let guard = state.write_owned().await;
        if !self.store.contains_property(id) {
            return Err(EngineError::NotFound(Entity::Property, *id));
        }
        Ok(guard)
    }

    /// Resolve reservation → property and write-lock that property.
    pub(super) async fn lock_reservation(
        &self,
        reservation_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<PropertyState>, EngineError> {
        let not_found = EngineError::NotFound(Entity::Reservation, *reservation_id);
        let property_id = self
            .store
            .property_for_reservation(reservation_id)
            .ok_or(not_found)?;
        match self.lock_property(&property_id).await {
            Ok(guard) if guard.reservation(reservation_id).is_some() => Ok(guard),
            _ => Err(EngineError::NotFound(Entity::Reservation, *reservation_id)),
        }
    }
}
