use ulid::Ulid;

use crate::model::{Day, Role};

/// Which collection an id failed to resolve in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Property,
    Reservation,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::User => "user",
            Entity::Property => "property",
            Entity::Reservation => "reservation",
        })
    }
}

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Invalid(&'static str),
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: Day, end: Day },
    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),
    #[error("dates fall outside the property's availability window")]
    OutsideWindow,
    #[error("user {user} is not a {}", .expected.as_str())]
    WrongRole { user: Ulid, expected: Role },
    #[error("user {0} does not own this property")]
    NotOwner(Ulid),
    #[error("user {0} did not make this reservation")]
    NotRenter(Ulid),
    #[error("a stay can only be reviewed after it has ended")]
    StayNotEnded,
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("{0} not found: {1}")]
    NotFound(Entity, Ulid),
    #[error("no user registered with that email")]
    EmailNotFound,

    #[error("email already registered")]
    EmailTaken,
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("conflict with approved reservation: {0}")]
    Conflict(Ulid),
    #[error("reservation {0} has already been reviewed")]
    AlreadyReviewed(Ulid),
    #[error("reservation {0} has already been decided")]
    AlreadyDecided(Ulid),

    #[error("WAL error: {0}")]
    WalError(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Invalid(_)
            | EngineError::InvalidRange { .. }
            | EngineError::InvalidRating(_)
            | EngineError::OutsideWindow
            | EngineError::WrongRole { .. }
            | EngineError::NotOwner(_)
            | EngineError::NotRenter(_)
            | EngineError::StayNotEnded
            | EngineError::LimitExceeded(_) => ErrorKind::Validation,
            EngineError::NotFound(..) | EngineError::EmailNotFound => ErrorKind::NotFound,
            EngineError::EmailTaken
            | EngineError::AlreadyExists(_)
            | EngineError::Conflict(_)
            | EngineError::AlreadyReviewed(_)
            | EngineError::AlreadyDecided(_) => ErrorKind::Conflict,
            EngineError::WalError(_) => ErrorKind::Internal,
        }
    }

    /// Short machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Invalid(_) => "INVALID",
            EngineError::InvalidRange { .. } => "INVALID_RANGE",
            EngineError::InvalidRating(_) => "INVALID_RATING",
            EngineError::OutsideWindow => "OUTSIDE_WINDOW",
            EngineError::WrongRole { .. } => "WRONG_ROLE",
            EngineError::NotOwner(_) => "NOT_OWNER",
            EngineError::NotRenter(_) => "NOT_RENTER",
            EngineError::StayNotEnded => "STAY_NOT_ENDED",
            EngineError::LimitExceeded(_) => "LIMIT_EXCEEDED",
            EngineError::NotFound(..) | EngineError::EmailNotFound => "NOT_FOUND",
            EngineError::EmailTaken => "EMAIL_TAKEN",
            EngineError::AlreadyExists(_) => "ALREADY_EXISTS",
            EngineError::Conflict(_) => "BOOKING_CONFLICT",
            EngineError::AlreadyReviewed(_) => "ALREADY_REVIEWED",
            EngineError::AlreadyDecided(_) => "ALREADY_DECIDED",
            EngineError::WalError(_) => "INTERNAL_ERROR",
        }
    }
}
