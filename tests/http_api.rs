use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::ServiceExt;
use ulid::Ulid;

use rentd::engine::Engine;
use rentd::http::{AppState, create_router};
use rentd::model::Day;

// ── Test infrastructure ──────────────────────────────────────

struct TestApp {
    router: Router,
    today: Arc<Mutex<Day>>,
}

fn day(s: &str) -> Day {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn test_app() -> TestApp {
    let dir = std::env::temp_dir().join(format!("rentd_http_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let engine = Arc::new(Engine::new(dir.join("rentd.wal")).unwrap());

    let today = Arc::new(Mutex::new(day("2025-05-01")));
    let clock_today = today.clone();
    let state = AppState::new(engine).with_clock(Arc::new(move || *clock_today.lock().unwrap()));
    TestApp {
        router: create_router(state),
        today,
    }
}

impl TestApp {
    fn set_today(&self, s: &str) {
        *self.today.lock().unwrap() = day(s);
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.raw(req).await
    }

    async fn raw(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body)).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(body)).await
    }

    async fn register(&self, name: &str, email: &str, user_type: &str) -> String {
        let (status, body) = self
            .post(
                "/auth/register",
                json!({"name": name, "email": email, "user_type": user_type}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["user_id"].as_str().unwrap().to_string()
    }

    async fn create_property(&self, owner_id: &str, city: &str, price: f64) -> String {
        let (status, body) = self
            .post(
                "/locador/properties",
                json!({
                    "title": format!("Casa em {city}"),
                    "description": "perto da praia",
                    "address": format!("Rua das Flores, 12, {city}"),
                    "city": city,
                    "price_per_day": price,
                    "available_from": "2025-04-10",
                    "available_until": "2025-12-31",
                    "owner_id": owner_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["property_id"].as_str().unwrap().to_string()
    }

    async fn reserve(&self, property_id: &str, renter_id: &str, start: &str, end: &str) -> (StatusCode, Value) {
        self.post(
            "/locatario/reserve",
            json!({
                "property_id": property_id,
                "renter_id": renter_id,
                "start_date": start,
                "end_date": end,
            }),
        )
        .await
    }
}

// ── Flows ────────────────────────────────────────────────────

#[tokio::test]
async fn booking_flow_over_http() {
    let app = test_app();
    let owner = app.register("Olga", "olga@example.com", "locador").await;
    let renter = app.register("Rita", "rita@example.com", "locatario").await;
    let property = app.create_property(&owner, "São Paulo", 150.0).await;

    let (status, body) = app.reserve(&property, &renter, "2025-05-01", "2025-05-05").await;
    assert_eq!(status, StatusCode::CREATED);
    let first = body["reservation_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(&format!("/locador/reservation/{first}"), json!({"approved": true, "owner_id": owner}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, body) = app.reserve(&property, &renter, "2025-05-03", "2025-05-04").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "BOOKING_CONFLICT");

    let (status, _) = app.reserve(&property, &renter, "2025-06-01", "2025-06-05").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get(&format!("/locador/reservations/{owner}")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["renter_name"] == "Rita"));

    let (status, body) = app.get(&format!("/locador/properties/{owner}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["reservation_count"], 2);
    assert_eq!(body[0]["average_rating"], Value::Null);
    assert_eq!(body[0]["available_from"], "2025-04-10");
}

#[tokio::test]
async fn review_only_after_stay() {
    let app = test_app();
    let owner = app.register("Olga", "olga@example.com", "locador").await;
    let renter = app.register("Rita", "rita@example.com", "locatario").await;
    let property = app.create_property(&owner, "Recife", 150.0).await;
    let (_, body) = app.reserve(&property, &renter, "2025-05-01", "2025-05-05").await;
    let reservation = body["reservation_id"].as_str().unwrap().to_string();

    let review = json!({
        "reservation_id": reservation,
        "rating": 5,
        "comment": "ótimo",
        "renter_id": renter,
    });

    app.set_today("2025-05-05");
    let (status, body) = app.post("/locatario/review", review.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "STAY_NOT_ENDED");

    app.set_today("2025-05-06");
    let (status, body) = app.post("/locatario/review", review.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["review_id"].is_string());

    let (status, body) = app.post("/locatario/review", review).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_REVIEWED");

    let (_, body) = app.get(&format!("/locatario/property/{property}/reviews")).await;
    assert_eq!(body, json!([{"rating": 5, "comment": "ótimo", "renter_name": "Rita"}]));

    let (_, body) = app.get(&format!("/locatario/my-reservations/{renter}")).await;
    assert_eq!(body[0]["review"]["rating"], 5);
    assert_eq!(body[0]["property_title"], "Casa em Recife");
    assert_eq!(body[0]["status"], "pending");

    let (_, body) = app.get(&format!("/locador/properties/{owner}")).await;
    assert_eq!(body[0]["average_rating"], 5.0);

    let (status, body) = app
        .post(
            "/locatario/review",
            json!({"reservation_id": Ulid::new().to_string(), "rating": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn search_folds_accents_and_filters() {
    let app = test_app();
    let owner = app.register("Olga", "olga@example.com", "locador").await;
    let renter = app.register("Rita", "rita@example.com", "locatario").await;
    let sp = app.create_property(&owner, "Sao Paulo", 200.0).await;
    let cheap = app.create_property(&owner, "São Paulo", 80.0).await;
    app.create_property(&owner, "Salvador", 90.0).await;

    let ids = |body: &Value| {
        let mut ids: Vec<String> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        ids
    };
    let sorted = |mut v: Vec<String>| {
        v.sort();
        v
    };

    let (status, body) = app.get("/locatario/search?city=S%C3%A3o%20Paulo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), sorted(vec![sp.clone(), cheap.clone()]));

    let (_, body) = app.get("/locatario/search?city=sao+paulo&max_price=100").await;
    assert_eq!(ids(&body), vec![cheap.clone()]);

    let (_, body) = app.reserve(&cheap, &renter, "2025-07-01", "2025-07-10").await;
    let id = body["reservation_id"].as_str().unwrap().to_string();
    app.put(&format!("/locador/reservation/{id}"), json!({"approved": true})).await;

    let (_, body) = app
        .get("/locatario/search?city=paulo&start_date=2025-07-05&end_date=2025-07-06")
        .await;
    assert_eq!(ids(&body), vec![sp]);

    let (_, body) = app.get("/locatario/search").await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn availability_and_delete() {
    let app = test_app();
    let owner = app.register("Olga", "olga@example.com", "locador").await;
    let renter = app.register("Rita", "rita@example.com", "locatario").await;
    let property = app.create_property(&owner, "Recife", 150.0).await;
    let (_, body) = app.reserve(&property, &renter, "2025-05-01", "2025-05-05").await;
    let reservation = body["reservation_id"].as_str().unwrap().to_string();
    app.put(&format!("/locador/reservation/{reservation}"), json!({"approved": true}))
        .await;

    let (status, body) = app.get(&format!("/locatario/property/{property}/availability")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["free"],
        json!([
            {"start_date": "2025-04-10", "end_date": "2025-04-30"},
            {"start_date": "2025-05-06", "end_date": "2025-12-31"},
        ])
    );

    let (status, _) = app.send("DELETE", &format!("/locador/property/{property}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/locatario/property/{property}/availability")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send("DELETE", &format!("/locador/property/{property}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .put(&format!("/locador/reservation/{reservation}"), json!({"approved": false}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = app.get(&format!("/locatario/my-reservations/{renter}")).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn owner_edits_property() {
    let app = test_app();
    let owner = app.register("Olga", "olga@example.com", "locador").await;
    let property = app.create_property(&owner, "Recife", 150.0).await;

    let (status, _) = app
        .put(
            &format!("/locador/property/{property}"),
            json!({"price_per_day": 175.5, "title": "Casa reformada"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/locador/properties/{owner}")).await;
    assert_eq!(body[0]["price_per_day"], 175.5);
    assert_eq!(body[0]["title"], "Casa reformada");
    assert_eq!(body[0]["city"], "Recife");

    let (status, _) = app
        .put(
            &format!("/locador/property/{property}"),
            json!({"available_from": "2026-05-01"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .put(&format!("/locador/property/{}", Ulid::new()), json!({"title": "x"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Auth ─────────────────────────────────────────────────────

#[tokio::test]
async fn register_login_and_edit() {
    let app = test_app();
    let id = app.register("Rita", "rita@example.com", "renter").await;

    let (status, body) = app
        .post(
            "/auth/register",
            json!({"name": "Rita 2", "email": "RITA@example.com", "user_type": "locatario"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "EMAIL_TAKEN");

    let (status, body) = app.post("/auth/login", json!({"email": "rita@example.com"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id.as_str());
    assert_eq!(body["user"]["user_type"], "locatario");

    let (status, _) = app.post("/auth/login", json!({"email": "ghost@example.com"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.post("/auth/login", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put("/auth/edit", json!({"id": id, "name": "Rita Souza", "email": "rs@example.com"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.post("/auth/login", json!({"email": "rs@example.com"})).await;
    assert_eq!(body["user"]["name"], "Rita Souza");

    let (status, _) = app
        .put("/auth/edit", json!({"id": Ulid::new().to_string(), "name": "x"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let app = test_app();
    let owner = app.register("Olga", "olga@example.com", "locador").await;
    let renter = app.register("Rita", "rita@example.com", "locatario").await;
    let property = app.create_property(&owner, "Recife", 150.0).await;

    let (status, body) = app
        .post("/auth/register", json!({"name": "X", "email": "x@example.com", "user_type": "admin"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID");

    let (status, _) = app
        .post("/auth/register", json!({"email": "y@example.com", "user_type": "locador"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("POST")
        .uri("/locatario/reserve")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.raw(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = app
        .post(
            "/locatario/reserve",
            json!({"property_id": property, "renter_id": renter, "start_date": "01/05/2025", "end_date": "2025-05-05"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.reserve(&property, &renter, "2025-05-05", "2025-05-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_RANGE");

    let (status, body) = app.reserve(&property, &renter, "2026-01-01", "2026-01-03").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OUTSIDE_WINDOW");

    let (status, body) = app.reserve(&property, &owner, "2025-05-01", "2025-05-03").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WRONG_ROLE");

    let (status, _) = app
        .reserve(&Ulid::new().to_string(), &renter, "2025-05-01", "2025-05-03")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/locatario/search?min_price=cheap").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/locatario/my-reservations/not-a-ulid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = app.get(&format!("/locatario/my-reservations/{owner}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/locador/properties",
            json!({
                "title": "Quarto",
                "address": "Rua B",
                "price_per_day": 50,
                "available_from": "2025-01-01",
                "available_until": "2025-02-01",
                "owner_id": renter,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WRONG_ROLE");
}

#[tokio::test]
async fn decisions_are_final() {
    let app = test_app();
    let owner = app.register("Olga", "olga@example.com", "locador").await;
    let other = app.register("Otto", "otto@example.com", "locador").await;
    let renter = app.register("Rita", "rita@example.com", "locatario").await;
    let property = app.create_property(&owner, "Recife", 150.0).await;
    let (_, body) = app.reserve(&property, &renter, "2025-05-01", "2025-05-05").await;
    let id = body["reservation_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(&format!("/locador/reservation/{id}"), json!({"approved": true, "owner_id": other}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NOT_OWNER");

    let (status, body) = app
        .put(&format!("/locador/reservation/{id}"), json!({"approved": false}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");

    let (status, body) = app
        .put(&format!("/locador/reservation/{id}"), json!({"approved": true}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_DECIDED");
}

#[tokio::test]
async fn api_prefix_and_health() {
    let app = test_app();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["users"], 0);

    let (status, body) = app
        .post(
            "/api/auth/register",
            json!({"name": "Olga", "email": "olga@example.com", "user_type": "owner"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let owner = body["user_id"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/api/locador/properties/{owner}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (_, body) = app.get("/api/health").await;
    assert_eq!(body["users"], 1);

    let (status, _) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
