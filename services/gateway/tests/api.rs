//! End-to-end tests against a live router on an ephemeral port

use chrono::{Duration, Utc};
use clap::Parser;
use gateway::{AppState, GatewayConfig, create_router};
use marketplace::Marketplace;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::net::TcpListener;

struct TestServer {
    base: String,
    client: Client,
    state: AppState,
}

impl TestServer {
    async fn start() -> Self {
        let config = GatewayConfig::try_parse_from([
            "adspace-gateway",
            "--jwt-secret",
            "integration-test-secret",
            "--bind",
            "127.0.0.1:0",
        ])
        .unwrap();
        let state = AppState::new(config, Marketplace::new(), 0);
        let app = create_router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base: format!("http://{}/v1", addr),
            client: Client::new(),
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn register(&self, email: &str, role: &str) -> (String, String) {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "name": "Test User",
                "email": email,
                "password": "correct-horse-battery",
                "role": role,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn patch(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }
}

fn space_body(title: &str, city: &str, price: &str) -> Value {
    json!({
        "title": title,
        "description": "Backlit panel at the east exit",
        "category": "TRANSIT",
        "location": { "address": "Platform 1", "city": city },
        "pricing": { "amount": price, "unit": "DAY", "currency": "INR" },
        "footfall": { "daily_average": 40000 }
    })
}

fn date_offset(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days)).to_string()
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["documents"]["users"], 0);
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let server = TestServer::start().await;
    let (token, user_id) = server.register("owner@example.com", "OWNER").await;

    let (status, me) = server.get("/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id.as_str());
    assert!(me.get("password_hash").is_none());

    let res = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({"email": "OWNER@example.com", "password": "correct-horse-battery"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let login: Value = res.json().await.unwrap();
    assert_eq!(login["token_type"], "Bearer");

    let res = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({"email": "owner@example.com", "password": "wrong-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "UNAUTHORIZED");

    let (status, updated) = server
        .patch("/users/me", &token, json!({"company": "Hoardings Ltd"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["company"], "Hoardings Ltd");

    // Duplicate email
    let res = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({
            "name": "Again",
            "email": "owner@example.com",
            "password": "correct-horse-battery",
            "role": "ADVERTISER",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_auth_required_and_bad_tokens() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");

    let (status, _) = server.get("/users/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server.get("/bookings", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_listing_lifecycle_and_search() {
    let server = TestServer::start().await;
    let (owner, _) = server.register("owner@example.com", "OWNER").await;
    let (advertiser, _) = server.register("adv@example.com", "ADVERTISER").await;

    let (status, _) = server
        .post("/spaces", &advertiser, space_body("Nope", "Pune", "10"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, space) = server
        .post("/spaces", &owner, space_body("Station Lightbox", "Pune", "100.00"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let space_id = space["id"].as_str().unwrap().to_string();
    assert_eq!(space["availability"], "AVAILABLE");

    server
        .post("/spaces", &owner, space_body("Airport Screen", "Mumbai", "900"))
        .await;

    let (status, page) = server.get("/spaces?city=pune", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Station Lightbox");

    let (_, page) = server.get("/spaces?sort=price_desc", None).await;
    assert_eq!(page["items"][0]["title"], "Airport Screen");

    // Updates invalidate cached searches
    let (status, _) = server
        .patch(
            &format!("/spaces/{}", space_id),
            &owner,
            json!({"title": "Station Lightbox XL"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, page) = server.get("/spaces?city=pune", None).await;
    assert_eq!(page["items"][0]["title"], "Station Lightbox XL");

    // Unlisted spaces disappear from public reads but not for the owner
    server
        .patch(
            &format!("/spaces/{}", space_id),
            &owner,
            json!({"availability": "UNLISTED"}),
        )
        .await;
    let (status, _) = server.get(&format!("/spaces/{}", space_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server
        .get(&format!("/spaces/{}", space_id), Some(&owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, page) = server.get("/spaces?city=pune", None).await;
    assert_eq!(page["total"], 0);

    let (_, mine) = server.get("/spaces/mine", Some(&owner)).await;
    assert_eq!(mine["total"], 2);

    let res = server
        .client
        .delete(server.url(&format!("/spaces/{}", space_id)))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, body) = server.get("/spaces/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_booking_flow() {
    let server = TestServer::start().await;
    let (owner, owner_id) = server.register("owner@example.com", "OWNER").await;
    let (advertiser, advertiser_id) = server.register("adv@example.com", "ADVERTISER").await;
    let (rival, _) = server.register("rival@example.com", "ADVERTISER").await;

    let (_, space) = server
        .post("/spaces", &owner, space_body("Station Lightbox", "Pune", "100.00"))
        .await;
    let space_id = space["id"].as_str().unwrap().to_string();
    let requests_path = format!("/spaces/{}/requests", space_id);

    let (status, request) = server
        .post(
            &requests_path,
            &advertiser,
            json!({"start_date": date_offset(1), "end_date": date_offset(7), "message": "Launch"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "PENDING");
    let request_id = request["id"].as_str().unwrap().to_string();

    let (_, rival_request) = server
        .post(
            &requests_path,
            &rival,
            json!({"start_date": date_offset(5), "end_date": date_offset(9)}),
        )
        .await;
    let rival_request_id = rival_request["id"].as_str().unwrap().to_string();

    // Owners cannot request, past dates are refused
    let (status, _) = server
        .post(
            &requests_path,
            &owner,
            json!({"start_date": date_offset(1), "end_date": date_offset(2)}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .post(
            &requests_path,
            &advertiser,
            json!({"start_date": date_offset(-3), "end_date": date_offset(2)}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, incoming) = server.get("/requests?status=PENDING", Some(&owner)).await;
    assert_eq!(incoming["total"], 2);

    // Only the owner decides
    let (status, _) = server
        .post(&format!("/requests/{}/approve", request_id), &advertiser, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let res = server
        .client
        .post(server.url(&format!("/requests/{}/approve", request_id)))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let approval: Value = res.json().await.unwrap();
    assert_eq!(approval["request"]["status"], "APPROVED");
    let booking = &approval["booking"];
    assert_eq!(booking["status"], "CONFIRMED");
    assert_eq!(booking["owner_id"], owner_id.as_str());
    assert_eq!(booking["advertiser_id"], advertiser_id.as_str());
    let total: Decimal = booking["total_price"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, Decimal::from(700));
    let booking_id = booking["id"].as_str().unwrap().to_string();

    // The overlapping rival request was rejected automatically
    let (_, rival_view) = server
        .get(&format!("/requests/{}", rival_request_id), Some(&rival))
        .await;
    assert_eq!(rival_view["status"], "REJECTED");

    // A decided request cannot be decided again
    let (status, body) = server
        .post(&format!("/requests/{}/reject", request_id), &owner, json!({"note": "late"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");

    // Dates are now taken
    let (status, _) = server
        .post(
            &requests_path,
            &rival,
            json!({"start_date": date_offset(3), "end_date": date_offset(4)}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = server
        .get(&format!("/bookings/{}", booking_id), Some(&rival))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, bookings) = server.get("/bookings?status=CONFIRMED", Some(&advertiser)).await;
    assert_eq!(bookings["total"], 1);

    let (status, cancelled) = server
        .post(&format!("/bookings/{}/cancel", booking_id), &advertiser, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
}

#[tokio::test]
async fn test_chat_flow() {
    let server = TestServer::start().await;
    let (owner, owner_id) = server.register("owner@example.com", "OWNER").await;
    let (advertiser, _) = server.register("adv@example.com", "ADVERTISER").await;
    let (outsider, _) = server.register("outsider@example.com", "ADVERTISER").await;

    let (status, conversation) = server
        .post(
            "/conversations",
            &advertiser,
            json!({"participant_id": owner_id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let conversation_id = conversation["id"].as_str().unwrap().to_string();

    // Opening again finds the same conversation
    let (_, again) = server
        .post("/conversations", &advertiser, json!({"participant_id": owner_id}))
        .await;
    assert_eq!(again["id"], conversation_id.as_str());

    let messages_path = format!("/conversations/{}/messages", conversation_id);
    for body in ["Hi there", "Is June free?"] {
        let (status, _) = server
            .post(&messages_path, &advertiser, json!({"body": body}))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = server
        .post(&messages_path, &advertiser, json!({"body": "   "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post(&messages_path, &outsider, json!({"body": "let me in"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, list) = server.get("/conversations", Some(&owner)).await;
    assert_eq!(list["unread_total"], 2);
    assert_eq!(list["items"][0]["unread_count"], 2);
    assert_eq!(list["items"][0]["last_message"]["body"], "Is June free?");

    let (_, history) = server
        .get(&format!("{}?limit=1", messages_path), Some(&owner))
        .await;
    assert_eq!(history["items"][0]["body"], "Is June free?");
    let cursor = history["next_cursor"].as_str().unwrap().to_string();
    let (_, older) = server
        .get(&format!("{}?limit=1&before={}", messages_path, cursor), Some(&owner))
        .await;
    assert_eq!(older["items"][0]["body"], "Hi there");
    assert!(older["next_cursor"].is_null());

    let (status, receipt) = server
        .post(&format!("/conversations/{}/read", conversation_id), &owner, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["marked"], 2);
    let (_, list) = server.get("/conversations", Some(&owner)).await;
    assert_eq!(list["unread_total"], 0);
}

#[tokio::test]
async fn test_events_reach_connected_sessions() {
    let server = TestServer::start().await;
    let (owner, owner_id) = server.register("owner@example.com", "OWNER").await;
    let (_, space) = server
        .post("/spaces", &owner, space_body("Station Lightbox", "Pune", "100"))
        .await;
    let (advertiser, _) = server.register("adv@example.com", "ADVERTISER").await;

    let owner_user_id = owner_id.parse().unwrap();
    let (_session, mut frames) = server.state.hub.connect(owner_user_id);

    let (status, _) = server
        .get(&format!("/users/{}", owner_id), Some(&advertiser))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, profile) = server
        .get(&format!("/users/{}", owner_id), Some(&advertiser))
        .await;
    assert_eq!(profile["online"], true);

    server
        .post(
            &format!("/spaces/{}/requests", space["id"].as_str().unwrap()),
            &advertiser,
            json!({"start_date": date_offset(2), "end_date": date_offset(3)}),
        )
        .await;

    let frame = frames.recv().await.unwrap();
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["type"], "event");
    assert_eq!(json["event"]["kind"], "request_created");
}
