use reqflow_infra::config::Settings;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(Settings::default()).await
    }

    async fn spawn_with(settings: Settings) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = reqflow_api::app::build_app(&settings).expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.put(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    /// Submit a one-line order and approve it; returns (order id, line item id).
    async fn approved_order(&self, part: &str, qty: i64) -> (String, String) {
        let res = self
            .post(
                "/orders",
                json!({
                    "userDetails": {"name": "Jane", "empId": "E123", "dept": "Maintenance", "zone": "Z1"},
                    "cart": [{"partNumber": part, "description": "Hex bolt", "quantity": qty}],
                    "category": "Mechanical"
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: Value = res.json().await.unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let res = self.post(&format!("/orders/{id}/approve"), json!({})).await;
        assert_eq!(res.status(), StatusCode::OK);
        let order: Value = res.json().await.unwrap();
        let line = order["lineItems"][0]["id"].as_str().unwrap().to_string();

        (id, line)
    }

    async fn stock_of(&self, part: &str) -> i64 {
        let entries: Value = self.get("/stock").await.json().await.unwrap();
        entries
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["partNumber"] == part)
            .and_then(|e| e["currentQuantity"].as_i64())
            .unwrap_or(0)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.get("/health").await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn submission_starts_pending_with_a_number() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post(
            "/orders",
            json!({
                "userDetails": {"name": "Jane", "empId": "E123", "dept": "Maintenance", "zone": "Z1"},
                "cart": [{"partNumber": "p1", "quantity": 5}]
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["status"], "Pending");
    assert_eq!(created["number"], 1001);

    let id = created["id"].as_str().unwrap();
    let order: Value = srv.get(&format!("/orders/{id}")).await.json().await.unwrap();
    assert_eq!(order["category"], "Unknown");
    assert_eq!(order["lineItems"][0]["partNumber"], "P1");
    assert!(order["userDetails"]["requestedDate"].is_string());
}

#[tokio::test]
async fn invalid_submission_is_a_400_with_error_body() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post(
            "/orders",
            json!({
                "userDetails": {"name": "Jane", "empId": "E123", "zone": "Z1"},
                "cart": [{"partNumber": "P1", "quantity": 5}]
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("dept"));

    let res = srv
        .post(
            "/orders",
            json!({
                "userDetails": {"name": "Jane", "empId": "E123", "dept": "D", "zone": "Z1"},
                "cart": []
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cumulative_deliveries_reconcile_stock() {
    let srv = TestServer::spawn().await;
    let res = srv
        .put(
            "/stock/snapshot",
            json!([{"partNumber": "P1", "description": "Hex bolt", "quantity": 20}]),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let (id, line) = srv.approved_order("P1", 5).await;

    let res = srv
        .post(&format!("/orders/{id}/deliveries"), json!({"deliveredQuantities": {&line: 3}}))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["status"], "Partial");
    assert_eq!(srv.stock_of("P1").await, 17);

    // Same totals again: nothing moves.
    let res = srv
        .post(&format!("/orders/{id}/deliveries"), json!({"deliveredQuantities": {&line: 3}}))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let receipt: Value = res.json().await.unwrap();
    assert!(receipt["decrements"].as_array().unwrap().is_empty());
    assert_eq!(srv.stock_of("P1").await, 17);

    let res = srv
        .post(&format!("/orders/{id}/deliveries"), json!({"deliveredQuantities": {&line: 5}}))
        .await;
    let receipt: Value = res.json().await.unwrap();
    assert_eq!(receipt["status"], "Delivered");
    assert_eq!(receipt["decrements"][0]["quantity"], 2);
    assert_eq!(srv.stock_of("P1").await, 15);
}

#[tokio::test]
async fn over_delivery_is_rejected() {
    let srv = TestServer::spawn().await;
    let (id, line) = srv.approved_order("P1", 5).await;

    let res = srv
        .post(&format!("/orders/{id}/deliveries"), json!({"deliveredQuantities": {&line: 6}}))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn stale_expected_version_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let (id, line) = srv.approved_order("P1", 5).await;

    let res = srv
        .post(
            &format!("/orders/{id}/deliveries"),
            json!({"deliveredQuantities": {&line: 1}, "expectedVersion": 2}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .post(
            &format!("/orders/{id}/deliveries"),
            json!({"deliveredQuantities": {&line: 2}, "expectedVersion": 2}),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn rejecting_an_approved_order_is_invalid_state() {
    let srv = TestServer::spawn().await;
    let (id, _) = srv.approved_order("P1", 5).await;

    let res = srv.post(&format!("/orders/{id}/reject"), json!({"reason": "late"})).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn unknown_and_malformed_order_ids() {
    let srv = TestServer::spawn().await;

    let res = srv.get(&format!("/orders/{}", uuid::Uuid::now_v7())).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let res = srv.get("/orders/not-a-uuid").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn collections_resolve_roster_and_stop_after_full() {
    let srv = TestServer::spawn().await;
    let res = srv
        .put(
            "/roster",
            json!([
                {"cardNumber": "0042", "idNumber": "E123", "name": "Jane"},
                {"cardNumber": "0043", "name": "Missing id"}
            ]),
        )
        .await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["entries"], 1);

    let (id, line) = srv.approved_order("P1", 5).await;

    // Not delivered yet.
    let res = srv.post(&format!("/orders/{id}/collections"), json!({"scannedId": "0042"})).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    srv.post(&format!("/orders/{id}/deliveries"), json!({"deliveredQuantities": {&line: 5}}))
        .await;

    let res = srv.post(&format!("/orders/{id}/collections"), json!({"scannedId": " 0042 "})).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let event: Value = res.json().await.unwrap();
    assert_eq!(event["collectedBy"], "E123 - Jane");
    assert_eq!(event["type"], "Full");

    let res = srv
        .post(&format!("/orders/{id}/collections"), json!({"scannedId": "9999", "type": "Partial"}))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");

    let res = srv.post(&format!("/orders/{id}/collections"), json!({"scannedId": "  "})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reorder_list_follows_catalog_policy() {
    let path = std::env::temp_dir().join(format!("reqflow-bb-catalog-{}.json", uuid::Uuid::now_v7()));
    std::fs::write(
        &path,
        json!([
            {"partNumber": "P1", "description": "Hex bolt", "rol": 5, "max": 30},
            {"partNumber": "P2", "description": "Hex nut", "rol": 5, "roq": 40}
        ])
        .to_string(),
    )
    .unwrap();

    let srv = TestServer::spawn_with(Settings {
        catalog_path: Some(path.clone()),
        ..Settings::default()
    })
    .await;
    let _ = std::fs::remove_file(&path);

    srv.put(
        "/stock/snapshot",
        json!([
            {"partNumber": "P1", "quantity": 2},
            {"partNumber": "P2", "quantity": 9}
        ]),
    )
    .await;

    let list: Value = srv.get("/stock/reorder").await.json().await.unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["partNumber"], "P1");
    assert_eq!(list[0]["recommendedQty"], 28);
}

#[tokio::test]
async fn dashboard_filters_and_summary() {
    let srv = TestServer::spawn().await;
    let (approved, _) = srv.approved_order("P1", 1).await;
    let (_, _) = srv.approved_order("P2", 1).await;
    srv.post(
        "/orders",
        json!({
            "userDetails": {"name": "Sam", "empId": "E200", "dept": "Ops", "zone": "Z2"},
            "cart": [{"partNumber": "P3", "quantity": 1}],
            "category": "Electrical"
        }),
    )
    .await;

    let orders: Value = srv.get("/orders?status=Approved").await.json().await.unwrap();
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], approved.as_str());

    let electrical: Value = srv.get("/orders?category=electrical").await.json().await.unwrap();
    assert_eq!(electrical.as_array().unwrap().len(), 1);

    let res = srv.get("/orders?status=shipped").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let summary: Value = srv.get("/orders/summary").await.json().await.unwrap();
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["approved"], 2);
    assert_eq!(summary["pending"], 1);
}
