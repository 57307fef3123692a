use reqwest::StatusCode;
use serde_json::{Value, json};

use stockledger_api::app::{build_app, services::AppServices};
use stockledger_core::TenantId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = build_app(AppServices::in_memory());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Tenant<'a> {
    server: &'a TestServer,
    client: reqwest::Client,
    tenant_id: TenantId,
}

impl<'a> Tenant<'a> {
    fn new(server: &'a TestServer) -> Self {
        Self {
            server,
            client: reqwest::Client::new(),
            tenant_id: TenantId::new(),
        }
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.server.base_url, path))
            .header("X-Tenant-Id", self.tenant_id.to_string());
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PATCH, path, Some(body)).await
    }

    /// Warehouse, product, simple variant and one batch; returns (warehouse, variant, batch).
    async fn seed(&self) -> (String, String, String) {
        let (s, warehouse) = self.post("/warehouses", json!({ "name": "Main" })).await;
        assert_eq!(s, StatusCode::CREATED, "{warehouse}");
        let (s, product) = self
            .post("/catalog/products", json!({ "name": "Green tea", "sku": "GT" }))
            .await;
        assert_eq!(s, StatusCode::CREATED, "{product}");
        let (s, variant) = self
            .post(
                "/catalog/variants",
                json!({ "product_id": product["id"], "name": "Green tea 500g", "sku": "GT-500" }),
            )
            .await;
        assert_eq!(s, StatusCode::CREATED, "{variant}");
        let (s, batch) = self
            .post("/catalog/batches", json!({ "variant_id": variant["id"], "name": "LOT-1" }))
            .await;
        assert_eq!(s, StatusCode::CREATED, "{batch}");

        let id = |v: &Value| v["id"].as_str().unwrap().to_string();
        (id(&warehouse), id(&variant), id(&batch))
    }
}

fn sheet(kind: &str, warehouse: &str, batch: &str, quantity: &str, is_confirm: bool) -> Value {
    json!({
        "kind": kind,
        "reason": "counter sale",
        "is_confirm": is_confirm,
        "warehouse_id": warehouse,
        "lines": [{ "batch_id": batch, "quantity": quantity }],
    })
}

#[tokio::test]
async fn health_needs_no_tenant_but_everything_else_does() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/health", server.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/warehouses", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .get(format!("{}/warehouses", server.base_url))
        .header("X-Tenant-Id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stock_moves_through_sheets_and_shows_up_in_every_view() {
    let server = TestServer::spawn().await;
    let t = Tenant::new(&server);
    let (warehouse, variant, batch) = t.seed().await;

    let (s, import) = t
        .post("/sheets/import-export", sheet("import", &warehouse, &batch, "10", true))
        .await;
    assert_eq!(s, StatusCode::CREATED, "{import}");
    assert_eq!(import["code"], "IP000001");
    assert_eq!(import["is_confirmed"], true);

    let (s, err) = t
        .post("/sheets/import-export", sheet("export", &warehouse, &batch, "11", true))
        .await;
    assert_eq!(s, StatusCode::UNPROCESSABLE_ENTITY, "{err}");
    assert_eq!(err["error"], "invariant_violation");

    let (s, export) = t
        .post("/sheets/import-export", sheet("export", &warehouse, &batch, "2.5", false))
        .await;
    assert_eq!(s, StatusCode::CREATED);
    let export_id = export["id"].as_str().unwrap();

    let (s, confirmed) = t
        .patch(&format!("/sheets/{export_id}"), json!({ "is_confirm": true, "note": "picked" }))
        .await;
    assert_eq!(s, StatusCode::OK, "{confirmed}");
    assert_eq!(confirmed["is_confirmed"], true);

    let (s, rows) = t.get("/inventory").await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["quantity"], "7.5");

    let (_, totals) = t.get("/inventory/variants").await;
    assert_eq!(totals[0]["variant_id"], variant.as_str());
    assert_eq!(totals[0]["quantity"], "7.5");

    let (_, logs) = t.get("/inventory/logs?kind=export").await;
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["items"][0]["warehouse_name"], "Main");

    let (_, sheets) = t.get("/sheets?is_confirmed=true&limit=1").await;
    assert_eq!(sheets["total"], 2);
    assert_eq!(sheets["items"].as_array().unwrap().len(), 1);

    let (s, report) = t.get(&format!("/reports/warehouse?warehouse_ids={warehouse}")).await;
    assert_eq!(s, StatusCode::OK, "{report}");
    let product = &report["products"][0];
    assert_eq!(product["c_import"], "10");
    assert_eq!(product["c_export"], "-2.5");
    assert_eq!(product["last_inventory"], "7.5");

    let (_, reasons) = t.get("/warehouses/reasons?kind=export").await;
    assert_eq!(reasons.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn check_transfer_and_bulk_confirm() {
    let server = TestServer::spawn().await;
    let t = Tenant::new(&server);
    let (warehouse, _, batch) = t.seed().await;
    let (_, overflow) = t.post("/warehouses", json!({ "name": "Overflow" })).await;
    let overflow = overflow["id"].as_str().unwrap().to_string();

    let (s, dup) = t.post("/warehouses", json!({ "name": "main" })).await;
    assert_eq!(s, StatusCode::CONFLICT);
    assert_eq!(dup["error"], "conflict");

    let (s, err) = t
        .post(
            "/sheets/check",
            json!({
                "reason": "stocktake",
                "warehouse_id": warehouse,
                "lines": [{ "batch_id": batch, "quantity_actual": "1" }],
            }),
        )
        .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert!(err["message"].as_str().unwrap().contains("warehouse-batch not found"));

    let (_, a) = t
        .post("/sheets/import-export", sheet("import", &warehouse, &batch, "6", false))
        .await;
    let (_, transfer) = t
        .post(
            "/sheets/transfer",
            json!({
                "reason": "rebalance",
                "from_warehouse_id": warehouse,
                "to_warehouse_id": overflow,
                "lines": [{ "batch_id": batch, "quantity": "4" }],
            }),
        )
        .await;

    let (s, err) = t
        .post(
            "/sheets/bulk-confirm",
            json!([
                { "id": a["id"], "is_confirm": true },
                { "id": TenantId::new().to_string(), "is_confirm": true },
            ]),
        )
        .await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert!(err["message"].as_str().unwrap().contains("sheet not found"));

    let (s, confirmed) = t
        .post(
            "/sheets/bulk-confirm",
            json!([
                { "id": a["id"], "is_confirm": true },
                { "id": transfer["id"], "is_confirm": true },
            ]),
        )
        .await;
    assert_eq!(s, StatusCode::OK, "{confirmed}");

    let (_, rows) = t.get(&format!("/inventory?warehouse_id={overflow}")).await;
    assert_eq!(rows[0]["quantity"], "4");

    let (s, check) = t
        .post(
            "/sheets/check",
            json!({
                "reason": "stocktake",
                "is_confirm": true,
                "warehouse_id": warehouse,
                "lines": [{ "batch_id": batch, "quantity_actual": "1" }],
            }),
        )
        .await;
    assert_eq!(s, StatusCode::CREATED, "{check}");
    assert_eq!(check["body"]["lines"][0]["quantity_system"], "2");

    let (_, rows) = t.get(&format!("/inventory?warehouse_id={warehouse}")).await;
    assert_eq!(rows[0]["quantity"], "1");
}

#[tokio::test]
async fn orders_reserve_stock_until_shipped() {
    let server = TestServer::spawn().await;
    let t = Tenant::new(&server);
    let (warehouse, variant, batch) = t.seed().await;
    t.post("/sheets/import-export", sheet("import", &warehouse, &batch, "10", true))
        .await;

    let (s, order) = t
        .post("/orders", json!({ "lines": [{ "variant_id": variant, "quantity": "3" }] }))
        .await;
    assert_eq!(s, StatusCode::CREATED, "{order}");
    let key = order["order_key"].as_str().unwrap().to_string();
    assert_eq!(key, "OD000001");

    let (_, available) = t.get("/inventory/available").await;
    assert_eq!(available["items"][0]["quantity_non_confirm"], "3");

    let (s, _) = t.post(&format!("/orders/{key}/complete"), json!({})).await;
    assert_eq!(s, StatusCode::OK);

    let mut export = sheet("export", &warehouse, &batch, "3", true);
    export["order_key"] = json!(key);
    let (s, shipped) = t.post("/sheets/import-export", export.clone()).await;
    assert_eq!(s, StatusCode::CREATED, "{shipped}");

    let (s, err) = t.post("/sheets/import-export", export).await;
    assert_eq!(s, StatusCode::BAD_REQUEST);
    assert!(err["message"].as_str().unwrap().contains("already has a sheet"));

    let (_, history) = t.get(&format!("/inventory/available/{variant}/history")).await;
    let rows = history["items"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["quantity_confirm_change"], "-3.0000");
    assert_eq!(rows[2]["quantity_confirm_change"], "0.0000");

    let (s, err) = t.get("/orders/OD999999").await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "not_found");
}

#[tokio::test]
async fn tenants_are_isolated() {
    let server = TestServer::spawn().await;
    let a = Tenant::new(&server);
    let b = Tenant::new(&server);
    let (warehouse, _, batch) = a.seed().await;
    let (_, import) = a
        .post("/sheets/import-export", sheet("import", &warehouse, &batch, "5", true))
        .await;

    let (s, _) = b.get(&format!("/sheets/{}", import["id"].as_str().unwrap())).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    let (_, rows) = b.get("/inventory").await;
    assert_eq!(rows, json!([]));
    let (_, logs) = b.get("/inventory/logs").await;
    assert_eq!(logs["total"], 0);
}
