#![allow(dead_code)]

use cerberus::{
    build_context,
    config::Config,
    routes::create_router,
    store::{AccountStore, InMemoryStore, TokenLedger, TokenRecord, TokenState},
    Stores,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use wiremock::MockServer;

pub const ALICE: &str = "alice";
pub const ALICE_PASSWORD: &str = "wonderland";
pub const ALICE_ROLE: &str = "ADMIN";
pub const MAX_BODY_BYTES: usize = 1024;
pub const JWT_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub ledger: Arc<CountingLedger>,
    pub upstream: MockServer,
    pub client: reqwest::Client,
}

/// Ledger that delegates to the in-memory store and counts every call
pub struct CountingLedger {
    inner: Arc<InMemoryStore>,
    calls: AtomicUsize,
}

impl CountingLedger {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl TokenLedger for CountingLedger {
    async fn insert_token(&self, username: &str, token: &str) -> anyhow::Result<i64> {
        self.record();
        self.inner.insert_token(username, token).await
    }

    async fn find_by_token(&self, token: &str) -> anyhow::Result<Vec<TokenRecord>> {
        self.record();
        self.inner.find_by_token(token).await
    }

    async fn update_state(
        &self,
        username: &str,
        token: &str,
        state: TokenState,
    ) -> anyhow::Result<u64> {
        self.record();
        self.inner.update_state(username, token, state).await
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.record();
        self.inner.health_check().await
    }
}

/// A port nothing listens on
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn config_yaml(upstream: &str, dead_upstream: &str) -> String {
    format!(
        r#"
JWT:
  Secret: {secret}
  Issuer: cerberus
Upstream:
  TimeoutSecs: 5
  ConnectTimeoutSecs: 1
  MaxBodyBytes: {max_body}
APIs:
  - Prefix: /users
    Host: {upstream}
    Routes:
      - Route: /users/public
        Method: GET
        Role: NONE
      - Route: /users
        Method: GET
        Role: ADMIN
      - Route: /users
        Method: POST
        Role: ADMIN
  - Prefix: /down
    Host: {dead_upstream}
    Routes:
      - Route: /down
        Method: GET
        Role: NONE
  - Prefix: /auth
    Host: {upstream}
    Routes:
      - Route: /auth/token
        Method: GET
        Role: NONE
"#,
        secret = JWT_SECRET,
        max_body = MAX_BODY_BYTES,
        upstream = upstream,
        dead_upstream = dead_upstream,
    )
}

pub async fn spawn_app() -> TestApp {
    let upstream = MockServer::start().await;
    let dead_upstream = format!("http://127.0.0.1:{}", closed_port());

    let config = Config::from_yaml_with_env(&config_yaml(&upstream.uri(), &dead_upstream), &|_| None)
        .expect("Failed to parse test config");

    let store = Arc::new(InMemoryStore::new());
    let password_hash = bcrypt::hash(ALICE_PASSWORD, 4).unwrap();
    store
        .create_account(ALICE, &password_hash, ALICE_ROLE)
        .await
        .unwrap();

    let ledger = Arc::new(CountingLedger::new(store.clone()));
    let stores = Stores {
        accounts: store.clone(),
        ledger: ledger.clone(),
    };
    let app_context = build_context(config, stores).expect("Failed to build app context");
    let app = create_router(app_context);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        ledger,
        upstream,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn host(&self) -> &str {
        self.address.trim_start_matches("http://")
    }

    /// Send a request target verbatim, bypassing client-side URL normalization.
    /// Returns the status line.
    pub async fn send_raw(&self, method: &str, target: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = tokio::net::TcpStream::connect(self.host())
            .await
            .expect("Failed to connect");
        let request = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            method,
            target,
            self.host()
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8_lossy(&response);
        response.lines().next().unwrap_or_default().to_string()
    }

    pub async fn request_token(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/auth/token"))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Issue a token for alice, panicking on anything but 200
    pub async fn alice_token(&self) -> String {
        let response = self.request_token(ALICE, ALICE_PASSWORD).await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["message"], "OK");
        body["data"].as_str().unwrap().to_string()
    }

    pub async fn invalidate(&self, token: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/auth/invalidate"))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Assert the gateway's own `{"message", "data": null}` envelope
pub async fn assert_envelope(response: reqwest::Response, status: u16, message: &str) {
    assert_eq!(response.status(), status);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], message);
    assert!(body["data"].is_null());
}
