//! Shared helpers for integration tests.

#![allow(dead_code)]

use kb_harness::auth::HmacTokenAuthenticator;
use kb_harness::config::Config;
use kb_harness::server::router;
use kb_harness::service::{KnowledgeService, ServiceSettings};
use kb_harness::sqlite_store::SqliteStore;
use kb_harness_core::chat::ScriptedChat;
use kb_harness_core::embedding::StaticEmbeddings;
use kb_harness_core::store::Store;
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const DIMS: usize = 2;

pub fn test_config(tmp: &TempDir, port: u16) -> Config {
    let db_path = tmp.path().join("kbh.sqlite");
    let config_content = format!(
        r#"
[db]
path = "{}"

[chunking]
max_chars = 20

[retrieval]
top_k = 3

[embedding]
dims = {}

[server]
bind = "127.0.0.1:{}"
max_upload_bytes = 65536

[auth]
secret = "{}"
"#,
        db_path.display(),
        DIMS,
        port,
        TEST_SECRET
    );
    toml::from_str(&config_content).unwrap()
}

pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// A running server backed by a temp SQLite database and test doubles.
pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub store: Arc<SqliteStore>,
    pub chat: Arc<ScriptedChat>,
    pub embedder: Arc<StaticEmbeddings>,
    tokens: HmacTokenAuthenticator,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn spawn(chat: ScriptedChat, embedder: StaticEmbeddings) -> Self {
        let port = find_free_port();
        let tmp = TempDir::new().unwrap();
        let cfg = test_config(&tmp, port);

        let store = Arc::new(SqliteStore::open(&cfg).await.unwrap());
        let chat = Arc::new(chat);
        let embedder = Arc::new(embedder);
        let service = KnowledgeService::new(
            store.clone(),
            embedder.clone(),
            chat.clone(),
            ServiceSettings::from_config(&cfg),
        );
        let auth = HmacTokenAuthenticator::new(TEST_SECRET).unwrap();
        let app = router(service, Arc::new(auth));

        let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
            .await
            .unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        wait_for_server(port).await;

        TestApp {
            base: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            store,
            chat,
            embedder,
            tokens: HmacTokenAuthenticator::new(TEST_SECRET).unwrap(),
            _tmp: tmp,
        }
    }

    /// Register a user and return its bearer header value.
    pub async fn user(&self, email: &str) -> String {
        let user = self.store.create_user(email, "").await.unwrap();
        format!("Bearer {}", self.tokens.issue(user.id))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn create_kb(&self, auth: &str, name: &str) -> i64 {
        let resp = self
            .client
            .post(self.url("/api/kbs"))
            .header("Authorization", auth)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = resp.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn upload(
        &self,
        auth: &str,
        kb_id: i64,
        file_name: &str,
        mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> reqwest::Response {
        let mut part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        if let Some(mime) = mime {
            part = part.mime_str(mime).unwrap();
        }
        let form = reqwest::multipart::Form::new().part("file", part);
        self.client
            .post(self.url(&format!("/api/kbs/{}/files", kb_id)))
            .header("Authorization", auth)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn ask(
        &self,
        auth: &str,
        kb_id: i64,
        body: serde_json::Value,
    ) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/kbs/{}/ask", kb_id)))
            .header("Authorization", auth)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

/// Minimal valid PDF with one text-showing content stream per page.
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let font_id = 3 + 2 * n;
    let mut offsets = Vec::new();
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    for (i, text) in pages.iter().enumerate() {
        let page_id = 3 + 2 * i;
        let content_id = page_id + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >> endobj\n",
                page_id, content_id, font_id
            )
            .as_bytes(),
        );
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "{} 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
            font_id
        )
        .as_bytes(),
    );

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", font_id + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            font_id + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}
