#![allow(dead_code)]

use std::sync::Arc;

use reqwest::{header, multipart, Client, Method, Response, StatusCode};
use rust_catalog::{
    app,
    blob::LocalBlobStore,
    config::{AppConfig, OwnerSeed},
    entities::{seed_owner, setup_schema},
    AppState,
};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const OWNER_PASSWORD: &str = "owner-pass-123";

/// The real router on an ephemeral port, over a throwaway SQLite file.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub db: Arc<DatabaseConnection>,
    pub dir: TempDir,
    pub owner_token: String,
}

impl TestApp {
    pub async fn spawn() -> TestApp {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let database_url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("catalog.db").display()
        );

        let db = Database::connect(&database_url)
            .await
            .expect("Failed to open test database");
        setup_schema(&db).await.expect("Failed to create schema");

        let owner = OwnerSeed {
            username: "owner".to_string(),
            email: "owner@example.com".to_string(),
            password: OWNER_PASSWORD.to_string(),
        };
        seed_owner(&db, &owner).await.expect("Failed to seed owner");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let base_url = format!("http://{addr}");

        let config = AppConfig {
            database_url,
            secret: "test-secret".to_string(),
            bind_addr: addr,
            upload_dir: dir.path().join("uploads"),
            public_url: base_url.clone(),
            token_ttl_hours: 1,
            owner: Some(owner),
        };
        let db = Arc::new(db);
        let state = AppState {
            db: db.clone(),
            blobs: Arc::new(LocalBlobStore::new(&config.upload_dir, &config.public_url)),
            config: Arc::new(config),
        };

        tokio::spawn(async move {
            axum::serve(listener, app(state))
                .await
                .expect("Test server failed");
        });

        let mut test_app = TestApp {
            base_url,
            client: Client::new(),
            db,
            dir,
            owner_token: String::new(),
        };
        test_app.owner_token = test_app.login("owner", OWNER_PASSWORD).await;
        test_app
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> Response {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.expect("Failed to send request")
    }

    /// Sends a request and asserts on the status before decoding the body.
    pub async fn expect(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
        status: StatusCode,
    ) -> Value {
        let response = self.request(method.clone(), path, token, body).await;
        let actual = response.status();
        let text = response.text().await.expect("Failed to read body");
        assert_eq!(actual, status, "{method} {path} returned {text}");
        if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).expect("Failed to parse response JSON")
        }
    }

    pub async fn admin(&self, method: Method, path: &str, body: Option<&Value>) -> Response {
        self.request(
            method,
            &format!("/api/admin{path}"),
            Some(self.owner_token.as_str()),
            body,
        )
        .await
    }

    pub async fn login(&self, identifier: &str, password: &str) -> String {
        let body = self
            .expect(
                Method::POST,
                "/api/auth/login",
                None,
                Some(&json!({ "identifier": identifier, "password": password })),
                StatusCode::OK,
            )
            .await;
        body["token"]
            .as_str()
            .expect("Login response has no token")
            .to_string()
    }

    /// Registers a regular user and returns `(id, token)`.
    pub async fn register(&self, username: &str) -> (i64, String) {
        let body = self
            .expect(
                Method::POST,
                "/api/auth/register",
                None,
                Some(&json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "password-123"
                })),
                StatusCode::CREATED,
            )
            .await;
        (
            body["user"]["id"].as_i64().expect("User has no id"),
            body["token"].as_str().expect("No token").to_string(),
        )
    }

    pub async fn upload_png(&self, name: &str) -> Response {
        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(b"\x89PNG fake image bytes".to_vec())
                .file_name(name.to_string())
                .mime_str("image/png")
                .expect("Invalid mime"),
        );
        self.client
            .post(self.url("/api/admin/image"))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.owner_token))
            .multipart(form)
            .send()
            .await
            .expect("Failed to upload")
    }

    pub async fn create_image(&self) -> i64 {
        let response = self.upload_png("photo.png").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse image");
        body["id"].as_i64().expect("Image has no id")
    }

    pub async fn create_category(&self, name: &str, parent: Option<i64>) -> i64 {
        let response = self
            .admin(
                Method::POST,
                "/category",
                Some(&json!({ "name": name, "parent_id": parent })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Failed to parse category");
        body["id"].as_i64().expect("Category has no id")
    }

    pub async fn create_product(&self, name: &str, categories: &[i64], extra: Value) -> Value {
        let thumbnail = self.create_image().await;
        let mut payload = json!({
            "name": name,
            "stock": 5,
            "categories": categories,
            "thumbnail_id": thumbnail,
        });
        if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), extra) {
            target.extend(extra);
        }
        let response = self.admin(Method::POST, "/product", Some(&payload)).await;
        let status = response.status();
        let body: Value = response.json().await.expect("Failed to parse product");
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    pub async fn get_category(&self, id: i64) -> Value {
        self.expect(
            Method::GET,
            &format!("/api/admin/category/{id}?deleted=true"),
            Some(self.owner_token.as_str()),
            None,
            StatusCode::OK,
        )
        .await
    }
}

pub fn ids(values: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = values
        .as_array()
        .expect("Expected an array")
        .iter()
        .map(|v| v["id"].as_i64().expect("Entry has no id"))
        .collect();
    ids.sort_unstable();
    ids
}
