use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use leadline::config::{DispatchConfig, LifecycleConfig};
use leadline::dispatch::{Collaborators, Dispatcher};
use leadline::lifecycle::LeadEngine;
use leadline::server::{AppState, create_router};
use leadline::store::{SqliteStore, Store};
use leadline::types::{Organization, User};

pub const ORG_A: &str = "org-a";
pub const ORG_B: &str = "org-b";

/// The router over a fresh database, driven in-process.
///
/// Seeds `org-a` (users `alice` with an email and `bob` without) and `org-b`
/// (user `carol`). Must be started inside a tokio runtime.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    router: Router,
}

impl TestServer {
    pub fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("leadline.db")).expect("open db"));
        store.initialize().expect("initialize schema");

        for id in [ORG_A, ORG_B] {
            store
                .create_organization(&Organization {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    created_at: Utc::now(),
                })
                .expect("create organization");
        }
        for (id, org, email) in [
            ("alice", ORG_A, Some("alice@example.com")),
            ("bob", ORG_A, None),
            ("carol", ORG_B, Some("carol@example.com")),
        ] {
            store
                .create_user(&User {
                    id: id.to_string(),
                    organization_id: org.to_string(),
                    name: id.to_string(),
                    email: email.map(str::to_string),
                    created_at: Utc::now(),
                })
                .expect("create user");
        }

        let (dispatcher, _worker) = Dispatcher::spawn(
            store.clone(),
            Collaborators::default(),
            &DispatchConfig::default(),
        );
        let engine = Arc::new(LeadEngine::new(
            store.clone(),
            dispatcher,
            LifecycleConfig::default(),
        ));
        let router = create_router(Arc::new(AppState::new(store.clone(), engine)));

        Self {
            temp_dir,
            store,
            router,
        }
    }

    /// Sends a request as `alice` in `org-a`.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send_as(Some(ORG_A), Some("alice"), method, uri, body)
            .await
    }

    /// Sends a request with the given identity headers; `None` omits the header.
    pub async fn send_as(
        &self,
        organization: Option<&str>,
        user: Option<&str>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(org) = organization {
            builder = builder.header("x-organization-id", org);
        }
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        (status, value)
    }
}
