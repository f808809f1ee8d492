//! Shared harness: router over in-memory stores and a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use carehub_api::config::ApiConfig;
use carehub_api::{AppState, router};
use carehub_core::auth::password::hash_password_with_cost;
use carehub_core::authz::Role;
use carehub_core::clock::ManualClock;
use carehub_core::models::auth::{Identity, NewIdentity};
use carehub_core::store::AuthStore;
use carehub_core::store::memory::MemoryAuthStore;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Low bcrypt cost for seeded identities.
const SEED_COST: u32 = 4;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryAuthStore>,
    pub clock: ManualClock,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut ApiConfig)) -> Self {
        let mut config = ApiConfig::with_secret("integration-test-secret");
        configure(&mut config);
        let store = Arc::new(MemoryAuthStore::new());
        let clock = ManualClock::default();
        let state = AppState::new(config, store.clone(), Arc::new(clock.clone()));
        Self {
            router: router(state.clone()),
            state,
            store,
            clock,
        }
    }

    pub async fn seed(
        &self,
        email: &str,
        password: &str,
        role: Role,
        facility_id: Option<Uuid>,
    ) -> Identity {
        self.store
            .create_identity(NewIdentity {
                email: email.into(),
                password_hash: hash_password_with_cost(password, SEED_COST).unwrap(),
                name: email.split('@').next().unwrap_or(email).into(),
                role,
                facility_id,
            })
            .await
            .unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    /// Log in and return `(accessToken, refreshToken)`.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/login",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        (
            body["data"]["accessToken"].as_str().unwrap().to_string(),
            body["data"]["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}
