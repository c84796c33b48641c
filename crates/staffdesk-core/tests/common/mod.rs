#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use staffdesk_core::auth::MemoryBackend;
use staffdesk_core::{AppContext, Config};

pub const PROFILE_JSON: &str = r#"{"id": 7, "email": "grace@example.com", "username": "grace",
    "first_name": "Grace", "last_name": "Hopper", "role": "manager", "is_active": true}"#;

pub fn token(user_id: i64, ttl_secs: i64) -> String {
    encode(
        &Header::default(),
        &json!({
            "user_id": user_id,
            "exp": Utc::now().timestamp() + ttl_secs,
            "token_type": "access",
        }),
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .expect("Failed to encode test token")
}

pub fn valid_token() -> String {
    token(7, 3600)
}

pub fn expired_token() -> String {
    token(7, -3600)
}

pub fn context(url: &str) -> (Arc<AppContext>, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let config = Config {
        api_base_url: url.to_string(),
        ..Default::default()
    };
    let ctx = AppContext::new(config, backend.clone()).expect("Failed to build context");
    (ctx, backend)
}
