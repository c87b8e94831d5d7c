use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shardvault_account::infrastructure::public_key_resolver::PublicKeyDocument;
use shardvault_account::{KeyCacheError, KeyId, KeyStoreError, PublicKey};

use super::AppState;

#[derive(Deserialize)]
pub struct RegisterPublicKeyRequest {
    pub public_key_pem: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/keys", post(register_public_key))
        .route("/keys/{key_id}", get(get_public_key))
}

async fn get_public_key(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
) -> Result<Json<PublicKeyDocument>, (StatusCode, String)> {
    let key_id = KeyId::new(key_id);
    let public_key_pem = state.key_cache.get_pub(&key_id).map_err(to_status)?;

    Ok(Json(PublicKeyDocument {
        key_id: key_id.into_inner(),
        public_key_pem,
    }))
}

/// 公開鍵を登録する。KeyId はサーバ側でフィンガープリントから計算する。
async fn register_public_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterPublicKeyRequest>,
) -> Result<(StatusCode, Json<PublicKeyDocument>), (StatusCode, String)> {
    let public_key = PublicKey::from_pem(&req.public_key_pem)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let key_id = public_key.key_id();
    let public_key_pem = public_key
        .to_pem()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    state
        .key_cache
        .put_pub(&key_id, &public_key_pem)
        .map_err(to_status)?;

    tracing::info!(key_id = %key_id, "registered public key");
    Ok((
        StatusCode::CREATED,
        Json(PublicKeyDocument {
            key_id: key_id.into_inner(),
            public_key_pem,
        }),
    ))
}

fn to_status(e: KeyCacheError) -> (StatusCode, String) {
    let status = match &e {
        KeyCacheError::Store(KeyStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        KeyCacheError::Store(KeyStoreError::InvalidKeyId(_)) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
