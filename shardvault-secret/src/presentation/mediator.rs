use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::infrastructure::server_mediator::{
    DecryptShareRequest, DecryptShareResponse, LocalMediatorError,
};

use super::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/mediator/decrypt", post(decrypt_share))
}

/// 共有鍵向けシャードを復号してシェアを返す。
///
/// 呼び出し元の認可はこの手前（トランスポート / セッション層）で済んでいる前提で、
/// ここでは「自分の共有鍵宛てか」だけを確かめる。
async fn decrypt_share(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecryptShareRequest>,
) -> Result<Json<DecryptShareResponse>, (StatusCode, String)> {
    let share = state
        .mediator
        .open(&req.value, &req.key_id)
        .map_err(|e| {
            let status = match e {
                LocalMediatorError::ForeignKey(_) => StatusCode::FORBIDDEN,
                LocalMediatorError::InvalidValue(_) => StatusCode::BAD_REQUEST,
                LocalMediatorError::Decryption => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, e.to_string())
        })?;

    tracing::debug!(key_id = %req.key_id, "decrypted shared shard");
    Ok(Json(DecryptShareResponse {
        share: BASE64_STANDARD.encode(share.as_bytes()),
    }))
}
