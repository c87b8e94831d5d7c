use std::sync::Arc;

use axum::{routing::get, Router};
use shardvault_account::{KeyCache, LocalKeyStore};

use crate::infrastructure::hpke_share_encryption::HpkeShareEncryption;
use crate::infrastructure::server_mediator::LocalServerMediator;

pub mod keys;
pub mod mediator;

/// サーバが持つ状態。
///
/// - `mediator`: 共有鍵の秘密鍵を持ち、共有鍵向けシャードだけを復号する
/// - `key_cache`: 共有鍵と登録された公開鍵の置き場
pub struct AppState {
    pub mediator: LocalServerMediator<HpkeShareEncryption>,
    pub key_cache: KeyCache<Arc<dyn LocalKeyStore>>,
}

async fn health() -> &'static str {
    "ok"
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(mediator::routes())
        .merge(keys::routes())
        .with_state(state)
}
