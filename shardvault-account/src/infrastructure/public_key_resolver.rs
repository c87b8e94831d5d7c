use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::application_service::key_cache_service::{PublicKeyResolver, PublicKeyResolverError};
use crate::domain::KeyId;
use crate::infrastructure::key_pair::{KeyPairError, PublicKey};

/// `GET /keys/{key_id}` のレスポンス / `POST /keys` のリクエストに使う DTO。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyDocument {
    pub key_id: String,
    pub public_key_pem: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterKeyError {
    #[error(transparent)]
    InvalidKey(#[from] KeyPairError),

    #[error(transparent)]
    Resolver(#[from] PublicKeyResolverError),
}

/// テストや PoC 用のインメモリ公開鍵リゾルバ。
#[derive(Clone, Default)]
pub struct InMemoryPublicKeyResolver {
    inner: Arc<Mutex<HashMap<KeyId, String>>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryPublicKeyResolver {
    /// 公開鍵 PEM を登録し、フィンガープリントから計算した KeyId を返す。
    pub fn register(&self, public_key_pem: &str) -> Result<KeyId, RegisterKeyError> {
        let key_id = PublicKey::from_pem(public_key_pem)?.key_id();
        self.insert(key_id.clone(), public_key_pem.to_string())?;
        Ok(key_id)
    }

    /// 直接 KeyId を指定して登録したい場合のヘルパ（主にテスト用）。
    pub fn insert(
        &self,
        key_id: KeyId,
        public_key_pem: String,
    ) -> Result<(), PublicKeyResolverError> {
        self.inner
            .lock()
            .map_err(|e| PublicKeyResolverError::Storage(e.to_string()))?
            .insert(key_id, public_key_pem);
        Ok(())
    }

    /// これまでに `get_public_key` が呼ばれた回数。
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublicKeyResolver for InMemoryPublicKeyResolver {
    async fn get_public_key(&self, key_id: &KeyId) -> Result<String, PublicKeyResolverError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let guard = self
            .inner
            .lock()
            .map_err(|e| PublicKeyResolverError::Storage(e.to_string()))?;

        guard
            .get(key_id)
            .cloned()
            .ok_or_else(|| PublicKeyResolverError::NotFound(key_id.clone()))
    }
}

/// サーバの `GET /keys/{key_id}` から公開鍵を取得するリゾルバ。
pub struct HttpPublicKeyResolver {
    base_url: String,
    http_client: Client,
}

impl HttpPublicKeyResolver {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PublicKeyResolverError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublicKeyResolverError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            http_client,
        })
    }

    fn key_url(&self, key_id: &KeyId) -> String {
        format!("{}/keys/{}", self.base_url.trim_end_matches('/'), key_id)
    }
}

#[async_trait]
impl PublicKeyResolver for HttpPublicKeyResolver {
    async fn get_public_key(&self, key_id: &KeyId) -> Result<String, PublicKeyResolverError> {
        let response = self
            .http_client
            .get(self.key_url(key_id))
            .send()
            .await
            .map_err(|e| PublicKeyResolverError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(PublicKeyResolverError::NotFound(key_id.clone())),
            status if !status.is_success() => {
                return Err(PublicKeyResolverError::Network(format!(
                    "unexpected status {status} for key {key_id}"
                )))
            }
            _ => {}
        }

        let document: PublicKeyDocument = response
            .json()
            .await
            .map_err(|e| PublicKeyResolverError::Network(e.to_string()))?;

        tracing::debug!(key_id = %key_id, "fetched public key from server");
        Ok(document.public_key_pem)
    }
}
