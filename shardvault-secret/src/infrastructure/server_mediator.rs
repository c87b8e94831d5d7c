use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shardvault_account::{KeyId, KeyPair};
use zeroize::Zeroizing;

use crate::application_service::envelope_service::{MediatorError, ServerMediator};
use crate::domain::codec;
use crate::domain::{EncryptedShard, Shard, ShareEncryption};
use crate::infrastructure::config::ClientConfig;

/// `POST /mediator/decrypt` のリクエスト。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptShareRequest {
    pub key_id: KeyId,
    pub value: String,
}

/// `POST /mediator/decrypt` のレスポンス。`share` はシェアの Base64。
#[derive(Serialize, Deserialize)]
pub struct DecryptShareResponse {
    pub share: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LocalMediatorError {
    #[error("key {0} is not held by this server")]
    ForeignKey(KeyId),

    #[error("invalid shard value: {0}")]
    InvalidValue(String),

    #[error("shard decryption failed")]
    Decryption,
}

/// 共有鍵の秘密鍵を持ち、共有鍵向けシャードだけを復号するメディエータ。
///
/// サーバプロセス内で使うほか、テストではサーバを立てずにこれを直接渡す。
/// 自分の共有鍵以外の KeyId は復号を試みる前に拒否する。
pub struct LocalServerMediator<E> {
    shared_key: KeyPair,
    shared_key_id: KeyId,
    share_encryption: E,
}

impl<E> LocalServerMediator<E>
where
    E: ShareEncryption,
{
    pub fn new(shared_key: KeyPair, share_encryption: E) -> Self {
        let shared_key_id = shared_key.key_id();
        Self {
            shared_key,
            shared_key_id,
            share_encryption,
        }
    }

    pub fn shared_key_id(&self) -> &KeyId {
        &self.shared_key_id
    }

    pub fn open(&self, value: &str, key_id: &KeyId) -> Result<Shard, LocalMediatorError> {
        if key_id != &self.shared_key_id {
            tracing::warn!(key_id = %key_id, "refused to decrypt shard for foreign key");
            return Err(LocalMediatorError::ForeignKey(key_id.clone()));
        }

        let shard = EncryptedShard::new(key_id.clone(), value.to_string());
        let ciphertext = codec::decode_value(&shard)
            .map_err(|e| LocalMediatorError::InvalidValue(e.to_string()))?;

        self.share_encryption
            .decrypt_share(&ciphertext, &self.shared_key)
            .map_err(|e| {
                tracing::debug!(key_id = %key_id, error = %e, "shared shard decryption failed");
                LocalMediatorError::Decryption
            })
    }
}

#[async_trait]
impl<E> ServerMediator for LocalServerMediator<E>
where
    E: ShareEncryption,
{
    async fn decrypt_share(&self, value: &str, key_id: &KeyId) -> Result<Shard, MediatorError> {
        self.open(value, key_id)
            .map_err(|e| MediatorError::Rejected(e.to_string()))
    }
}

/// サーバの `POST /mediator/decrypt` を呼ぶメディエータ。
///
/// - 接続失敗・タイムアウト・5xx は `max_retries` 回まで `retry_backoff` 間隔で再試行する。
/// - 4xx はサーバの判断なので再試行しない。
/// - 呼び出し全体の打ち切りは呼び出し側（`EnvelopeService`）の timeout に任せる。
pub struct HttpServerMediator {
    base_url: String,
    http_client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpServerMediator {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Result<Self, MediatorError> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MediatorError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into(),
            http_client,
            max_retries,
            retry_backoff,
        })
    }

    /// 設定ファイルの `[client]` セクションから組み立てる。
    pub fn from_config(config: &ClientConfig) -> Result<Self, MediatorError> {
        Self::new(
            config.server_url.clone(),
            config.timeout(),
            config.max_retries,
            config.retry_backoff(),
        )
    }

    fn decrypt_url(&self) -> String {
        format!("{}/mediator/decrypt", self.base_url.trim_end_matches('/'))
    }

    async fn try_once(&self, request: &DecryptShareRequest) -> Result<Shard, Attempt> {
        let response = self
            .http_client
            .post(self.decrypt_url())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    Attempt::Retry(e.to_string())
                } else {
                    Attempt::Fail(MediatorError::Network(e.to_string()))
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Attempt::Retry(format!("server returned {status}")));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(Attempt::Fail(MediatorError::Rejected(format!(
                "{status}: {body}"
            ))));
        }
        if status != StatusCode::OK {
            return Err(Attempt::Fail(MediatorError::Network(format!(
                "unexpected status {status}"
            ))));
        }

        let body: DecryptShareResponse = response
            .json()
            .await
            .map_err(|e| Attempt::Fail(MediatorError::Network(e.to_string())))?;
        let share = Zeroizing::new(body.share);
        BASE64_STANDARD
            .decode(share.as_bytes())
            .map(Shard::new)
            .map_err(|e| Attempt::Fail(MediatorError::Network(format!("invalid share encoding: {e}"))))
    }
}

enum Attempt {
    Retry(String),
    Fail(MediatorError),
}

#[async_trait]
impl ServerMediator for HttpServerMediator {
    async fn decrypt_share(&self, value: &str, key_id: &KeyId) -> Result<Shard, MediatorError> {
        let request = DecryptShareRequest {
            key_id: key_id.clone(),
            value: value.to_string(),
        };

        let mut attempt = 0;
        loop {
            match self.try_once(&request).await {
                Ok(share) => return Ok(share),
                Err(Attempt::Fail(e)) => return Err(e),
                Err(Attempt::Retry(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        key_id = %key_id,
                        attempt,
                        max_retries = self.max_retries,
                        reason = %reason,
                        "server mediator call failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(Attempt::Retry(reason)) => {
                    return Err(MediatorError::Network(format!(
                        "giving up after {} attempts: {reason}",
                        attempt + 1
                    )))
                }
            }
        }
    }
}
