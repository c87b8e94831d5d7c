use std::sync::Arc;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::domain::KeyId;

/// KeyId ごとに PEM 形式の鍵素材を保存するためのポート。
///
/// - 実装はローカルディレクトリ（1 ID = 1 ファイル）/ sled / インメモリなどを想定。
/// - 同じ ID への書き込みは実装側で直列化し、書きかけの鍵が読まれないようにすること。
pub trait LocalKeyStore: Send + Sync {
    fn put_priv(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError>;

    /// 見つからない場合は `KeyStoreError::NotFound` を返す。
    fn get_priv(&self, key_id: &KeyId) -> Result<Zeroizing<String>, KeyStoreError>;

    fn put_pub(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError>;

    /// 見つからない場合は `KeyStoreError::NotFound` を返す。
    fn get_pub(&self, key_id: &KeyId) -> Result<String, KeyStoreError>;
}

impl<T> LocalKeyStore for Arc<T>
where
    T: LocalKeyStore + ?Sized,
{
    fn put_priv(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        (**self).put_priv(key_id, pem)
    }

    fn get_priv(&self, key_id: &KeyId) -> Result<Zeroizing<String>, KeyStoreError> {
        (**self).get_priv(key_id)
    }

    fn put_pub(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        (**self).put_pub(key_id, pem)
    }

    fn get_pub(&self, key_id: &KeyId) -> Result<String, KeyStoreError> {
        (**self).get_pub(key_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("key not found: {0}")]
    NotFound(KeyId),

    #[error("invalid key id: {0}")]
    InvalidKeyId(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// キャッシュに無い公開鍵をリモート（サーバ）から取得するためのポート。
#[async_trait]
pub trait PublicKeyResolver: Send + Sync {
    /// KeyId に対応する公開鍵 PEM を返す。
    async fn get_public_key(&self, key_id: &KeyId) -> Result<String, PublicKeyResolverError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublicKeyResolverError {
    #[error("public key not found: {0}")]
    NotFound(KeyId),

    #[error("network error: {0}")]
    Network(String),

    #[error("resolver storage error: {0}")]
    Storage(String),
}
