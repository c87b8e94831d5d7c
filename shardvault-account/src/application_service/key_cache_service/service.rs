use zeroize::Zeroizing;

use super::{KeyStoreError, LocalKeyStore, PublicKeyResolver, PublicKeyResolverError};
use crate::domain::KeyId;
use crate::infrastructure::key_pair::{KeyPair, KeyPairError, PublicKey};

/// 鍵キャッシュで発生しうるエラー。
#[derive(Debug, thiserror::Error)]
pub enum KeyCacheError {
    #[error("key store error: {0}")]
    Store(KeyStoreError),

    #[error("failed to resolve public key {key_id}: {source}")]
    Resolver {
        key_id: KeyId,
        source: PublicKeyResolverError,
    },

    #[error("invalid key material for {key_id}: {source}")]
    InvalidKey { key_id: KeyId, source: KeyPairError },

    #[error("fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: KeyId, actual: KeyId },
}

impl KeyCacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KeyCacheError::Store(KeyStoreError::NotFound(_)))
    }
}

/// ローカルの `LocalKeyStore` を前段に置いた鍵キャッシュ。
///
/// - 公開鍵はリモートの `PublicKeyResolver` に対する write-through キャッシュとして振る舞う。
/// - 秘密鍵はローカルでのみ扱い、リモートには問い合わせない。
pub struct KeyCache<S> {
    store: S,
}

impl<S> KeyCache<S>
where
    S: LocalKeyStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn put_priv(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyCacheError> {
        self.store.put_priv(key_id, pem).map_err(KeyCacheError::Store)
    }

    pub fn get_priv(&self, key_id: &KeyId) -> Result<Zeroizing<String>, KeyCacheError> {
        self.store.get_priv(key_id).map_err(KeyCacheError::Store)
    }

    pub fn put_pub(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyCacheError> {
        self.store.put_pub(key_id, pem).map_err(KeyCacheError::Store)
    }

    pub fn get_pub(&self, key_id: &KeyId) -> Result<String, KeyCacheError> {
        self.store.get_pub(key_id).map_err(KeyCacheError::Store)
    }

    /// 鍵ペアの両方をその KeyId で保存し、KeyId を返す。
    pub fn store_key_pair(&self, key_pair: &KeyPair) -> Result<KeyId, KeyCacheError> {
        let key_id = key_pair.key_id();
        let invalid = |source| KeyCacheError::InvalidKey {
            key_id: key_id.clone(),
            source,
        };

        let private_pem = key_pair.private_key_pem().map_err(invalid)?;
        let public_pem = key_pair.public_key().to_pem().map_err(invalid)?;

        self.put_priv(&key_id, &private_pem)?;
        self.put_pub(&key_id, &public_pem)?;

        tracing::debug!(key_id = %key_id, "stored key pair");
        Ok(key_id)
    }

    /// 保存済みの秘密鍵から鍵ペアを復元する。
    ///
    /// 復元した鍵のフィンガープリントが `key_id` と一致しない場合はエラーとする。
    pub fn load_key_pair(&self, key_id: &KeyId) -> Result<KeyPair, KeyCacheError> {
        let pem = self.get_priv(key_id)?;
        let key_pair =
            KeyPair::from_private_key_pem(&pem).map_err(|source| KeyCacheError::InvalidKey {
                key_id: key_id.clone(),
                source,
            })?;

        ensure_fingerprint(key_id, key_pair.key_id())?;
        Ok(key_pair)
    }

    pub fn load_public_key(&self, key_id: &KeyId) -> Result<PublicKey, KeyCacheError> {
        let pem = self.get_pub(key_id)?;
        let public_key = PublicKey::from_pem(&pem).map_err(|source| KeyCacheError::InvalidKey {
            key_id: key_id.clone(),
            source,
        })?;

        ensure_fingerprint(key_id, public_key.key_id())?;
        Ok(public_key)
    }

    /// 指定された公開鍵をすべてキャッシュに揃える。
    ///
    /// - キャッシュにあればそれを使い、無ければ `resolver` から取得して書き込んでから次へ進む。
    /// - 1 つでも取得に失敗した場合は全体をエラーにする（受信者集合に対する暗号化は all-or-nothing）。
    pub async fn precache_pubs<R>(&self, key_ids: &[KeyId], resolver: &R) -> Result<(), KeyCacheError>
    where
        R: PublicKeyResolver + ?Sized,
    {
        for key_id in key_ids {
            match self.store.get_pub(key_id) {
                Ok(_) => continue,
                Err(KeyStoreError::NotFound(_)) => {}
                Err(e) => return Err(KeyCacheError::Store(e)),
            }

            tracing::debug!(key_id = %key_id, "public key cache miss, fetching from remote");

            let pem = resolver
                .get_public_key(key_id)
                .await
                .map_err(|source| KeyCacheError::Resolver {
                    key_id: key_id.clone(),
                    source,
                })?;

            let public_key =
                PublicKey::from_pem(&pem).map_err(|source| KeyCacheError::InvalidKey {
                    key_id: key_id.clone(),
                    source,
                })?;
            ensure_fingerprint(key_id, public_key.key_id())?;

            self.put_pub(key_id, &pem)?;
        }

        Ok(())
    }
}

fn ensure_fingerprint(expected: &KeyId, actual: KeyId) -> Result<(), KeyCacheError> {
    if *expected != actual {
        return Err(KeyCacheError::FingerprintMismatch {
            expected: expected.clone(),
            actual,
        });
    }
    Ok(())
}
