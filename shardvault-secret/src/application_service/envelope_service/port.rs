use std::time::Duration;

use async_trait::async_trait;
use shardvault_account::{KeyId, PublicKey};

use crate::domain::codec::CodecError;
use crate::domain::Shard;

/// 暗号化時に KeyId から公開鍵を引くためのポート。
///
/// 実装はローカルの鍵キャッシュを想定する。リモートからの取得は事前に
/// `KeyCache::precache_pubs` で済ませておく。
pub trait PublicKeyLookup {
    /// 見つからない場合は `Ok(None)`。
    fn find_public_key(&self, key_id: &KeyId) -> Result<Option<PublicKey>, PublicKeyLookupError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublicKeyLookupError {
    #[error("lookup error: {0}")]
    Lookup(String),
}

/// 共有鍵向けシャードの復号をサーバに依頼するポート。
///
/// 共有鍵の秘密鍵はサーバだけが持ち、呼び出し側はその鍵に一切触れない。
#[async_trait]
pub trait ServerMediator: Send + Sync {
    /// `value` は `EncryptedShard` の Base64 文字列そのもの。
    async fn decrypt_share(&self, value: &str, key_id: &KeyId) -> Result<Shard, MediatorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MediatorError {
    /// 接続失敗・5xx など、サーバに到達できなかった場合。
    #[error("network error: {0}")]
    Network(String),
    /// サーバが要求を拒否した場合（対象外の KeyId・復号失敗など）。
    #[error("rejected by server: {0}")]
    Rejected(String),
}

/// エンベロープ暗号化のユースケースで発生しうるエラー。
///
/// どのバリアントも平文・シェア・秘密鍵の中身を含まない。
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed secret: {0}")]
    Format(#[from] CodecError),

    #[error("cannot resolve public key {key_id}: {reason}")]
    KeyResolution { key_id: KeyId, reason: String },

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("no shard for key {0}")]
    NoMatchingShard(KeyId),

    #[error("insufficient shares: {0}")]
    InsufficientShares(String),

    #[error("recombination failed: {0}")]
    Recombination(String),

    #[error("server mediator network error: {0}")]
    Network(String),

    #[error("server mediator call cancelled after {0:?}")]
    Cancelled(Duration),

    #[error("invalid recipients: {0}")]
    InvalidRecipients(String),
}
