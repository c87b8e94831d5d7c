use shardvault_account::{KeyPair, KeyType, PublicKey};

use super::Shard;

/// シェアを受信者の公開鍵で暗号化 / 秘密鍵で復号するためのポート。
///
/// - 具体的なアルゴリズム（HPKE など）は infra 層の実装に委譲する。
/// - KeyId から鍵を解決するのは application 層の責務で、このポートは純粋な暗号処理のみを担当する。
pub trait ShareEncryption: Send + Sync {
    /// 1 つのシェアを指定された受信者公開鍵向けに暗号化する。
    ///
    /// 呼ぶたびに異なる暗号文になる（ランダム化された暗号化）。
    fn encrypt_share(
        &self,
        share: &Shard,
        recipient_public_key: &PublicKey,
    ) -> Result<Vec<u8>, ShareEncryptionError>;

    /// 自分宛ての暗号文を秘密鍵で復号する。
    fn decrypt_share(
        &self,
        ciphertext: &[u8],
        key_pair: &KeyPair,
    ) -> Result<Shard, ShareEncryptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ShareEncryptionError {
    /// 暗号処理に失敗した場合（hpke-rs などからのエラーをラップ）。
    #[error("crypto error: {0}")]
    CryptoError(String),
    /// 入力値（暗号文の長さなど）が不正な場合。
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported key type: {0:?}")]
    UnsupportedKey(KeyType),
}
