use std::fmt;
use std::time::Duration;

use shardvault_account::{KeyId, KeyPair};
use zeroize::Zeroizing;

/// エンコード結果の表現形式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// `KeyID(Value)-KeyID(Value)...`
    #[default]
    Simple,
    /// Simple 形式を `ENCRYPTED SECRET` ラベルの PEM ブロックで包んだもの。
    Pem,
}

/// 秘密値を暗号化するユースケースの入力。
///
/// - `recipient_key_ids` はメンバー / サービス鍵の KeyId。出力はこの順序に従う。
/// - 共有鍵の KeyId を `recipient_key_ids` に含めることはできない。
pub struct EncryptSecretCommand {
    pub plaintext: Zeroizing<String>,
    pub shared_key_id: KeyId,
    pub recipient_key_ids: Vec<KeyId>,
    pub format: WireFormat,
}

impl fmt::Debug for EncryptSecretCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptSecretCommand")
            .field("plaintext", &"[REDACTED]")
            .field("shared_key_id", &self.shared_key_id)
            .field("recipient_key_ids", &self.recipient_key_ids)
            .field("format", &self.format)
            .finish()
    }
}

/// 秘密値を復号するユースケースの入力。
///
/// `requester` が `None` の場合（ローカルの秘密鍵が無い場合）は復号できない。
#[derive(Debug)]
pub struct DecryptSecretCommand {
    pub encoded: String,
    pub shared_key_id: KeyId,
    pub requester: Option<KeyPair>,
    /// サーバへの問い合わせ 1 回にかけてよい最大時間。
    pub timeout: Duration,
}
