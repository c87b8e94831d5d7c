use std::fmt;

use shardvault_account::KeyId;
use zeroize::Zeroizing;

/// 閾値分散で得られた 1 つのシェア（平文のバイト列）。
///
/// - メモリ上でのみ扱い、暗号化せずに永続化しない。
/// - Drop 時にゼロクリアされる。
#[derive(Clone, PartialEq, Eq)]
pub struct Shard(Zeroizing<Vec<u8>>);

impl Shard {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shard([REDACTED; {}])", self.0.len())
    }
}

/// ある公開鍵で暗号化されたシェア。
///
/// - `key_id`: 暗号化に使った公開鍵のフィンガープリント。
/// - `value`: base64 でアーマーされた暗号文。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedShard {
    key_id: KeyId,
    value: String,
}

impl EncryptedShard {
    pub fn new(key_id: KeyId, value: String) -> Self {
        Self { key_id, value }
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}
