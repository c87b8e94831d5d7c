pub mod p256_key_pair;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::domain::KeyId;
use crate::infrastructure::key_pair::p256_key_pair::{P256KeyPair, P256PublicKey};

/// KeyId として使うハッシュ先頭バイト数。
const FINGERPRINT_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum KeyPairError {
    #[error("invalid PEM: {0}")]
    InvalidPem(String),
    #[error("invalid key bytes: {0}")]
    InvalidKey(String),
    #[error("PEM encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    P256,
}

/// メンバー / サービス / 共有鍵の鍵ペア。
///
/// アルゴリズムを増やす場合はバリアントを追加し、`ShareEncryption` 実装側で対応する。
#[derive(Clone)]
pub enum KeyPair {
    P256KeyPair(P256KeyPair),
}

/// 暗号化に使う公開鍵。`KeyId` はこの値から一意に決まる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    P256(P256PublicKey),
}

impl KeyPair {
    pub fn generate(key_type: KeyType) -> KeyPair {
        match key_type {
            KeyType::P256 => KeyPair::P256KeyPair(P256KeyPair::generate()),
        }
    }

    /// PKCS#8 PEM から鍵ペアを復元する。
    pub fn from_private_key_pem(pem: &str) -> Result<KeyPair, KeyPairError> {
        P256KeyPair::from_pkcs8_pem(pem).map(KeyPair::P256KeyPair)
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyPair::P256KeyPair(_) => KeyType::P256,
        }
    }

    pub fn private_key_pem(&self) -> Result<Zeroizing<String>, KeyPairError> {
        match self {
            KeyPair::P256KeyPair(kp) => kp.to_pkcs8_pem(),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::P256KeyPair(kp) => PublicKey::P256(kp.public_key()),
        }
    }

    /// 自分の公開鍵のフィンガープリント。
    pub fn key_id(&self) -> KeyId {
        self.public_key().key_id()
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeyPair::P256KeyPair(a), KeyPair::P256KeyPair(b)) => a == b,
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 秘密鍵は出力しない
        f.debug_struct("KeyPair")
            .field("key_type", &self.key_type())
            .field("key_id", &self.key_id())
            .finish()
    }
}

impl PublicKey {
    /// SPKI PEM (`-----BEGIN PUBLIC KEY-----`) から公開鍵を復元する。
    pub fn from_pem(pem: &str) -> Result<PublicKey, KeyPairError> {
        P256PublicKey::from_public_key_pem(pem).map(PublicKey::P256)
    }

    pub fn to_pem(&self) -> Result<String, KeyPairError> {
        match self {
            PublicKey::P256(pk) => pk.to_public_key_pem(),
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            PublicKey::P256(_) => KeyType::P256,
        }
    }

    pub fn key_id(&self) -> KeyId {
        match self {
            PublicKey::P256(pk) => fingerprint(pk.as_sec1_bytes()),
        }
    }
}

/// 公開鍵バイト列から KeyId を計算する。
///
/// SHA-256 の先頭 16 バイトを小文字 hex にしたもの。PEM の改行や折り返しには依存しない。
pub fn fingerprint(public_key_bytes: &[u8]) -> KeyId {
    let digest = Sha256::digest(public_key_bytes);
    KeyId::new(hex::encode(&digest[..FINGERPRINT_LEN]))
}
