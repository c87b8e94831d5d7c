use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use p256::{EncodedPoint, SecretKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::infrastructure::key_pair::KeyPairError;

/// P-256 の鍵ペア。
///
/// - 公開鍵は uncompressed form (0x04 || X || Y, 65 バイト) で保持する。
/// - HPKE (DHKEM P-256) の受信者鍵としてそのまま使える形にしておく。
#[derive(Clone)]
pub struct P256KeyPair {
    secret_key: SecretKey,
    public_key: P256PublicKey,
}

impl P256KeyPair {
    pub fn generate() -> Self {
        Self::from_secret_key(SecretKey::random(&mut OsRng))
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = P256PublicKey::from_point(secret_key.public_key().to_encoded_point(false));
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, KeyPairError> {
        let secret_key =
            SecretKey::from_pkcs8_pem(pem).map_err(|e| KeyPairError::InvalidPem(e.to_string()))?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>, KeyPairError> {
        self.secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyPairError::Encoding(e.to_string()))
    }

    pub fn public_key(&self) -> P256PublicKey {
        self.public_key.clone()
    }

    /// 秘密スカラー（32 バイト）。
    pub fn secret_key_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.secret_key.to_bytes().to_vec())
    }
}

impl PartialEq for P256KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.secret_key == other.secret_key
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct P256PublicKey {
    point: EncodedPoint,
}

impl P256PublicKey {
    fn from_point(point: EncodedPoint) -> Self {
        Self { point }
    }

    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyPairError> {
        let pk = p256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|e| KeyPairError::InvalidKey(e.to_string()))?;
        Ok(Self::from_point(pk.to_encoded_point(false)))
    }

    pub fn from_public_key_pem(pem: &str) -> Result<Self, KeyPairError> {
        let pk = p256::PublicKey::from_public_key_pem(pem)
            .map_err(|e| KeyPairError::InvalidPem(e.to_string()))?;
        Ok(Self::from_point(pk.to_encoded_point(false)))
    }

    pub fn to_public_key_pem(&self) -> Result<String, KeyPairError> {
        let pk = p256::PublicKey::from_sec1_bytes(self.point.as_bytes())
            .map_err(|e| KeyPairError::InvalidKey(e.to_string()))?;
        pk.to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyPairError::Encoding(e.to_string()))
    }

    pub fn as_sec1_bytes(&self) -> &[u8] {
        self.point.as_bytes()
    }
}

#[cfg(test)]
mod p256_key_pair_tests {
    use super::*;

    #[test]
    fn generate_has_valid_sizes() {
        let kp = P256KeyPair::generate();

        assert_eq!(kp.public_key().as_sec1_bytes().len(), 65);
        assert_eq!(kp.secret_key_bytes().len(), 32);
    }

    #[test]
    fn public_key_pem_roundtrip() {
        let kp = P256KeyPair::generate();
        let pem = kp.public_key().to_public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        let decoded = P256PublicKey::from_public_key_pem(&pem).unwrap();
        assert_eq!(decoded, kp.public_key());
    }

    #[test]
    fn sec1_bytes_roundtrip() {
        let kp = P256KeyPair::generate();
        let decoded = P256PublicKey::from_sec1_bytes(kp.public_key().as_sec1_bytes()).unwrap();
        assert_eq!(decoded, kp.public_key());
    }

    #[test]
    fn invalid_sec1_bytes_are_rejected() {
        let result = P256PublicKey::from_sec1_bytes(&[0u8; 10]);
        assert!(matches!(result, Err(KeyPairError::InvalidKey(_))));
    }
}
