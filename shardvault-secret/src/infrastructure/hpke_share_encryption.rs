use hpke_rs::hpke_types::{AeadAlgorithm, KdfAlgorithm, KemAlgorithm};
use hpke_rs::prelude::*;
use hpke_rs_rust_crypto::HpkeRustCrypto;
use shardvault_account::{KeyPair, PublicKey};

use crate::domain::secret::{Shard, ShareEncryption, ShareEncryptionError};

/// DH KEM P-256 の `enc`（uncompressed 公開点）の長さ。
const P256_ENC_LEN: usize = 65;

/// HPKE の info。別用途の暗号文と取り違えないようにドメインを分ける。
const HPKE_INFO: &[u8] = b"shardvault/share/v1";

/// HPKE (RFC 9180) を用いたシェア暗号化実装。
///
/// - KEM: DH KEM P-256
/// - KDF: HKDF-SHA256
/// - AEAD: AES-GCM-256
///
/// 出力は `enc (65 バイト) || ciphertext`。AEAD なので 1 バイトでも改ざんされれば復号に失敗する。
#[derive(Debug, Default, Clone, Copy)]
pub struct HpkeShareEncryption;

impl HpkeShareEncryption {
    /// この実装で利用する HPKE の設定値を返す。
    fn hpke_config() -> (Mode, KemAlgorithm, KdfAlgorithm, AeadAlgorithm) {
        (
            Mode::Base,
            KemAlgorithm::DhKemP256,
            KdfAlgorithm::HkdfSha256,
            AeadAlgorithm::Aes256Gcm,
        )
    }

    fn hpke() -> Hpke<HpkeRustCrypto> {
        let (mode, kem, kdf, aead) = Self::hpke_config();
        Hpke::<HpkeRustCrypto>::new(mode, kem, kdf, aead)
    }
}

impl ShareEncryption for HpkeShareEncryption {
    fn encrypt_share(
        &self,
        share: &Shard,
        recipient_public_key: &PublicKey,
    ) -> Result<Vec<u8>, ShareEncryptionError> {
        let pk_bytes = match recipient_public_key {
            PublicKey::P256(pk) => pk.as_sec1_bytes().to_vec(),
        };
        let pk_r = HpkePublicKey::from(pk_bytes);

        let mut hpke = Self::hpke();
        let (enc, ciphertext) = hpke
            .seal(&pk_r, HPKE_INFO, &[], share.as_bytes(), None, None, None)
            .map_err(|e| ShareEncryptionError::CryptoError(format!("hpke seal failed: {e:?}")))?;

        if enc.len() != P256_ENC_LEN {
            return Err(ShareEncryptionError::CryptoError(format!(
                "unexpected enc length: {}",
                enc.len()
            )));
        }

        let mut out = Vec::with_capacity(enc.len() + ciphertext.len());
        out.extend_from_slice(&enc);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt_share(
        &self,
        ciphertext: &[u8],
        key_pair: &KeyPair,
    ) -> Result<Shard, ShareEncryptionError> {
        let sk_bytes = match key_pair {
            KeyPair::P256KeyPair(kp) => kp.secret_key_bytes(),
        };

        if ciphertext.len() <= P256_ENC_LEN {
            return Err(ShareEncryptionError::InvalidInput(format!(
                "ciphertext too short: {} bytes",
                ciphertext.len()
            )));
        }
        let (enc, sealed) = ciphertext.split_at(P256_ENC_LEN);

        let sk_r = HpkePrivateKey::new(sk_bytes.to_vec());
        let hpke = Self::hpke();
        let mut ctx = hpke
            .setup_receiver(enc, &sk_r, HPKE_INFO, None, None, None)
            .map_err(|e| {
                ShareEncryptionError::CryptoError(format!("hpke setup_receiver failed: {e:?}"))
            })?;

        ctx.open(&[], sealed)
            .map(Shard::new)
            .map_err(|e| ShareEncryptionError::CryptoError(format!("hpke open failed: {e:?}")))
    }
}
