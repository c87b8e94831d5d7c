use sha2::{Digest, Sha256};
use shardvault_account::{KeyId, PublicKey};
use zeroize::Zeroizing;

use crate::domain::codec;
use crate::domain::{EncryptedShard, Secret, ShareEncryption, ThresholdScheme};

use super::{
    DecryptSecretCommand, EncryptSecretCommand, EnvelopeError, MediatorError, PublicKeyLookup,
    ServerMediator, WireFormat,
};

/// トップレベルは常に 2-of-2 で分割する。
const SHARE_COUNT: usize = 2;
const SHARE_THRESHOLD: usize = 2;

/// 分割前に平文の末尾へ付ける SHA-256 の先頭バイト数。別の秘密値のシェアとの組み合わせを検出する。
const INTEGRITY_TAG_LEN: usize = 16;

/// シャード化されたエンベロープ暗号化のアプリケーションサービス。
///
/// - 書き込み: 平文 → 2 シェアに分割 → シェア A を共有鍵で、シェア B を受信者ごとに暗号化 → エンコード
/// - 読み込み: デコード → シェア A をサーバで復号 + シェア B をローカルで復号 → 復元
///
/// 共有鍵の能力（`ServerMediator`）や鍵は呼び出しごとに渡し、サービス自体は状態を持たない。
pub struct EnvelopeService<E, T> {
    pub share_encryption: E,
    pub threshold: T,
}

impl<E, T> EnvelopeService<E, T>
where
    E: ShareEncryption,
    T: ThresholdScheme,
{
    /// 秘密値を暗号化し、エンコード済みの文字列を返す。
    ///
    /// 出力は共有鍵のシャードが先頭、続いて受信者が入力順に並ぶ。
    /// 1 つでも暗号化に失敗した場合は何も返さない。
    pub fn encrypt_secret<L>(
        &self,
        cmd: EncryptSecretCommand,
        lookup: &L,
    ) -> Result<String, EnvelopeError>
    where
        L: PublicKeyLookup + ?Sized,
    {
        let recipients = normalize_recipients(&cmd.shared_key_id, cmd.recipient_key_ids)?;

        let shared_key = resolve(lookup, &cmd.shared_key_id)?;
        let recipient_keys = recipients
            .iter()
            .map(|key_id| resolve(lookup, key_id).map(|pk| (key_id, pk)))
            .collect::<Result<Vec<_>, _>>()?;

        if cmd.plaintext.is_empty() {
            return Err(EnvelopeError::Encryption("plaintext must not be empty".into()));
        }
        let tagged = tag_plaintext(cmd.plaintext.as_bytes());

        let mut shares = self
            .threshold
            .split(&tagged, SHARE_COUNT, SHARE_THRESHOLD)
            .map_err(|e| EnvelopeError::Encryption(format!("split failed: {e}")))?;
        if shares.len() != SHARE_COUNT {
            return Err(EnvelopeError::Encryption(format!(
                "expected {SHARE_COUNT} shares, got {}",
                shares.len()
            )));
        }
        let member_share = shares.remove(1);
        let shared_share = shares.remove(0);

        let mut shards = Vec::with_capacity(recipient_keys.len() + 1);
        shards.push(self.encrypt_for(&shared_share, &cmd.shared_key_id, &shared_key)?);
        for (key_id, public_key) in &recipient_keys {
            shards.push(self.encrypt_for(&member_share, key_id, public_key)?);
        }

        let secret = Secret::new(shards);
        let encoded = match cmd.format {
            WireFormat::Simple => codec::encode_simple(&secret),
            WireFormat::Pem => codec::encode_pem(&secret)?,
        };

        tracing::info!(
            shared_key_id = %cmd.shared_key_id,
            recipients = recipient_keys.len(),
            format = ?cmd.format,
            "encrypted secret"
        );
        Ok(encoded)
    }

    /// エンコード済みの秘密値を復号する。
    ///
    /// - サーバへの問い合わせは共有鍵シャードの 1 回だけで、`cmd.timeout` を超えたら打ち切る。
    /// - 要求者自身の KeyId のシャードだけを使い、他のシャードで代用することはない。
    pub async fn decrypt_secret<M>(
        &self,
        cmd: DecryptSecretCommand,
        mediator: Option<&M>,
    ) -> Result<Zeroizing<String>, EnvelopeError>
    where
        M: ServerMediator + ?Sized,
    {
        let secret = codec::decode_secret(&cmd.encoded)?;

        let requester = cmd.requester.as_ref().ok_or_else(|| {
            EnvelopeError::InsufficientShares("no local private key to open a member shard".into())
        })?;
        let mediator = mediator.ok_or_else(|| {
            EnvelopeError::InsufficientShares("server mediator unavailable for shared shard".into())
        })?;

        let requester_id = requester.key_id();
        if requester_id == cmd.shared_key_id {
            return Err(EnvelopeError::NoMatchingShard(requester_id));
        }
        let member_shard = secret
            .find(&requester_id)
            .ok_or_else(|| EnvelopeError::NoMatchingShard(requester_id.clone()))?;
        let shared_shard = secret.find(&cmd.shared_key_id).ok_or_else(|| {
            EnvelopeError::InsufficientShares(format!(
                "no shard for shared key {}",
                cmd.shared_key_id
            ))
        })?;

        let ciphertext = codec::decode_value(member_shard)?;

        tracing::debug!(
            requester = %requester_id,
            shards = secret.len(),
            "requesting shared shard decryption"
        );

        let shared_share = tokio::time::timeout(
            cmd.timeout,
            mediator.decrypt_share(shared_shard.value(), shared_shard.key_id()),
        )
        .await
        .map_err(|_| EnvelopeError::Cancelled(cmd.timeout))?
        .map_err(|e| match e {
            MediatorError::Network(msg) => EnvelopeError::Network(msg),
            MediatorError::Rejected(msg) => EnvelopeError::Encryption(format!(
                "server refused shard {}: {msg}",
                shared_shard.key_id()
            )),
        })?;

        let member_share = self
            .share_encryption
            .decrypt_share(&ciphertext, requester)
            .map_err(|e| EnvelopeError::Encryption(format!("shard {requester_id}: {e}")))?;

        let bytes = self
            .threshold
            .combine(&[shared_share, member_share])
            .map_err(|e| EnvelopeError::Recombination(e.to_string()))?;
        let body = verify_tag(&bytes)?;
        let plaintext = std::str::from_utf8(body).map_err(|_| {
            EnvelopeError::Recombination("reconstructed secret is not valid UTF-8".into())
        })?;

        tracing::debug!(requester = %requester_id, "decrypted secret");
        Ok(Zeroizing::new(plaintext.to_owned()))
    }

    fn encrypt_for(
        &self,
        share: &crate::domain::Shard,
        key_id: &KeyId,
        public_key: &PublicKey,
    ) -> Result<EncryptedShard, EnvelopeError> {
        let ciphertext = self
            .share_encryption
            .encrypt_share(share, public_key)
            .map_err(|e| EnvelopeError::Encryption(format!("shard {key_id}: {e}")))?;
        Ok(EncryptedShard::new(
            key_id.clone(),
            codec::encode_value(&ciphertext),
        ))
    }
}

/// `plaintext || SHA-256(plaintext)[..INTEGRITY_TAG_LEN]`
fn tag_plaintext(plaintext: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut tagged = Zeroizing::new(Vec::with_capacity(plaintext.len() + INTEGRITY_TAG_LEN));
    tagged.extend_from_slice(plaintext);
    tagged.extend_from_slice(&Sha256::digest(plaintext)[..INTEGRITY_TAG_LEN]);
    tagged
}

/// 復元したバイト列のタグを検証し、タグを除いた平文部分を返す。
fn verify_tag(tagged: &[u8]) -> Result<&[u8], EnvelopeError> {
    let mismatch =
        || EnvelopeError::Recombination("shares do not belong to the same secret".into());
    if tagged.len() <= INTEGRITY_TAG_LEN {
        return Err(mismatch());
    }
    let (body, tag) = tagged.split_at(tagged.len() - INTEGRITY_TAG_LEN);
    if Sha256::digest(body)[..INTEGRITY_TAG_LEN] != *tag {
        return Err(mismatch());
    }
    Ok(body)
}

/// 重複を除き（最初の出現を残す）、空の集合と共有鍵の混入を拒否する。
fn normalize_recipients(
    shared_key_id: &KeyId,
    recipient_key_ids: Vec<KeyId>,
) -> Result<Vec<KeyId>, EnvelopeError> {
    let mut recipients: Vec<KeyId> = Vec::with_capacity(recipient_key_ids.len());
    for key_id in recipient_key_ids {
        if &key_id == shared_key_id {
            return Err(EnvelopeError::InvalidRecipients(format!(
                "shared key {key_id} cannot also be a recipient"
            )));
        }
        if !recipients.contains(&key_id) {
            recipients.push(key_id);
        }
    }
    if recipients.is_empty() {
        return Err(EnvelopeError::InvalidRecipients(
            "at least one recipient is required".into(),
        ));
    }
    Ok(recipients)
}

/// KeyId から公開鍵を引き、フィンガープリントが一致することを確かめる。
fn resolve<L>(lookup: &L, key_id: &KeyId) -> Result<PublicKey, EnvelopeError>
where
    L: PublicKeyLookup + ?Sized,
{
    let public_key = lookup
        .find_public_key(key_id)
        .map_err(|e| EnvelopeError::KeyResolution {
            key_id: key_id.clone(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| EnvelopeError::KeyResolution {
            key_id: key_id.clone(),
            reason: "public key not found".into(),
        })?;

    if &public_key.key_id() != key_id {
        return Err(EnvelopeError::KeyResolution {
            key_id: key_id.clone(),
            reason: format!("fingerprint mismatch: got {}", public_key.key_id()),
        });
    }
    Ok(public_key)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use shardvault_account::{KeyPair, KeyType};

    use super::*;
    use crate::application_service::envelope_service::PublicKeyLookupError;
    use crate::infrastructure::hpke_share_encryption::HpkeShareEncryption;
    use crate::infrastructure::server_mediator::LocalServerMediator;
    use crate::infrastructure::shamir::ShamirThresholdScheme;

    #[derive(Default)]
    struct MapLookup(HashMap<KeyId, PublicKey>);

    impl MapLookup {
        fn with(mut self, key_pair: &KeyPair) -> Self {
            self.0.insert(key_pair.key_id(), key_pair.public_key());
            self
        }
    }

    impl PublicKeyLookup for MapLookup {
        fn find_public_key(
            &self,
            key_id: &KeyId,
        ) -> Result<Option<PublicKey>, PublicKeyLookupError> {
            Ok(self.0.get(key_id).cloned())
        }
    }

    struct Fixture {
        service: EnvelopeService<HpkeShareEncryption, ShamirThresholdScheme>,
        shared: KeyPair,
        alice: KeyPair,
        bob: KeyPair,
        lookup: MapLookup,
    }

    fn fixture() -> Fixture {
        let shared = KeyPair::generate(KeyType::P256);
        let alice = KeyPair::generate(KeyType::P256);
        let bob = KeyPair::generate(KeyType::P256);
        let lookup = MapLookup::default().with(&shared).with(&alice).with(&bob);
        Fixture {
            service: EnvelopeService {
                share_encryption: HpkeShareEncryption,
                threshold: ShamirThresholdScheme,
            },
            shared,
            alice,
            bob,
            lookup,
        }
    }

    fn encrypt_cmd(f: &Fixture, plaintext: &str, format: WireFormat) -> EncryptSecretCommand {
        EncryptSecretCommand {
            plaintext: Zeroizing::new(plaintext.to_string()),
            shared_key_id: f.shared.key_id(),
            recipient_key_ids: vec![f.alice.key_id(), f.bob.key_id()],
            format,
        }
    }

    fn decrypt_cmd(f: &Fixture, encoded: String, requester: Option<KeyPair>) -> DecryptSecretCommand {
        DecryptSecretCommand {
            encoded,
            shared_key_id: f.shared.key_id(),
            requester,
            timeout: Duration::from_secs(5),
        }
    }

    fn mediator(f: &Fixture) -> LocalServerMediator<HpkeShareEncryption> {
        LocalServerMediator::new(f.shared.clone(), HpkeShareEncryption)
    }

    #[tokio::test]
    async fn every_recipient_can_decrypt() {
        let f = fixture();
        let encoded = f
            .service
            .encrypt_secret(encrypt_cmd(&f, "s3cr3t", WireFormat::Simple), &f.lookup)
            .unwrap();
        let mediator = mediator(&f);

        for requester in [f.alice.clone(), f.bob.clone()] {
            let plaintext = f
                .service
                .decrypt_secret(decrypt_cmd(&f, encoded.clone(), Some(requester)), Some(&mediator))
                .await
                .unwrap();
            assert_eq!(plaintext.as_str(), "s3cr3t");
        }
    }

    #[test]
    fn output_lists_shared_shard_first_then_recipients_in_order() {
        let f = fixture();
        let encoded = f
            .service
            .encrypt_secret(encrypt_cmd(&f, "value", WireFormat::Simple), &f.lookup)
            .unwrap();

        let secret = codec::decode_secret(&encoded).unwrap();
        let ids: Vec<KeyId> = secret.key_ids().cloned().collect();
        assert_eq!(ids, vec![f.shared.key_id(), f.alice.key_id(), f.bob.key_id()]);
    }

    #[tokio::test]
    async fn pem_output_decrypts() {
        let f = fixture();
        let encoded = f
            .service
            .encrypt_secret(encrypt_cmd(&f, "pem value", WireFormat::Pem), &f.lookup)
            .unwrap();
        assert!(encoded.starts_with("-----BEGIN ENCRYPTED SECRET-----"));

        let plaintext = f
            .service
            .decrypt_secret(decrypt_cmd(&f, encoded, Some(f.alice.clone())), Some(&mediator(&f)))
            .await
            .unwrap();
        assert_eq!(plaintext.as_str(), "pem value");
    }

    #[test]
    fn duplicate_recipients_are_collapsed() {
        let f = fixture();
        let mut cmd = encrypt_cmd(&f, "v", WireFormat::Simple);
        cmd.recipient_key_ids = vec![f.alice.key_id(), f.bob.key_id(), f.alice.key_id()];

        let encoded = f.service.encrypt_secret(cmd, &f.lookup).unwrap();
        assert_eq!(codec::decode_secret(&encoded).unwrap().len(), 3);
    }

    #[test]
    fn rejects_empty_or_overlapping_recipients() {
        let f = fixture();

        let mut empty = encrypt_cmd(&f, "v", WireFormat::Simple);
        empty.recipient_key_ids.clear();
        assert!(matches!(
            f.service.encrypt_secret(empty, &f.lookup),
            Err(EnvelopeError::InvalidRecipients(_))
        ));

        let mut overlapping = encrypt_cmd(&f, "v", WireFormat::Simple);
        overlapping.recipient_key_ids.push(f.shared.key_id());
        assert!(matches!(
            f.service.encrypt_secret(overlapping, &f.lookup),
            Err(EnvelopeError::InvalidRecipients(_))
        ));
    }

    #[test]
    fn unresolved_recipient_fails_whole_call() {
        let f = fixture();
        let stranger = KeyPair::generate(KeyType::P256);
        let mut cmd = encrypt_cmd(&f, "v", WireFormat::Simple);
        cmd.recipient_key_ids.push(stranger.key_id());

        match f.service.encrypt_secret(cmd, &f.lookup) {
            Err(EnvelopeError::KeyResolution { key_id, .. }) => {
                assert_eq!(key_id, stranger.key_id())
            }
            other => panic!("expected KeyResolution, got {other:?}"),
        }
    }

    #[test]
    fn lookup_returning_wrong_key_is_rejected() {
        let f = fixture();
        let mut lookup = MapLookup::default().with(&f.shared).with(&f.bob);
        lookup.0.insert(f.alice.key_id(), f.bob.public_key());

        let result = f
            .service
            .encrypt_secret(encrypt_cmd(&f, "v", WireFormat::Simple), &lookup);
        assert!(matches!(result, Err(EnvelopeError::KeyResolution { .. })));
    }

    #[test]
    fn empty_plaintext_is_an_encryption_error() {
        let f = fixture();
        let result = f
            .service
            .encrypt_secret(encrypt_cmd(&f, "", WireFormat::Simple), &f.lookup);
        assert!(matches!(result, Err(EnvelopeError::Encryption(_))));
    }

    #[tokio::test]
    async fn missing_requester_or_mediator_is_insufficient() {
        let f = fixture();
        let encoded = f
            .service
            .encrypt_secret(encrypt_cmd(&f, "v", WireFormat::Simple), &f.lookup)
            .unwrap();

        let no_key = f
            .service
            .decrypt_secret(decrypt_cmd(&f, encoded.clone(), None), Some(&mediator(&f)))
            .await;
        assert!(matches!(no_key, Err(EnvelopeError::InsufficientShares(_))));

        let no_mediator = f
            .service
            .decrypt_secret::<LocalServerMediator<HpkeShareEncryption>>(
                decrypt_cmd(&f, encoded, Some(f.alice.clone())),
                None,
            )
            .await;
        assert!(matches!(no_mediator, Err(EnvelopeError::InsufficientShares(_))));
    }

    #[tokio::test]
    async fn missing_shared_shard_is_insufficient() {
        let f = fixture();
        let encoded = f
            .service
            .encrypt_secret(encrypt_cmd(&f, "v", WireFormat::Simple), &f.lookup)
            .unwrap();
        let shards: Vec<EncryptedShard> = codec::decode_secret(&encoded)
            .unwrap()
            .into_shards()
            .into_iter()
            .skip(1)
            .collect();
        let stripped = codec::encode_simple(&Secret::new(shards));

        let result = f
            .service
            .decrypt_secret(decrypt_cmd(&f, stripped, Some(f.alice.clone())), Some(&mediator(&f)))
            .await;
        assert!(matches!(result, Err(EnvelopeError::InsufficientShares(_))));
    }

    #[tokio::test]
    async fn shared_key_cannot_act_as_member() {
        let f = fixture();
        let encoded = f
            .service
            .encrypt_secret(encrypt_cmd(&f, "v", WireFormat::Simple), &f.lookup)
            .unwrap();

        let result = f
            .service
            .decrypt_secret(decrypt_cmd(&f, encoded, Some(f.shared.clone())), Some(&mediator(&f)))
            .await;
        assert!(matches!(result, Err(EnvelopeError::NoMatchingShard(_))));
    }

    #[tokio::test]
    async fn shares_from_different_secrets_never_combine() {
        let f = fixture();
        let mediator = mediator(&f);

        for _ in 0..40 {
            let first = f
                .service
                .encrypt_secret(encrypt_cmd(&f, "a", WireFormat::Simple), &f.lookup)
                .unwrap();
            let second = f
                .service
                .encrypt_secret(encrypt_cmd(&f, "b", WireFormat::Simple), &f.lookup)
                .unwrap();
            let mut spliced = codec::decode_secret(&second).unwrap().into_shards();
            spliced[0] = codec::decode_secret(&first).unwrap().into_shards().remove(0);
            let encoded = codec::encode_simple(&Secret::new(spliced));

            let result = f
                .service
                .decrypt_secret(decrypt_cmd(&f, encoded, Some(f.alice.clone())), Some(&mediator))
                .await;
            assert!(
                matches!(result, Err(EnvelopeError::Recombination(_))),
                "spliced secret decrypted to {result:?}"
            );
        }
    }

    #[test]
    fn tag_check_rejects_short_or_altered_bytes() {
        assert!(matches!(
            verify_tag(&[0u8; INTEGRITY_TAG_LEN]),
            Err(EnvelopeError::Recombination(_))
        ));

        let mut tagged = tag_plaintext(b"value");
        assert_eq!(verify_tag(&tagged).unwrap(), b"value");
        tagged[0] ^= 1;
        assert!(matches!(verify_tag(&tagged), Err(EnvelopeError::Recombination(_))));
    }

    #[tokio::test]
    async fn malformed_text_is_a_format_error() {
        let f = fixture();
        let result = f
            .service
            .decrypt_secret(
                decrypt_cmd(&f, "SOMEKEY(".into(), Some(f.alice.clone())),
                Some(&mediator(&f)),
            )
            .await;
        assert!(matches!(result, Err(EnvelopeError::Format(_))));
    }
}
