//! シャード列のワイヤ表現。
//!
//! ```text
//! Segment = KeyID "(" Base64Value ")"
//! Body    = Segment ("-" Segment)*
//! ```
//!
//! PEM 形式は `Body` の UTF-8 バイト列を `ENCRYPTED SECRET` ラベルのブロックで包んだもの。
//! 区切り文字 `(` `)` `-` のエスケープは行わないため、KeyID / Value にこれらを含めることはできない。

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use pem_rfc7468::LineEnding;
use shardvault_account::KeyId;

use super::{EncryptedShard, Secret};

pub const SECRET_PEM_LABEL: &str = "ENCRYPTED SECRET";

const SEGMENT_SEPARATOR: &str = "-";
const VALUE_OPEN: char = '(';
const VALUE_CLOSE: char = ')';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("empty secret")]
    EmptyInput,

    #[error("malformed segment {index}: {reason}")]
    MalformedSegment { index: usize, reason: &'static str },

    #[error("invalid value for key {key_id}: {reason}")]
    InvalidValue { key_id: KeyId, reason: String },

    #[error("malformed PEM: {0}")]
    Pem(String),

    #[error("duplicate key id {key_id} at segment {index}")]
    DuplicateKeyId { index: usize, key_id: KeyId },
}

/// シャードを入力順のまま `KeyID(Value)` を `-` で連結する。
pub fn encode_simple(secret: &Secret) -> String {
    secret
        .shards()
        .iter()
        .map(|s| format!("{}{VALUE_OPEN}{}{VALUE_CLOSE}", s.key_id(), s.value()))
        .collect::<Vec<_>>()
        .join(SEGMENT_SEPARATOR)
}

/// simple 形式をパースする。1 セグメントでも不正なら全体をエラーにする（部分的なパース結果は返さない）。
/// 同じ KeyID が 2 回以上現れた場合も不正とする。
pub fn decode_simple_secret(text: &str) -> Result<Secret, CodecError> {
    if text.is_empty() {
        return Err(CodecError::EmptyInput);
    }

    let mut seen = HashSet::new();
    let mut shards = Vec::new();
    for (index, segment) in text.split(SEGMENT_SEPARATOR).enumerate() {
        let shard = decode_segment(index, segment)?;
        if !seen.insert(shard.key_id().clone()) {
            return Err(CodecError::DuplicateKeyId {
                index,
                key_id: shard.key_id().clone(),
            });
        }
        shards.push(shard);
    }

    Ok(Secret::new(shards))
}

fn decode_segment(index: usize, segment: &str) -> Result<EncryptedShard, CodecError> {
    let malformed = |reason| CodecError::MalformedSegment { index, reason };

    if segment.matches(VALUE_OPEN).count() != 1 {
        return Err(malformed("expected exactly one '('"));
    }
    if segment.matches(VALUE_CLOSE).count() != 1 {
        return Err(malformed("expected exactly one ')'"));
    }

    let (key_id, rest) = segment
        .split_once(VALUE_OPEN)
        .ok_or_else(|| malformed("expected exactly one '('"))?;
    let value = rest
        .strip_suffix(VALUE_CLOSE)
        .ok_or_else(|| malformed("')' must close the segment"))?;

    if key_id.is_empty() {
        return Err(malformed("empty key id"));
    }
    if value.is_empty() {
        return Err(malformed("empty value"));
    }

    Ok(EncryptedShard::new(KeyId::new(key_id), value.to_string()))
}

/// simple 形式の本文を PEM ブロックで包む。
pub fn encode_pem(secret: &Secret) -> Result<String, CodecError> {
    pem_rfc7468::encode_string(
        SECRET_PEM_LABEL,
        LineEnding::LF,
        encode_simple(secret).as_bytes(),
    )
    .map_err(|e| CodecError::Pem(e.to_string()))
}

/// PEM の枠組み（ラベル・base64）の不正は `CodecError::Pem`、中身の simple 形式の不正は
/// `decode_simple_secret` と同じエラーになる。
pub fn decode_pem(text: &str) -> Result<Secret, CodecError> {
    let (label, body) =
        pem_rfc7468::decode_vec(text.as_bytes()).map_err(|e| CodecError::Pem(e.to_string()))?;

    if label != SECRET_PEM_LABEL {
        return Err(CodecError::Pem(format!("unexpected label: {label}")));
    }

    let body = String::from_utf8(body).map_err(|e| CodecError::Pem(e.to_string()))?;
    decode_simple_secret(&body)
}

/// 先頭が `-----BEGIN` なら PEM、そうでなければ simple 形式としてパースする。
pub fn decode_secret(text: &str) -> Result<Secret, CodecError> {
    let text = text.trim_start();
    if text.starts_with("-----BEGIN") {
        decode_pem(text)
    } else {
        decode_simple_secret(text.trim_end())
    }
}

/// 暗号文バイト列をシャードの `Value` 表現（標準 base64）にする。
///
/// 標準アルファベットは `(` `)` `-` を含まないので区切り文字と衝突しない。
pub fn encode_value(ciphertext: &[u8]) -> String {
    BASE64_STANDARD.encode(ciphertext)
}

pub fn decode_value(shard: &EncryptedShard) -> Result<Vec<u8>, CodecError> {
    BASE64_STANDARD
        .decode(shard.value())
        .map_err(|e| CodecError::InvalidValue {
            key_id: shard.key_id().clone(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard(key_id: &str, value: &str) -> EncryptedShard {
        EncryptedShard::new(KeyId::new(key_id), value.to_string())
    }

    #[test]
    fn decode_single_segment() {
        let secret = decode_simple_secret("SOMEKEYID(SOMEVALUE)").unwrap();
        assert_eq!(secret.shards(), &[shard("SOMEKEYID", "SOMEVALUE")]);
    }

    #[test]
    fn decode_rejects_malformed_input() {
        for bad in [
            "SOMEKEYIDSOMEVALUE)",
            "",
            "SOMEKEY(",
            "A)B(",
            "A((B)",
            "A(B))",
            "A(B)C",
            "(B)",
            "A()",
            "A(B)-",
            "A(B)-C(D",
        ] {
            assert!(
                decode_simple_secret(bad).is_err(),
                "expected error for {bad:?}"
            );
        }
        assert_eq!(decode_simple_secret(""), Err(CodecError::EmptyInput));
    }

    #[test]
    fn decode_reports_first_bad_segment_index() {
        let err = decode_simple_secret("A(B)-C(D)-EF)").unwrap_err();
        assert!(matches!(err, CodecError::MalformedSegment { index: 2, .. }));
    }

    #[test]
    fn decode_rejects_repeated_key_id() {
        let err = decode_simple_secret("shared(AAAA)-alice(BBBB)-alice(CCCC)").unwrap_err();
        assert_eq!(
            err,
            CodecError::DuplicateKeyId {
                index: 2,
                key_id: KeyId::new("alice"),
            }
        );

        let pem = pem_rfc7468::encode_string(SECRET_PEM_LABEL, LineEnding::LF, b"A(AAAA)-A(BBBB)")
            .unwrap();
        assert!(matches!(
            decode_secret(&pem).unwrap_err(),
            CodecError::DuplicateKeyId { index: 1, .. }
        ));
    }

    #[test]
    fn encode_preserves_order() {
        let secret = Secret::new(vec![
            shard("shared", "c2hhcmVk"),
            shard("alice", "YWxpY2U="),
            shard("bob", "Ym9i"),
        ]);
        let encoded = encode_simple(&secret);
        assert_eq!(encoded, "shared(c2hhcmVk)-alice(YWxpY2U=)-bob(Ym9i)");
        assert_eq!(decode_simple_secret(&encoded).unwrap(), secret);
    }

    #[test]
    fn pem_roundtrip() {
        let secret = Secret::new(vec![shard("shared", "AAAA"), shard("alice", "BBBB+/==")]);
        let pem = encode_pem(&secret).unwrap();
        assert!(pem.starts_with("-----BEGIN ENCRYPTED SECRET-----"));

        assert_eq!(decode_pem(&pem).unwrap(), secret);
        assert_eq!(decode_secret(&pem).unwrap(), secret);
    }

    #[test]
    fn pem_framing_errors_are_distinct_from_body_errors() {
        let framing = decode_pem("-----BEGIN ENCRYPTED SECRET-----\n!!!!\n").unwrap_err();
        assert!(matches!(framing, CodecError::Pem(_)));

        let wrong_label = pem_rfc7468::encode_string("PUBLIC KEY", LineEnding::LF, b"A(B)").unwrap();
        assert!(matches!(decode_pem(&wrong_label), Err(CodecError::Pem(_))));

        let bad_body =
            pem_rfc7468::encode_string(SECRET_PEM_LABEL, LineEnding::LF, b"not-a-secret").unwrap();
        assert!(matches!(
            decode_pem(&bad_body),
            Err(CodecError::MalformedSegment { .. })
        ));
    }

    #[test]
    fn delimiters_inside_key_id_do_not_roundtrip() {
        // 区切り文字はエスケープしないので、`-` を含む KeyID は別のセグメントに割れてしまう。
        let secret = Secret::new(vec![shard("team-key", "AAAA")]);
        let encoded = encode_simple(&secret);
        assert_eq!(encoded, "team-key(AAAA)");
        assert!(decode_simple_secret(&encoded).is_err());

        let secret = Secret::new(vec![shard("key", "A(A)")]);
        assert!(decode_simple_secret(&encode_simple(&secret)).is_err());
    }

    #[test]
    fn value_base64_roundtrip_and_error() {
        let encoded = encode_value(&[0xfb, 0xff, 0x00]);
        assert!(!encoded.contains(['(', ')', '-']));
        let s = shard("k", &encoded);
        assert_eq!(decode_value(&s).unwrap(), vec![0xfb, 0xff, 0x00]);

        let err = decode_value(&shard("k", "@@@")).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { .. }));
    }
}
