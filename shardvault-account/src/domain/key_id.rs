use std::fmt;

use serde::{Deserialize, Serialize};

/// 鍵を識別するための KeyId（公開鍵のフィンガープリント）。
///
/// - 生成ロジック（ハッシュの取り方）は infra 側の `fingerprint` に委譲する。
/// - ドメインでは「シャードと鍵を結びつける唯一のアドレス」としてのみ扱い、文字列比較以外の意味を持たせない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
