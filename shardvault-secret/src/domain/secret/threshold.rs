use zeroize::Zeroizing;

use super::Shard;

/// 秘密値を `parts` 個のシェアに分割し、`threshold` 個から復元する閾値分散のポート。
///
/// このリポジトリでは 2-of-2 でしか呼ばないが、アルゴリズムの差し替えができるよう一般形で定義する。
pub trait ThresholdScheme: Send + Sync {
    fn split(
        &self,
        secret: &[u8],
        parts: usize,
        threshold: usize,
    ) -> Result<Vec<Shard>, ThresholdError>;

    /// シェアの順序は問わない。各シェアが復元に必要な構造（x 座標など）を自前で持つこと。
    fn combine(&self, shards: &[Shard]) -> Result<Zeroizing<Vec<u8>>, ThresholdError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("not enough shares: got {0}")]
    InsufficientShares(usize),

    #[error("malformed shares: {0}")]
    Malformed(String),
}
