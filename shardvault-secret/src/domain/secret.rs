pub mod codec;
pub mod encryption;
pub mod shard;
pub mod threshold;

pub use encryption::{ShareEncryption, ShareEncryptionError};
pub use shard::{EncryptedShard, Shard};
pub use threshold::{ThresholdError, ThresholdScheme};

use shardvault_account::KeyId;

/// 1 つの秘密値を表すシャード列。
///
/// - 共有鍵（サーバだけが復号できる鍵）向けのシャードがちょうど 1 つ、
///   メンバー / サービス鍵向けのシャードが 1 つ以上並ぶ。
/// - メンバー / サービス向けのシャードはすべて「同じシェア」をそれぞれの公開鍵で暗号化したもの。
/// - 平文や受信者集合が変わったときは部分更新せず、新しい `Secret` を丸ごと作り直す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    shards: Vec<EncryptedShard>,
}

impl Secret {
    pub fn new(shards: Vec<EncryptedShard>) -> Self {
        Self { shards }
    }

    pub fn shards(&self) -> &[EncryptedShard] {
        &self.shards
    }

    pub fn into_shards(self) -> Vec<EncryptedShard> {
        self.shards
    }

    /// 指定した KeyId 向けのシャードを探す。完全一致のみで、他のシャードで代用はしない。
    pub fn find(&self, key_id: &KeyId) -> Option<&EncryptedShard> {
        self.shards.iter().find(|s| s.key_id() == key_id)
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &KeyId> {
        self.shards.iter().map(EncryptedShard::key_id)
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
