use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use shardvault_account::{KeyCache, KeyCacheError, KeyId, KeyPair, KeyType, LocalKeyStore};

/// 鍵ディレクトリ内で現在の共有鍵の KeyId を記録するファイル名。
pub const SHARED_KEY_MARKER: &str = "shared_key_id";

#[derive(Debug, thiserror::Error)]
pub enum SharedKeyError {
    #[error("key cache error: {0}")]
    KeyCache(#[from] KeyCacheError),

    #[error("IO error: {0}")]
    Io(String),
}

/// サーバの共有鍵を用意する。
///
/// - `configured` があればその鍵を読み込む（無ければエラー）。
/// - 無ければ `key_dir/shared_key_id` に記録された鍵を読み込む。
/// - どちらも無い初回起動時は新しく生成して保存し、記録ファイルを書く。
pub fn load_or_generate_shared_key<S>(
    key_cache: &KeyCache<S>,
    key_dir: &Path,
    configured: Option<&KeyId>,
) -> Result<KeyPair, SharedKeyError>
where
    S: LocalKeyStore,
{
    if let Some(key_id) = configured {
        return Ok(key_cache.load_key_pair(key_id)?);
    }

    let marker = key_dir.join(SHARED_KEY_MARKER);
    match fs::read_to_string(&marker) {
        Ok(content) => {
            let key_id = KeyId::new(content.trim());
            tracing::info!(key_id = %key_id, "loaded shared key");
            return Ok(key_cache.load_key_pair(&key_id)?);
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(SharedKeyError::Io(e.to_string())),
    }

    let key_pair = KeyPair::generate(KeyType::P256);
    let key_id = key_cache.store_key_pair(&key_pair)?;
    fs::create_dir_all(key_dir).map_err(|e| SharedKeyError::Io(e.to_string()))?;
    fs::write(&marker, key_id.as_str()).map_err(|e| SharedKeyError::Io(e.to_string()))?;

    tracing::info!(key_id = %key_id, "generated new shared key");
    Ok(key_pair)
}
