use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use zeroize::Zeroizing;

use crate::application_service::key_cache_service::{KeyStoreError, LocalKeyStore};
use crate::domain::KeyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyKind {
    Private,
    Public,
}

impl KeyKind {
    fn suffix(self) -> &'static str {
        match self {
            KeyKind::Private => "priv",
            KeyKind::Public => "pub",
        }
    }
}

/// プロセス内の `HashMap` に鍵 PEM を保存するインメモリ実装。
///
/// - 永続化は行わず、プロセス終了とともに破棄される。
/// - ローカル開発やテスト、PoC 用途を想定。
#[derive(Clone, Default)]
pub struct InMemoryLocalKeyStore {
    inner: Arc<Mutex<HashMap<(KeyKind, KeyId), String>>>,
}

impl InMemoryLocalKeyStore {
    fn put(&self, kind: KeyKind, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| KeyStoreError::Storage(e.to_string()))?;

        guard.insert((kind, key_id.clone()), pem.to_string());
        Ok(())
    }

    fn get(&self, kind: KeyKind, key_id: &KeyId) -> Result<String, KeyStoreError> {
        let guard = self
            .inner
            .lock()
            .map_err(|e| KeyStoreError::Storage(e.to_string()))?;

        guard
            .get(&(kind, key_id.clone()))
            .cloned()
            .ok_or_else(|| KeyStoreError::NotFound(key_id.clone()))
    }
}

impl LocalKeyStore for InMemoryLocalKeyStore {
    fn put_priv(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        self.put(KeyKind::Private, key_id, pem)
    }

    fn get_priv(&self, key_id: &KeyId) -> Result<Zeroizing<String>, KeyStoreError> {
        self.get(KeyKind::Private, key_id).map(Zeroizing::new)
    }

    fn put_pub(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        self.put(KeyKind::Public, key_id, pem)
    }

    fn get_pub(&self, key_id: &KeyId) -> Result<String, KeyStoreError> {
        self.get(KeyKind::Public, key_id)
    }
}

/// ディレクトリ配下に「1 ID = 1 ファイル」で鍵 PEM を保存する実装。
///
/// - ファイル名: `<key_id>.pub.pem` / `<key_id>.priv.pem`
/// - 書き込みは同じディレクトリ内の一時ファイルに書いてから rename するため、
///   読み手が書きかけのファイルを見ることはない。
/// - プロセス内の並行書き込みは `RwLock` で直列化する。
pub struct DirectoryLocalKeyStore {
    dir: PathBuf,
    lock: RwLock<()>,
}

impl DirectoryLocalKeyStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, KeyStoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| KeyStoreError::Storage(e.to_string()))?;
        Ok(Self {
            dir,
            lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, kind: KeyKind, key_id: &KeyId) -> Result<PathBuf, KeyStoreError> {
        validate_key_id(key_id)?;
        Ok(self
            .dir
            .join(format!("{}.{}.pem", key_id.as_str(), kind.suffix())))
    }

    fn put(&self, kind: KeyKind, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        let path = self.path_for(kind, key_id)?;
        let _guard = self
            .lock
            .write()
            .map_err(|e| KeyStoreError::Storage(e.to_string()))?;

        let storage = |e: std::io::Error| KeyStoreError::Storage(e.to_string());

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(storage)?;
        tmp.write_all(pem.as_bytes()).map_err(storage)?;
        tmp.as_file().sync_all().map_err(storage)?;

        if kind == KeyKind::Private {
            restrict_permissions(tmp.path()).map_err(storage)?;
        }

        tmp.persist(&path).map_err(|e| storage(e.error))?;
        Ok(())
    }

    fn get(&self, kind: KeyKind, key_id: &KeyId) -> Result<String, KeyStoreError> {
        let path = self.path_for(kind, key_id)?;
        let _guard = self
            .lock
            .read()
            .map_err(|e| KeyStoreError::Storage(e.to_string()))?;

        match fs::read_to_string(&path) {
            Ok(pem) => Ok(pem),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(KeyStoreError::NotFound(key_id.clone())),
            Err(e) => Err(KeyStoreError::Storage(e.to_string())),
        }
    }
}

impl LocalKeyStore for DirectoryLocalKeyStore {
    fn put_priv(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        self.put(KeyKind::Private, key_id, pem)
    }

    fn get_priv(&self, key_id: &KeyId) -> Result<Zeroizing<String>, KeyStoreError> {
        self.get(KeyKind::Private, key_id).map(Zeroizing::new)
    }

    fn put_pub(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        self.put(KeyKind::Public, key_id, pem)
    }

    fn get_pub(&self, key_id: &KeyId) -> Result<String, KeyStoreError> {
        self.get(KeyKind::Public, key_id)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// ファイル名に使えない ID（パス区切りや `..` を含むもの）を弾く。
fn validate_key_id(key_id: &KeyId) -> Result<(), KeyStoreError> {
    let id = key_id.as_str();
    if id.is_empty() {
        return Err(KeyStoreError::InvalidKeyId("key id must not be empty".into()));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(KeyStoreError::InvalidKeyId(format!(
            "key id contains unsupported characters: {id}"
        )));
    }
    Ok(())
}

/// sled を用いた鍵ストア実装。
///
/// - キー: `"pub:<key_id>"` / `"priv:<key_id>"`（UTF-8 文字列）
/// - 値: PEM 文字列のバイト列
pub struct SledLocalKeyStore {
    db: sled::Db,
}

impl SledLocalKeyStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KeyStoreError> {
        let db = sled::open(path).map_err(|e| KeyStoreError::Storage(e.to_string()))?;
        Ok(Self { db })
    }

    fn sled_key(kind: KeyKind, key_id: &KeyId) -> String {
        format!("{}:{}", kind.suffix(), key_id.as_str())
    }

    fn put(&self, kind: KeyKind, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        self.db
            .insert(Self::sled_key(kind, key_id), pem.as_bytes())
            .map_err(|e| KeyStoreError::Storage(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| KeyStoreError::Storage(e.to_string()))?;
        Ok(())
    }

    fn get(&self, kind: KeyKind, key_id: &KeyId) -> Result<String, KeyStoreError> {
        let opt = self
            .db
            .get(Self::sled_key(kind, key_id))
            .map_err(|e| KeyStoreError::Storage(e.to_string()))?;

        let Some(ivec) = opt else {
            return Err(KeyStoreError::NotFound(key_id.clone()));
        };

        String::from_utf8(ivec.to_vec()).map_err(|e| KeyStoreError::Storage(e.to_string()))
    }
}

impl LocalKeyStore for SledLocalKeyStore {
    fn put_priv(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        self.put(KeyKind::Private, key_id, pem)
    }

    fn get_priv(&self, key_id: &KeyId) -> Result<Zeroizing<String>, KeyStoreError> {
        self.get(KeyKind::Private, key_id).map(Zeroizing::new)
    }

    fn put_pub(&self, key_id: &KeyId, pem: &str) -> Result<(), KeyStoreError> {
        self.put(KeyKind::Public, key_id, pem)
    }

    fn get_pub(&self, key_id: &KeyId) -> Result<String, KeyStoreError> {
        self.get(KeyKind::Public, key_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_store(store: &dyn LocalKeyStore) {
        let id = KeyId::new("0123abcd");

        assert!(matches!(
            store.get_pub(&id),
            Err(KeyStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_priv(&id),
            Err(KeyStoreError::NotFound(_))
        ));

        store.put_pub(&id, "public-pem").unwrap();
        store.put_priv(&id, "private-pem").unwrap();
        assert_eq!(store.get_pub(&id).unwrap(), "public-pem");
        assert_eq!(store.get_priv(&id).unwrap().as_str(), "private-pem");

        // 上書き
        store.put_pub(&id, "public-pem-2").unwrap();
        assert_eq!(store.get_pub(&id).unwrap(), "public-pem-2");
    }

    #[test]
    fn in_memory_store_put_get() {
        exercise_store(&InMemoryLocalKeyStore::default());
    }

    #[test]
    fn directory_store_put_get() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DirectoryLocalKeyStore::open(dir.path().join("keys")).expect("open dir");
        exercise_store(&store);

        assert!(dir.path().join("keys/0123abcd.pub.pem").exists());
        assert!(dir.path().join("keys/0123abcd.priv.pem").exists());
    }

    #[test]
    fn sled_store_put_get() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SledLocalKeyStore::open(dir.path().join("keys_db")).expect("open sled");
        exercise_store(&store);
    }

    #[test]
    fn directory_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DirectoryLocalKeyStore::open(dir.path()).expect("open dir");

        for bad in ["", "../escape", "a/b", "a.b"] {
            let result = store.put_pub(&KeyId::new(bad), "pem");
            assert!(
                matches!(result, Err(KeyStoreError::InvalidKeyId(_))),
                "expected InvalidKeyId for {bad:?}"
            );
        }
    }

    #[test]
    fn directory_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = KeyId::new("cafe");
        {
            let store = DirectoryLocalKeyStore::open(dir.path()).unwrap();
            store.put_pub(&id, "persisted").unwrap();
        }
        let store = DirectoryLocalKeyStore::open(dir.path()).unwrap();
        assert_eq!(store.get_pub(&id).unwrap(), "persisted");
    }

    #[test]
    fn directory_store_concurrent_writes_are_never_torn() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(DirectoryLocalKeyStore::open(dir.path()).unwrap());
        let id = KeyId::new("shared");
        let values: Vec<String> = (0..8).map(|i| format!("{i}").repeat(4096)).collect();
        let values = &values;

        std::thread::scope(|s| {
            for value in values {
                let store = Arc::clone(&store);
                let id = id.clone();
                s.spawn(move || {
                    for _ in 0..10 {
                        store.put_pub(&id, value).unwrap();
                        let read = store.get_pub(&id).unwrap();
                        assert!(values.contains(&read), "observed a partially written key");
                    }
                });
            }
        });
    }
}
