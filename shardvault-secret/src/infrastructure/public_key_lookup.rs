use shardvault_account::{KeyCache, KeyId, LocalKeyStore, PublicKey};

use crate::application_service::envelope_service::{PublicKeyLookup, PublicKeyLookupError};

/// 鍵キャッシュに揃っている公開鍵を引く。
///
/// キャッシュに無い KeyId は `Ok(None)` になるので、事前に `precache_pubs` を呼んでおくこと。
impl<S> PublicKeyLookup for KeyCache<S>
where
    S: LocalKeyStore,
{
    fn find_public_key(&self, key_id: &KeyId) -> Result<Option<PublicKey>, PublicKeyLookupError> {
        match self.load_public_key(key_id) {
            Ok(public_key) => Ok(Some(public_key)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(PublicKeyLookupError::Lookup(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardvault_account::infrastructure::key_store::InMemoryLocalKeyStore;
    use shardvault_account::infrastructure::public_key_resolver::InMemoryPublicKeyResolver;
    use shardvault_account::{KeyPair, KeyType};

    #[tokio::test]
    async fn finds_keys_after_precache() {
        let cache = KeyCache::new(InMemoryLocalKeyStore::default());
        let resolver = InMemoryPublicKeyResolver::default();
        let kp = KeyPair::generate(KeyType::P256);
        let key_id = resolver.register(&kp.public_key().to_pem().unwrap()).unwrap();

        assert!(cache.find_public_key(&key_id).unwrap().is_none());

        cache.precache_pubs(&[key_id.clone()], &resolver).await.unwrap();
        assert_eq!(cache.find_public_key(&key_id).unwrap(), Some(kp.public_key()));
    }

    #[test]
    fn corrupt_cache_entry_is_a_lookup_error() {
        let cache = KeyCache::new(InMemoryLocalKeyStore::default());
        let key_id = KeyId::new("abcdef");
        cache.put_pub(&key_id, "not a pem").unwrap();

        assert!(matches!(
            cache.find_public_key(&key_id),
            Err(PublicKeyLookupError::Lookup(_))
        ));
    }
}
