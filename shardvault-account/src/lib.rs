//! チームで共有する秘密値の受信者鍵（メンバー鍵・サービス鍵・共有鍵）を扱うクレート。
//!
//! - `domain`: 鍵を指し示す `KeyId`
//! - `application_service`: 鍵キャッシュ（ローカルストア + リモート解決の write-through）
//! - `infrastructure`: P-256 鍵ペア、各種ストア、HTTP 公開鍵リゾルバ

pub mod application_service;
pub mod domain;
pub mod infrastructure;

pub use application_service::key_cache_service::{
    KeyCache, KeyCacheError, KeyStoreError, LocalKeyStore, PublicKeyResolver,
    PublicKeyResolverError,
};
pub use domain::key_id::KeyId;
pub use infrastructure::key_pair::{KeyPair, KeyPairError, KeyType, PublicKey};
