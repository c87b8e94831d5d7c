mod port;
mod service;

pub use port::{
    KeyStoreError, LocalKeyStore, PublicKeyResolver, PublicKeyResolverError,
};
pub use service::{KeyCache, KeyCacheError};
