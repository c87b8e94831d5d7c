pub mod key_pair;
pub mod key_store;
pub mod public_key_resolver;
