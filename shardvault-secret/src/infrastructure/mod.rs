pub mod config;
pub mod hpke_share_encryption;
pub mod project_repository;
pub mod public_key_lookup;
pub mod server_mediator;
pub mod shamir;
pub mod shared_key;
