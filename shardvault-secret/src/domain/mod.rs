pub mod project;
pub mod secret;

pub use project::{Project, ProjectError, RecipientDirectory};
pub use secret::{
    codec, EncryptedShard, Secret, Shard, ShareEncryption, ShareEncryptionError, ThresholdError,
    ThresholdScheme,
};
