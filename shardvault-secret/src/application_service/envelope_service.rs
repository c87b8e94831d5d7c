mod command;
mod port;
mod service;

pub use command::{DecryptSecretCommand, EncryptSecretCommand, WireFormat};
pub use port::{
    EnvelopeError, MediatorError, PublicKeyLookup, PublicKeyLookupError, ServerMediator,
};
pub use service::EnvelopeService;
