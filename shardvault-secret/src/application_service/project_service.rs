mod port;
mod service;

pub use port::{ProjectRepository, ProjectRepositoryError, ProjectServiceError};
pub use service::{DecryptContext, ProjectSecretsService};
