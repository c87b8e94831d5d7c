use crate::application_service::envelope_service::EnvelopeError;
use crate::domain::{Project, ProjectError};

/// プロジェクトファイルを読み書きするポート。
///
/// 保存は丸ごと置き換えで、書きかけの状態が読まれないようにすること。
pub trait ProjectRepository: Send + Sync {
    fn load(&self) -> Result<Project, ProjectRepositoryError>;

    fn save(&self, project: &Project) -> Result<(), ProjectRepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectRepositoryError {
    #[error("project not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// プロジェクト単位の秘密値操作で発生しうるエラー。
#[derive(Debug, thiserror::Error)]
pub enum ProjectServiceError {
    #[error("project repository error: {0}")]
    Repository(#[from] ProjectRepositoryError),

    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidName(#[from] ProjectError),

    #[error("secret {name}: {source}")]
    Envelope { name: String, source: EnvelopeError },
}
