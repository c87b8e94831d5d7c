use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::application_service::project_service::{ProjectRepository, ProjectRepositoryError};
use crate::domain::Project;

/// プロジェクトファイルを 1 つの JSON ファイルとして保存するリポジトリ。
///
/// 同じディレクトリの一時ファイルに書いてから rename する。
pub struct JsonFileProjectRepository {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileProjectRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProjectRepository for JsonFileProjectRepository {
    fn load(&self) -> Result<Project, ProjectRepositoryError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| ProjectRepositoryError::Storage(e.to_string()))?;

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ProjectRepositoryError::NotFound),
            Err(e) => return Err(ProjectRepositoryError::Storage(e.to_string())),
        };
        serde_json::from_str(&content)
            .map_err(|e| ProjectRepositoryError::Serialization(e.to_string()))
    }

    fn save(&self, project: &Project) -> Result<(), ProjectRepositoryError> {
        let json = serde_json::to_vec_pretty(project)
            .map_err(|e| ProjectRepositoryError::Serialization(e.to_string()))?;

        let _guard = self
            .lock
            .lock()
            .map_err(|e| ProjectRepositoryError::Storage(e.to_string()))?;

        let storage = |e: std::io::Error| ProjectRepositoryError::Storage(e.to_string());
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(storage)?;
        tmp.write_all(&json).map_err(storage)?;
        tmp.as_file().sync_all().map_err(storage)?;
        tmp.persist(&self.path).map_err(|e| storage(e.error))?;

        tracing::debug!(path = %self.path.display(), "saved project file");
        Ok(())
    }
}

/// テスト用のインメモリリポジトリ。`Default` はプロジェクト未作成の状態。
#[derive(Clone, Default)]
pub struct InMemoryProjectRepository {
    inner: Arc<Mutex<Option<Project>>>,
}

impl InMemoryProjectRepository {
    pub fn new(project: Project) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(project))),
        }
    }
}

impl ProjectRepository for InMemoryProjectRepository {
    fn load(&self) -> Result<Project, ProjectRepositoryError> {
        let guard = self
            .inner
            .lock()
            .map_err(|e| ProjectRepositoryError::Storage(e.to_string()))?;
        guard.clone().ok_or(ProjectRepositoryError::NotFound)
    }

    fn save(&self, project: &Project) -> Result<(), ProjectRepositoryError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| ProjectRepositoryError::Storage(e.to_string()))?;
        *guard = Some(project.clone());
        Ok(())
    }
}
