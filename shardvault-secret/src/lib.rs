//! 秘密値を 2-of-2 で分割し、共有鍵（サーバ）と受信者鍵（メンバー / サービス）に
//! 分けて暗号化するエンベロープ暗号化エンジン。
//!
//! - `domain`: シャード・`Secret`・ワイヤ形式・プロジェクトファイル
//! - `application_service`: 暗号化 / 復号のユースケースと、プロジェクト単位の一括操作
//! - `infrastructure`: HPKE・Shamir・サーバメディエータ・リポジトリ・設定
//! - `presentation`: メディエータサーバの HTTP ルーティング

pub mod application_service;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application_service::envelope_service::{
    DecryptSecretCommand, EncryptSecretCommand, EnvelopeError, EnvelopeService, MediatorError,
    PublicKeyLookup, ServerMediator, WireFormat,
};
pub use application_service::project_service::{
    DecryptContext, ProjectRepository, ProjectSecretsService, ProjectServiceError,
};
pub use domain::{EncryptedShard, Project, RecipientDirectory, Secret, Shard};
