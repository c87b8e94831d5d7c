use std::collections::BTreeMap;
use std::time::Duration;

use shardvault_account::{KeyId, KeyPair};
use zeroize::Zeroizing;

use crate::application_service::envelope_service::{
    DecryptSecretCommand, EncryptSecretCommand, EnvelopeError, EnvelopeService, PublicKeyLookup,
    ServerMediator, WireFormat,
};
use crate::domain::{Project, RecipientDirectory, ShareEncryption, ThresholdScheme};

use super::{ProjectRepository, ProjectServiceError};

/// 復号に必要なもの一式。呼び出しごとに渡す。
pub struct DecryptContext<'a, M: ?Sized> {
    pub requester: Option<&'a KeyPair>,
    pub mediator: Option<&'a M>,
    pub timeout: Duration,
}

impl<M: ?Sized> Clone for DecryptContext<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: ?Sized> Copy for DecryptContext<'_, M> {}

/// プロジェクトファイルに対する秘密値のユースケース。
///
/// - 受信者集合はプロジェクトファイル（`RecipientDirectory`）から取る。
/// - 変数ごとの失敗は他の変数に影響させない。ただし受信者の入れ替えは全変数が成功したときだけ保存する。
pub struct ProjectSecretsService<R, E, T> {
    pub project_repository: R,
    pub envelope: EnvelopeService<E, T>,
}

impl<R, E, T> ProjectSecretsService<R, E, T>
where
    R: ProjectRepository,
    E: ShareEncryption,
    T: ThresholdScheme,
{
    pub fn secret_names(&self) -> Result<Vec<String>, ProjectServiceError> {
        Ok(self.project_repository.load()?.secret_names())
    }

    /// 現在の受信者集合向けに暗号化して保存する。既存の値は丸ごと置き換える。
    pub fn set_secret<L>(
        &self,
        name: &str,
        plaintext: Zeroizing<String>,
        format: WireFormat,
        lookup: &L,
    ) -> Result<(), ProjectServiceError>
    where
        L: PublicKeyLookup + ?Sized,
    {
        let mut project = self.project_repository.load()?;
        let encoded = encrypt_for_project(&self.envelope, &project, name, plaintext, format, lookup)?;
        project.put_secret(name, encoded)?;
        self.project_repository.save(&project)?;

        tracing::info!(name, "stored secret");
        Ok(())
    }

    pub async fn get_secret<M>(
        &self,
        name: &str,
        ctx: DecryptContext<'_, M>,
    ) -> Result<Zeroizing<String>, ProjectServiceError>
    where
        M: ServerMediator + ?Sized,
    {
        let project = self.project_repository.load()?;
        let encoded = project
            .secret(name)
            .ok_or_else(|| ProjectServiceError::NotFound(name.to_string()))?;
        decrypt_one(&self.envelope, &project, name, encoded, ctx).await
    }

    /// すべての変数を復号する。結果は変数ごとで、1 つの失敗が他を止めることはない。
    pub async fn decrypt_all<M>(
        &self,
        ctx: DecryptContext<'_, M>,
    ) -> Result<BTreeMap<String, Result<Zeroizing<String>, ProjectServiceError>>, ProjectServiceError>
    where
        M: ServerMediator + ?Sized,
    {
        let project = self.project_repository.load()?;
        let mut results = BTreeMap::new();
        for (name, encoded) in project.secrets() {
            let result = decrypt_one(&self.envelope, &project, name, encoded, ctx).await;
            if let Err(e) = &result {
                tracing::warn!(name = %name, error = %e, "failed to decrypt secret");
            }
            results.insert(name.clone(), result);
        }
        Ok(results)
    }

    /// 受信者集合を入れ替え、すべての変数を新しい集合向けに暗号化し直す。
    ///
    /// 1 つでも失敗した場合は何も保存せず、その変数名を含むエラーを返す。
    /// 各変数は元の形式（Simple / PEM）を保つ。
    pub async fn rotate_recipients<M, L>(
        &self,
        member_key_ids: Vec<KeyId>,
        service_key_ids: Vec<KeyId>,
        ctx: DecryptContext<'_, M>,
        lookup: &L,
    ) -> Result<(), ProjectServiceError>
    where
        M: ServerMediator + ?Sized,
        L: PublicKeyLookup + ?Sized,
    {
        let project = self.project_repository.load()?;

        let mut rotated = project.clone();
        rotated.replace_recipients(member_key_ids, service_key_ids);

        for (name, encoded) in project.secrets() {
            let plaintext = decrypt_one(&self.envelope, &project, name, encoded, ctx).await?;
            let format = detect_format(encoded);
            let reencoded =
                encrypt_for_project(&self.envelope, &rotated, name, plaintext, format, lookup)?;
            rotated.put_secret(name, reencoded)?;
        }

        self.project_repository.save(&rotated)?;
        tracing::info!(
            secrets = rotated.secrets().len(),
            recipients = rotated.recipient_key_ids().len(),
            "rotated project recipients"
        );
        Ok(())
    }

    pub fn remove_secret(&self, name: &str) -> Result<(), ProjectServiceError> {
        let mut project = self.project_repository.load()?;
        project
            .remove_secret(name)
            .ok_or_else(|| ProjectServiceError::NotFound(name.to_string()))?;
        self.project_repository.save(&project)?;

        tracing::info!(name, "removed secret");
        Ok(())
    }
}

fn encrypt_for_project<E, T, L>(
    envelope: &EnvelopeService<E, T>,
    project: &Project,
    name: &str,
    plaintext: Zeroizing<String>,
    format: WireFormat,
    lookup: &L,
) -> Result<String, ProjectServiceError>
where
    E: ShareEncryption,
    T: ThresholdScheme,
    L: PublicKeyLookup + ?Sized,
{
    let cmd = EncryptSecretCommand {
        plaintext,
        shared_key_id: project.shared_key_id().clone(),
        recipient_key_ids: project.recipient_key_ids(),
        format,
    };
    envelope
        .encrypt_secret(cmd, lookup)
        .map_err(|source| with_name(name, source))
}

async fn decrypt_one<E, T, M>(
    envelope: &EnvelopeService<E, T>,
    project: &Project,
    name: &str,
    encoded: &str,
    ctx: DecryptContext<'_, M>,
) -> Result<Zeroizing<String>, ProjectServiceError>
where
    E: ShareEncryption,
    T: ThresholdScheme,
    M: ServerMediator + ?Sized,
{
    let cmd = DecryptSecretCommand {
        encoded: encoded.to_string(),
        shared_key_id: project.shared_key_id().clone(),
        requester: ctx.requester.cloned(),
        timeout: ctx.timeout,
    };
    envelope
        .decrypt_secret(cmd, ctx.mediator)
        .await
        .map_err(|source| with_name(name, source))
}

fn detect_format(encoded: &str) -> WireFormat {
    if encoded.trim_start().starts_with("-----BEGIN") {
        WireFormat::Pem
    } else {
        WireFormat::Simple
    }
}

fn with_name(name: &str, source: EnvelopeError) -> ProjectServiceError {
    ProjectServiceError::Envelope {
        name: name.to_string(),
        source,
    }
}
