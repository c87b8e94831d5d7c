use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shardvault_account::KeyId;

/// ある秘密値を復号できる受信者集合を提供するポート。
pub trait RecipientDirectory {
    /// サーバだけが秘密鍵を持つ共有鍵の KeyId。
    fn shared_key_id(&self) -> &KeyId;

    /// メンバー鍵 → サービス鍵の順に並んだ受信者 KeyId（重複なし）。
    fn recipient_key_ids(&self) -> Vec<KeyId>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectError {
    #[error("invalid variable name: {0}")]
    InvalidName(String),
}

/// プロジェクトファイルの中身。
///
/// - 共有鍵 / メンバー鍵 / サービス鍵の KeyId と、変数名 → エンコード済み `Secret` の対応を持つ。
/// - 値は暗号化済みの文字列のみで、平文は一切保持しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    shared_key_id: KeyId,
    #[serde(default)]
    member_key_ids: Vec<KeyId>,
    #[serde(default)]
    service_key_ids: Vec<KeyId>,
    #[serde(default)]
    secrets: BTreeMap<String, String>,
}

impl Project {
    pub fn new(shared_key_id: KeyId, member_key_ids: Vec<KeyId>, service_key_ids: Vec<KeyId>) -> Self {
        Self {
            shared_key_id,
            member_key_ids,
            service_key_ids,
            secrets: BTreeMap::new(),
        }
    }

    pub fn member_key_ids(&self) -> &[KeyId] {
        &self.member_key_ids
    }

    pub fn service_key_ids(&self) -> &[KeyId] {
        &self.service_key_ids
    }

    pub fn secret(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }

    pub fn secrets(&self) -> &BTreeMap<String, String> {
        &self.secrets
    }

    pub fn secret_names(&self) -> Vec<String> {
        self.secrets.keys().cloned().collect()
    }

    /// エンコード済みの秘密値を保存する。既存の値は丸ごと置き換える。
    pub fn put_secret(&mut self, name: &str, encoded: String) -> Result<(), ProjectError> {
        validate_name(name)?;
        self.secrets.insert(name.to_string(), encoded);
        Ok(())
    }

    pub fn remove_secret(&mut self, name: &str) -> Option<String> {
        self.secrets.remove(name)
    }

    /// 受信者集合を差し替える。既存の秘密値は古い受信者向けのままなので、呼び出し側で再暗号化すること。
    pub fn replace_recipients(&mut self, member_key_ids: Vec<KeyId>, service_key_ids: Vec<KeyId>) {
        self.member_key_ids = member_key_ids;
        self.service_key_ids = service_key_ids;
    }
}

impl RecipientDirectory for Project {
    fn shared_key_id(&self) -> &KeyId {
        &self.shared_key_id
    }

    fn recipient_key_ids(&self) -> Vec<KeyId> {
        let mut ids: Vec<KeyId> = Vec::new();
        for id in self.member_key_ids.iter().chain(&self.service_key_ids) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// 環境変数名として使える名前か（`[A-Za-z_][A-Za-z0-9_]*`）。
fn validate_name(name: &str) -> Result<(), ProjectError> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_head || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ProjectError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<KeyId> {
        values.iter().map(|v| KeyId::new(*v)).collect()
    }

    #[test]
    fn recipients_are_members_then_services_without_duplicates() {
        let project = Project::new(
            KeyId::new("shared"),
            ids(&["alice", "bob", "alice"]),
            ids(&["ci", "bob"]),
        );

        assert_eq!(project.recipient_key_ids(), ids(&["alice", "bob", "ci"]));
        assert_eq!(project.shared_key_id().as_str(), "shared");
    }

    #[test]
    fn put_secret_validates_name() {
        let mut project = Project::new(KeyId::new("shared"), vec![], vec![]);

        project.put_secret("DATABASE_URL", "x(y)".into()).unwrap();
        project.put_secret("_PRIVATE", "x(y)".into()).unwrap();
        assert_eq!(project.secret("DATABASE_URL"), Some("x(y)"));

        for bad in ["", "1ABC", "WITH-DASH", "WITH SPACE"] {
            assert!(project.put_secret(bad, "x(y)".into()).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn json_shape() {
        let mut project = Project::new(KeyId::new("s"), ids(&["m"]), vec![]);
        project.put_secret("TOKEN", "s(AA)-m(BB)".into()).unwrap();

        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "shared_key_id": "s",
                "member_key_ids": ["m"],
                "service_key_ids": [],
                "secrets": {"TOKEN": "s(AA)-m(BB)"}
            })
        );

        let minimal: Project = serde_json::from_str(r#"{"shared_key_id":"s"}"#).unwrap();
        assert!(minimal.secrets().is_empty());
    }
}
