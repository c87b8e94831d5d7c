//! `shardvault.toml` の読み書き。

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardvault_account::infrastructure::public_key_resolver::HttpPublicKeyResolver;
use shardvault_account::{KeyId, PublicKeyResolverError};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShardVaultConfig {
    /// メディエータサーバ側の設定
    #[serde(default)]
    pub server: ServerConfig,

    /// サーバに接続するクライアント側の設定
    #[serde(default)]
    pub client: ClientConfig,
}

impl ShardVaultConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// 共有鍵と登録された公開鍵を置くディレクトリ
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,

    /// 使う共有鍵。未指定ならディレクトリ内の既存の鍵、無ければ新規生成。
    #[serde(default)]
    pub shared_key_id: Option<KeyId>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            key_dir: default_key_dir(),
            shared_key_id: None,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8600))
}

fn default_key_dir() -> PathBuf {
    PathBuf::from("keys")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// `server_url` の `/keys/{key_id}` から公開鍵を引くリゾルバ。
    pub fn public_key_resolver(&self) -> Result<HttpPublicKeyResolver, PublicKeyResolverError> {
        HttpPublicKeyResolver::new(self.server_url.clone(), self.timeout())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8600".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    200
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("serialize error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ShardVaultConfig::from_toml_str("").unwrap();
        assert_eq!(config, ShardVaultConfig::default());
        assert_eq!(config.server.listen.port(), 8600);
        assert_eq!(config.client.timeout(), Duration::from_secs(10));
        assert_eq!(config.client.max_retries, 2);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ShardVaultConfig::from_toml_str(
            r#"
            [server]
            listen = "0.0.0.0:9000"
            shared_key_id = "0123abcd"

            [client]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen.port(), 9000);
        assert_eq!(config.server.key_dir, PathBuf::from("keys"));
        assert_eq!(config.server.shared_key_id, Some(KeyId::new("0123abcd")));
        assert_eq!(config.client.max_retries, 5);
        assert_eq!(config.client.retry_backoff(), Duration::from_millis(200));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shardvault.toml");

        let mut config = ShardVaultConfig::default();
        config.client.server_url = "https://vault.example.com".into();
        config.to_file(&path).unwrap();

        assert_eq!(ShardVaultConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        assert!(matches!(
            ShardVaultConfig::from_toml_str("[server\nlisten ="),
            Err(ConfigError::Parse(_))
        ));
    }
}
