//! レジストリ認証処理
//!
//! コマンドライン引数の認証情報を X-Registry-Auth 用にエンコードする。
//! 引数で認証情報が与えられない場合は Docker config.json から取得する。

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// レジストリの認証情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(rename = "serveraddress", skip_serializing_if = "String::is_empty")]
    pub server_address: String,
}

impl AuthConfig {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
        auth: impl Into<String>,
        registry: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            auth: auth.into(),
            email: email.into(),
            server_address: registry.into(),
        }
    }

    /// ユーザー名・パスワード・トークンのいずれかを持つか
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty() || !self.auth.is_empty()
    }

    /// X-Registry-Auth ヘッダ用の値 (JSON を URL-safe base64 でエンコード)
    pub fn encode(&self) -> BuildResult<String> {
        let json = serde_json::to_vec(self).map_err(BuildError::AuthEncode)?;
        Ok(base64::engine::general_purpose::URL_SAFE.encode(json))
    }

    /// 認証情報が無ければ Docker config.json の内容で補う
    pub fn or_docker_config(self, store: &RegistryAuth) -> BuildResult<Self> {
        if self.has_credentials() {
            return Ok(self);
        }

        match store.get_credentials(&self.server_address)? {
            Some((username, password)) => {
                tracing::info!("Using Docker config credentials for {}", self.server_address);
                Ok(Self {
                    username,
                    password,
                    ..self
                })
            }
            None => Ok(self),
        }
    }
}

/// Docker config.json の構造
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    /// 認証情報 (レジストリ -> AuthEntry)
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
}

/// 認証エントリ
#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// X-Registry-Auth の値を Bollard の認証情報に戻す
///
/// プッシュ時は [`AuthConfig::encode`] の結果だけがエンジンに渡る。
pub fn decode_registry_auth(token: &str) -> BuildResult<DockerCredentials> {
    let auth_failed = |message: String| BuildError::AuthFailed {
        registry: "(X-Registry-Auth)".to_string(),
        message,
    };

    let json = base64::engine::general_purpose::URL_SAFE
        .decode(token)
        .map_err(|e| auth_failed(format!("Failed to decode registry auth: {}", e)))?;
    serde_json::from_slice(&json)
        .map_err(|e| auth_failed(format!("Failed to parse registry auth: {}", e)))
}

/// Docker config.json に保存された認証情報の参照
#[derive(Debug)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG/config.json`、無ければ `~/.docker/config.json` を使用
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self { config_path }
    }

    /// 指定したパスの config.json を使用
    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// レジストリの (username, password) を取得
    ///
    /// config.json が無い場合や該当エントリが無い場合は `Ok(None)`。
    pub fn get_credentials(&self, registry: &str) -> BuildResult<Option<(String, String)>> {
        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load_docker_config()?;

        // 1. auths セクション ("https://" 付きで保存されている場合もある)
        let entry = config
            .auths
            .get(registry)
            .or_else(|| config.auths.get(&format!("https://{}", registry)));
        if let Some(auth_b64) = entry.and_then(|e| e.auth.as_deref())
            && let Some(creds) = self.decode_auth(auth_b64, registry)?
        {
            tracing::debug!("Found credentials in auths for {}", registry);
            return Ok(Some(creds));
        }

        // 2. credential helper
        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential helper: {}", helper);
            if let Ok(Some(creds)) = self.get_from_helper(helper, registry) {
                return Ok(Some(creds));
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn load_docker_config(&self) -> BuildResult<DockerConfig> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| BuildError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("Failed to read config.json: {}", e),
            })?;

        serde_json::from_str(&content).map_err(|e| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("Failed to parse config.json: {}", e),
        })
    }

    fn decode_auth(&self, auth_b64: &str, registry: &str) -> BuildResult<Option<(String, String)>> {
        let auth_failed = |message: String| BuildError::AuthFailed {
            registry: registry.to_string(),
            message,
        };

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth_b64)
            .map_err(|e| auth_failed(format!("Failed to decode auth: {}", e)))?;
        let auth_str = String::from_utf8(decoded)
            .map_err(|e| auth_failed(format!("Invalid UTF-8 in auth: {}", e)))?;

        Ok(auth_str
            .split_once(':')
            .map(|(username, password)| (username.to_string(), password.to_string())))
    }

    fn get_from_helper(&self, helper: &str, registry: &str) -> BuildResult<Option<(String, String)>> {
        let helper_cmd = format!("docker-credential-{}", helper);
        let auth_failed = |message: String| BuildError::AuthFailed {
            registry: registry.to_string(),
            message,
        };

        let mut child = Command::new(&helper_cmd)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| auth_failed(format!("Failed to run {}: {}", helper_cmd, e)))?;

        // レジストリ名を stdin に渡す
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_bytes()).ok();
        }

        let output = child
            .wait_with_output()
            .map_err(|e| auth_failed(format!("Credential helper failed: {}", e)))?;

        if !output.status.success() {
            tracing::debug!(
                "Credential helper returned error for {}: {}",
                registry,
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(None);
        }

        let response: CredentialResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| auth_failed(format!("Failed to parse credential helper response: {}", e)))?;

        Ok(Some((response.username, response.secret)))
    }
}

/// イメージ名に明示されたレジストリを抽出
///
/// # Examples
/// - `ghcr.io/org/app:tag` -> `Some("ghcr.io")`
/// - `localhost:5000/app` -> `Some("localhost:5000")`
/// - `myuser/app:tag` -> `None` (Docker Hub)
pub fn extract_registry(image: &str) -> Option<&str> {
    let (first, _) = image.split_once('/')?;
    // レジストリは . または : を含む（例: ghcr.io, localhost:5000）
    (first.contains('.') || first.contains(':') || first == "localhost").then_some(first)
}
