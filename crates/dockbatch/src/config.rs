//! コマンドライン引数と、その検証済み設定

use bollard::ClientVersion;
use clap::{ArgAction, Parser};
use dockbatch_build::AuthConfig;
use std::ffi::OsString;
use thiserror::Error;

/// ロングオプション名 (`-files` のような単一ハイフン形式も受け付ける)
const LONG_FLAGS: [&str; 8] = [
    "username", "password", "email", "auth", "version", "cleanup", "registry", "files",
];

#[derive(Parser, Debug)]
#[command(name = "dockbatch")]
#[command(
    about = "Build Docker images, tag them from Dockerfile comments and push them to a registry",
    long_about = None
)]
pub struct Cli {
    /// Docker registry username
    #[arg(long, env = "DOCKBATCH_USERNAME", default_value = "", hide_env_values = true)]
    pub username: String,

    /// Docker registry password
    #[arg(
        long,
        env = "DOCKBATCH_PASSWORD",
        default_value = "",
        hide_env_values = true,
        allow_hyphen_values = true
    )]
    pub password: String,

    /// Docker registered email
    #[arg(long, env = "DOCKBATCH_EMAIL", default_value = "", hide_env_values = true)]
    pub email: String,

    /// Docker registry auth
    #[arg(
        long,
        env = "DOCKBATCH_AUTH",
        default_value = "",
        hide_env_values = true,
        allow_hyphen_values = true
    )]
    pub auth: String,

    /// Docker API version
    #[arg(long = "version", value_name = "VERSION", default_value = "1.28")]
    pub api_version: String,

    /// Removes all created images
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub cleanup: bool,

    /// Docker registry server (required)
    #[arg(long, default_value = "")]
    pub registry: String,

    /// List of Dockerfiles to build, separated by comma (required)
    #[arg(long, default_value = "")]
    pub files: String,
}

/// 引数の検証エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("-files and -registry are required")]
    MissingRequired,

    #[error("Username, password, and email are required together")]
    PartialCredentials,

    #[error("Invalid API version '{0}', expected MAJOR.MINOR")]
    InvalidVersion(String),
}

impl ArgumentError {
    /// 使い方の後にメッセージも表示するか
    pub fn has_message(&self) -> bool {
        !matches!(self, ArgumentError::MissingRequired)
    }
}

/// 検証済みの設定
#[derive(Debug)]
pub struct Settings {
    pub files: String,
    pub auth: AuthConfig,
    pub api_version: ClientVersion,
    pub cleanup: bool,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self, ArgumentError> {
        if cli.files.trim().is_empty() || cli.registry.trim().is_empty() {
            return Err(ArgumentError::MissingRequired);
        }

        // 認証情報を 1 つでも指定したら 3 つとも必要
        let any = [&cli.username, &cli.password, &cli.email]
            .iter()
            .any(|v| !v.trim().is_empty());
        let all = [&cli.username, &cli.password, &cli.email]
            .iter()
            .all(|v| !v.is_empty());
        if any && !all {
            return Err(ArgumentError::PartialCredentials);
        }

        let api_version = parse_api_version(&cli.api_version)?;

        Ok(Self {
            files: cli.files,
            auth: AuthConfig::new(cli.username, cli.password, cli.email, cli.auth, cli.registry),
            api_version,
            cleanup: cli.cleanup,
        })
    }
}

/// "1.28" 形式の API バージョンを解釈
pub fn parse_api_version(version: &str) -> Result<ClientVersion, ArgumentError> {
    let invalid = || ArgumentError::InvalidVersion(version.to_string());

    let (major, minor) = version.trim().split_once('.').ok_or_else(invalid)?;
    Ok(ClientVersion {
        major_version: major.parse().map_err(|_| invalid())?,
        minor_version: minor.parse().map_err(|_| invalid())?,
    })
}

/// `-files a,b` を `--files a,b` に書き換える
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(flag) = text.strip_prefix('-') else {
                return arg;
            };
            let name = flag.split_once('=').map_or(flag, |(name, _)| name);
            if LONG_FLAGS.contains(&name) {
                OsString::from(format!("--{}", flag))
            } else {
                arg
            }
        })
        .collect()
}
