use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Failed to find any tags within: {0}")]
    NoTagsFound(PathBuf),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Invalid tag: {tag}")]
    InvalidTag { tag: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to encode registry auth: {0}")]
    AuthEncode(#[source] serde_json::Error),

    #[error("Registry auth failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Failed to decode progress message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Step {
        message: String,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// どの処理で失敗したかを付け加える
    pub fn step(self, message: impl Into<String>) -> Self {
        BuildError::Step {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::NoTagsFound(path) => {
                format!(
                    "No tags found in {}\n\
                     \n\
                     Start the Dockerfile with one comment line per tag:\n\
                        # registry.example.com/team/app:1.0\n\
                        # registry.example.com/team/app:latest",
                    path.display()
                )
            }
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfile not found: {}\n\
                     \n\
                     Check the paths passed with -files.",
                    path.display()
                )
            }
            BuildError::DockerConnection(e) => {
                format!(
                    "Docker connection error: {}\n\
                     \n\
                     Make sure the Docker daemon is running and /var/run/docker.sock is reachable.",
                    e
                )
            }
            BuildError::Step { message, source } => {
                format!("{}\n{}", message, source.user_message())
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
