//! イメージプッシュ処理
//!
//! ビルドしたイメージをコンテナレジストリにプッシュします。

use crate::auth::AuthConfig;
use crate::engine::Engine;
use crate::error::{BuildError, BuildResult};
use crate::progress::ProgressLog;
use futures_util::StreamExt;
use std::io::Write;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher<'e, E: ?Sized> {
    engine: &'e E,
    auth: &'e AuthConfig,
}

impl<'e, E: Engine + ?Sized> ImagePusher<'e, E> {
    pub fn new(engine: &'e E, auth: &'e AuthConfig) -> Self {
        Self { engine, auth }
    }

    /// タグ (`registry/name:tag`) をレジストリにプッシュ
    ///
    /// プッシュ出力は `out` に書き出す。
    pub async fn push<W: Write>(&self, reference: &str, out: W) -> BuildResult<()> {
        let (image, tag) = split_image_tag(reference);
        self.validate_tag(&tag)?;

        // 認証情報がエンコードできなければプッシュしない
        let registry_auth = self.auth.encode()?;
        tracing::debug!("Pushing {}:{}", image, tag);

        let mut stream = self.engine.push(&image, &tag, &registry_auth);
        let mut log = ProgressLog::new(out);

        while let Some(result) = stream.next().await {
            let message = result.map_err(|e| match e {
                BuildError::DockerConnection(e) => BuildError::PushFailed {
                    message: e.to_string(),
                },
                other => other,
            })?;
            if let Some(error) = message.error_message() {
                return Err(BuildError::PushFailed { message: error });
            }
            log.record(&message)?;
        }

        tracing::info!("Pushed: {}:{}", image, tag);
        Ok(())
    }

    /// タグのバリデーション
    fn validate_tag(&self, tag: &str) -> BuildResult<()> {
        // Docker タグの制約:
        // - 128文字以下
        // - 英数字、ピリオド、ハイフン、アンダースコアのみ
        // - 先頭はピリオドまたはハイフンではない

        if tag.is_empty() {
            return Err(BuildError::InvalidTag {
                tag: "(empty)".to_string(),
            });
        }

        if tag.len() > 128 {
            return Err(BuildError::InvalidTag {
                tag: format!("Tag too long ({} characters, max 128)", tag.len()),
            });
        }

        if tag.starts_with('.') || tag.starts_with('-') {
            return Err(BuildError::InvalidTag {
                tag: tag.to_string(),
            });
        }

        if let Some(c) = tag
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
        {
            return Err(BuildError::InvalidTag {
                tag: format!("Invalid character '{}' in tag: {}", c, tag),
            });
        }

        Ok(())
    }
}

/// イメージ名とタグを分離
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", "latest")`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", "dev")`
/// - `registry.example.com/app:42` -> `("registry.example.com/app", "42")`
pub fn split_image_tag(image: &str) -> (String, String) {
    if let Some((name, tag)) = image.rsplit_once(':') {
        // localhost:5000/app の ":5000/app" はタグではない
        if !tag.contains('/') {
            return (name.to_string(), tag.to_string());
        }
    }

    (image.to_string(), "latest".to_string())
}
