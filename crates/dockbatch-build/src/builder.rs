use crate::context::ContextArchive;
use crate::engine::Engine;
use crate::error::{BuildError, BuildResult};
use crate::progress::ProgressLog;
use crate::pusher::split_image_tag;
use futures_util::stream::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// ビルド結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    /// 最終イメージの ID (`intermediates` の末尾)
    pub id: String,
    /// ビルド中に作られたイメージ ID (古い順)
    pub intermediates: Vec<String>,
}

pub struct ImageBuilder<'e, E: ?Sized> {
    engine: &'e E,
    temp_dir: PathBuf,
}

impl<'e, E: Engine + ?Sized> ImageBuilder<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self {
            engine,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// コンテキストアーカイブを置くディレクトリを指定
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// イメージをビルドし、全タグを付ける
    ///
    /// ビルド出力は `out` にそのまま書き出す。
    pub async fn build_image<W: Write>(
        &self,
        dockerfile: &Path,
        tags: &[String],
        out: W,
    ) -> BuildResult<BuiltImage> {
        let (first_tag, other_tags) = tags
            .split_first()
            .ok_or_else(|| BuildError::NoTagsFound(dockerfile.to_path_buf()))?;
        let dockerfile_name = dockerfile
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| BuildError::DockerfileNotFound(dockerfile.to_path_buf()))?;

        tracing::info!("Building image: {}", first_tag);

        let mut archive = ContextArchive::create_in(dockerfile, &self.temp_dir)?;
        let context = archive.read_to_bytes()?;
        tracing::debug!(
            "Submitting build context {} ({} bytes)",
            archive.path().display(),
            context.len()
        );

        let mut stream = self.engine.build(context, dockerfile_name, first_tag);
        // コンテキストは読み込み済みなので一時ファイルはここで削除
        drop(archive);

        let mut log = ProgressLog::new(out);
        while let Some(message) = stream.next().await {
            let message = message?;
            if let Some(error) = message.error_message() {
                return Err(BuildError::BuildFailed(error));
            }
            log.record(&message)?;
        }

        let intermediates = log.into_ids();
        let id = intermediates.last().cloned().ok_or_else(|| {
            BuildError::BuildFailed(format!(
                "no image id found in build output for {}",
                dockerfile.display()
            ))
        })?;

        // build API が受け付けるタグは 1 つなので残りは後から付ける
        for tag in other_tags {
            let (repo, tag_name) = split_image_tag(tag);
            tracing::debug!("Tagging {} as {}:{}", id, repo, tag_name);
            self.engine.tag(&id, &repo, &tag_name).await?;
        }

        tracing::info!("Successfully built: {} ({})", first_tag, id);
        Ok(BuiltImage { id, intermediates })
    }
}
