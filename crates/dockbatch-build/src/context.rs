use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tar::Builder;
use tempfile::NamedTempFile;

/// 一時ファイルに書き出したビルドコンテキスト (tar.gz)
///
/// drop 時に一時ファイルは削除される。
#[derive(Debug)]
pub struct ContextArchive {
    file: NamedTempFile,
}

impl ContextArchive {
    /// Dockerfile があるディレクトリを再帰的にアーカイブ
    pub fn create(dockerfile_path: &Path) -> BuildResult<Self> {
        Self::create_in(dockerfile_path, &std::env::temp_dir())
    }

    /// `temp_dir` に一時ファイルを作ってアーカイブ
    ///
    /// `temp_dir` はコンテキストの外にあること。
    pub fn create_in(dockerfile_path: &Path, temp_dir: &Path) -> BuildResult<Self> {
        let context_path = dockerfile_path
            .parent()
            .ok_or_else(|| BuildError::DockerfileNotFound(dockerfile_path.to_path_buf()))?;

        tracing::debug!("Creating build context from: {}", context_path.display());

        let file = tempfile::Builder::new()
            .prefix("docker_context")
            .suffix(".tar.gz")
            .tempfile_in(temp_dir)?;

        {
            let encoder = GzEncoder::new(file.as_file(), Compression::default());
            let mut tar = Builder::new(encoder);

            // コンテキストディレクトリ直下をアーカイブのルートにする
            tar.append_dir_all(".", context_path)?;

            tar.into_inner()?.finish()?;
        }

        let size = file.as_file().metadata()?.len();
        tracing::debug!(
            "Build context created: {} ({} bytes)",
            file.path().display(),
            size
        );

        Self::check_context_size(size);

        Ok(Self { file })
    }

    /// 一時ファイルのパス
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// アーカイブ全体を読み込む
    pub fn read_to_bytes(&mut self) -> BuildResult<Vec<u8>> {
        let handle = self.file.as_file_mut();
        handle.seek(SeekFrom::Start(0))?;

        let mut data = Vec::new();
        handle.read_to_end(&mut data)?;
        Ok(data)
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: u64) {
        const MAX_CONTEXT_SIZE: u64 = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "Build context is large ({}MB); consider a .dockerignore file",
                size / 1024 / 1024
            );
        }
    }
}
