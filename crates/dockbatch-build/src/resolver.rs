use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};

/// `-files` で渡された Dockerfile を解決する
pub struct BuildResolver {
    base_dir: PathBuf,
}

impl BuildResolver {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// カレントディレクトリを基準にする
    pub fn from_current_dir() -> BuildResult<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// カンマ区切りのパス一覧を絶対パスに変換
    ///
    /// 空の要素 (末尾のカンマなど) は無視する。
    /// 存在しないファイルがあればビルド開始前にエラーにする。
    pub fn resolve_dockerfiles(&self, files: &str) -> BuildResult<Vec<PathBuf>> {
        let paths: Vec<PathBuf> = files
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| self.absolute(Path::new(f)))
            .collect();

        if paths.is_empty() {
            return Err(BuildError::InvalidArgument(
                "no Dockerfiles given".to_string(),
            ));
        }

        for path in &paths {
            if !path.is_file() {
                return Err(BuildError::DockerfileNotFound(path.clone()));
            }
            tracing::debug!("Resolved Dockerfile: {}", path.display());
        }

        Ok(paths)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
