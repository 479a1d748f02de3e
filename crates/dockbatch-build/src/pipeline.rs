//! Dockerfile ごとの処理 (タグ → ビルド → プッシュ → inspect → 削除) を順番に実行

use crate::auth::{AuthConfig, extract_registry};
use crate::builder::ImageBuilder;
use crate::cleanup::remove_intermediates;
use crate::engine::Engine;
use crate::error::BuildResult;
use crate::pusher::ImagePusher;
use crate::stats::{Stat, Summary};
use crate::tags::tags_for;
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// パイプライン全体の設定
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub auth: AuthConfig,
    /// ビルド後に中間イメージを削除する
    pub cleanup: bool,
}

pub struct Pipeline<'e, E: ?Sized, W> {
    engine: &'e E,
    config: &'e PipelineConfig,
    out: W,
}

impl<'e, E: Engine + ?Sized, W: Write> Pipeline<'e, E, W> {
    pub fn new(engine: &'e E, config: &'e PipelineConfig, out: W) -> Self {
        Self {
            engine,
            config,
            out,
        }
    }

    /// 全 Dockerfile を入力順に処理
    ///
    /// 最初のエラーで中断する (中間イメージの削除失敗は除く)。
    pub async fn run(&mut self, files: &[PathBuf]) -> BuildResult<Summary> {
        writeln!(self.out, "\n{}", "#################### Processing:".bold())?;
        for file in files {
            writeln!(self.out, "\t{}", file.display())?;
        }

        let mut summary = Summary::new();
        for file in files {
            let stat = self.process(file).await?;
            summary.push(stat);
        }

        Ok(summary)
    }

    /// 成功時のまとめを出力
    pub fn report(&mut self, summary: &Summary, elapsed: Duration) -> BuildResult<()> {
        writeln!(self.out, "\n{}", "#################### Success:".green().bold())?;
        summary.write_to(&mut self.out, elapsed)?;
        Ok(())
    }

    async fn process(&mut self, file: &Path) -> BuildResult<Stat> {
        let mut stat = Stat::new(file.to_path_buf());

        // --- タグ
        writeln!(self.out, "\n########## Tags: {}", file.display())?;
        let tags = tags_for(file)
            .map_err(|e| e.step(format!("Failed to retrieve tags {}", file.display())))?;
        for tag in &tags {
            writeln!(self.out, "\tTag: {}", tag)?;
            self.check_registry(tag);
        }
        stat.tags = tags.clone();

        // --- ビルド
        writeln!(self.out, "\n########## Building: {}", file.display())?;
        let started = Instant::now();
        let built = ImageBuilder::new(self.engine)
            .build_image(file, &tags, &mut self.out)
            .await
            .map_err(|e| e.step(format!("Failed to build {}", file.display())))?;
        stat.build = started.elapsed();
        stat.id = built.id.clone();

        // --- プッシュ
        writeln!(self.out, "\n########## Pushing: {}", file.display())?;
        let started = Instant::now();
        let pusher = ImagePusher::new(self.engine, &self.config.auth);
        for tag in &tags {
            writeln!(self.out, "\tTag: {}", tag)?;
            pusher
                .push(tag, &mut self.out)
                .await
                .map_err(|e| e.step(format!("Failed to push tag {}", tag)))?;
        }
        stat.push = started.elapsed();

        // --- サイズ等の取得 (失敗しても続行)
        match self.engine.inspect(&built.id).await {
            Ok(details) => stat.apply_details(&details),
            Err(e) => tracing::warn!("Failed to inspect image {}: {}", built.id, e),
        }

        // --- 中間イメージの削除
        if self.config.cleanup {
            writeln!(self.out, "\n########## Removing:")?;
            let report =
                remove_intermediates(self.engine, &built.intermediates, &mut self.out).await?;
            tracing::info!(
                "Removed {} image(s), {} failure(s)",
                report.removed.len(),
                report.failed.len()
            );
        }

        Ok(stat)
    }

    /// タグのレジストリが `-registry` と異なる場合は警告
    fn check_registry(&self, tag: &str) {
        let configured = self.config.auth.server_address.as_str();
        let configured = configured
            .strip_prefix("https://")
            .or_else(|| configured.strip_prefix("http://"))
            .unwrap_or(configured)
            .trim_end_matches('/');

        if let Some(registry) = extract_registry(tag)
            && registry != configured
        {
            tracing::warn!(
                "Tag {} targets registry {}, but credentials are for {}",
                tag,
                registry,
                configured
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::testing::FakeEngine;
    use std::fs;
    use tempfile::tempdir;

    fn config(cleanup: bool) -> PipelineConfig {
        PipelineConfig {
            auth: AuthConfig::new("", "", "", "", "registry.example.com"),
            cleanup,
        }
    }

    fn write_dockerfile(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("Dockerfile");
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_process_single_file() {
        let dir = tempdir().unwrap();
        let file = write_dockerfile(
            dir.path(),
            "# registry.example.com/app:1.0\n# registry.example.com/app:latest\n\nFROM alpine\n",
        );
        let engine =
            FakeEngine::with_build_output(&["0123456789ab", "aaaaaaaaaaaa", "a1b2c3d4e5f6"]);
        let config = config(true);

        let mut out = Vec::new();
        let summary = Pipeline::new(&engine, &config, &mut out)
            .run(std::slice::from_ref(&file))
            .await
            .unwrap();

        assert_eq!(summary.len(), 1);
        let stat = &summary.stats()[0];
        assert_eq!(stat.id, "a1b2c3d4e5f6");
        assert_eq!(stat.tags.len(), 2);
        assert_eq!(stat.architecture, "amd64");
        assert_eq!(stat.size, Some(7_340_032));

        assert_eq!(
            engine.calls(),
            vec![
                "build Dockerfile registry.example.com/app:1.0",
                "tag a1b2c3d4e5f6 registry.example.com/app:latest",
                "push registry.example.com/app:1.0 registry.example.com",
                "push registry.example.com/app:latest registry.example.com",
                "inspect a1b2c3d4e5f6",
                "remove a1b2c3d4e5f6",
                "remove aaaaaaaaaaaa",
            ]
        );

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("########## Tags: "));
        assert!(text.contains("########## Removing:"));
    }

    #[tokio::test]
    async fn test_cleanup_disabled() {
        let dir = tempdir().unwrap();
        let file = write_dockerfile(dir.path(), "# registry.example.com/app:1.0\nFROM alpine\n");
        let engine = FakeEngine::with_build_output(&["0123456789ab", "a1b2c3d4e5f6"]);
        let config = config(false);

        let mut out = Vec::new();
        Pipeline::new(&engine, &config, &mut out)
            .run(&[file])
            .await
            .unwrap();

        assert!(!engine.calls().iter().any(|c| c.starts_with("remove")));
        assert!(!String::from_utf8(out).unwrap().contains("Removing"));
    }

    #[tokio::test]
    async fn test_missing_tags_stops_before_build() {
        let dir = tempdir().unwrap();
        let file = write_dockerfile(dir.path(), "FROM alpine\n");
        let engine = FakeEngine::with_build_output(&["a1b2c3d4e5f6"]);
        let config = config(true);

        let err = Pipeline::new(&engine, &config, std::io::sink())
            .run(&[file])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::Step { ref source, .. } if matches!(**source, BuildError::NoTagsFound(_))
        ));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_report() {
        let engine = FakeEngine::default();
        let config = config(true);
        let mut summary = Summary::new();
        summary.push(Stat::new(PathBuf::from("/a/Dockerfile")));

        let mut out = Vec::new();
        Pipeline::new(&engine, &config, &mut out)
            .report(&summary, Duration::from_secs(1))
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("#################### Success:"));
        assert!(text.contains("Dockerfile: /a/Dockerfile"));
        assert!(text.ends_with("Finished in: 1.00s\n"));
    }
}
