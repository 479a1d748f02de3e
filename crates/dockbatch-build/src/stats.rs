//! Dockerfile ごとのビルド統計

use crate::engine::ImageDetails;
use indicatif::HumanBytes;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

/// 1 つの Dockerfile の統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stat {
    pub id: String,
    pub tags: Vec<String>,
    pub dockerfile: PathBuf,
    pub architecture: String,
    pub os: String,
    pub os_version: String,
    /// inspect できなかった場合は `None`
    pub size: Option<u64>,
    pub build: Duration,
    pub push: Duration,
}

impl Stat {
    pub fn new(dockerfile: PathBuf) -> Self {
        Self {
            dockerfile,
            ..Default::default()
        }
    }

    /// inspect の結果を反映
    pub fn apply_details(&mut self, details: &ImageDetails) {
        self.architecture = details.architecture.clone();
        self.os = details.os.clone();
        self.os_version = details.os_version.clone();
        self.size = u64::try_from(details.size).ok();
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = match self.size {
            Some(size) => HumanBytes(size).to_string(),
            None => "unknown".to_string(),
        };

        writeln!(f, "Dockerfile: {}", self.dockerfile.display())?;
        writeln!(f, "        Id: {}", self.id)?;
        writeln!(f, "      Tags: {}", self.tags.join(", "))?;
        writeln!(
            f,
            "   Arch/OS: {}/{} {}",
            self.architecture, self.os, self.os_version
        )?;
        writeln!(f, "      Size: {}", size)?;
        writeln!(f, "Build Time: {:.2?}", self.build)?;
        writeln!(f, " Push Time: {:.2?}", self.push)
    }
}

/// 全 Dockerfile の統計 (入力順)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    stats: Vec<Stat>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stat: Stat) {
        self.stats.push(stat);
    }

    pub fn stats(&self) -> &[Stat] {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// 各統計と合計時間を書き出す
    pub fn write_to<W: Write>(&self, mut out: W, elapsed: Duration) -> io::Result<()> {
        for stat in &self.stats {
            writeln!(out, "{}", stat)?;
        }
        writeln!(out, "Finished in: {:.2?}", elapsed)
    }
}
