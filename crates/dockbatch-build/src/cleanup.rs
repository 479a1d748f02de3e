//! ビルドで作られた中間イメージの削除

use crate::engine::Engine;
use crate::error::BuildResult;
use colored::Colorize;
use std::io::Write;

/// 削除結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

/// 中間イメージを新しい順に削除
///
/// `ids` は古い順 (末尾が最終イメージ)。先頭の ID は FROM で指定された
/// ベースイメージなので削除しない。削除に失敗しても残りの削除は続ける。
pub async fn remove_intermediates<E, W>(
    engine: &E,
    ids: &[String],
    mut out: W,
) -> BuildResult<CleanupReport>
where
    E: Engine + ?Sized,
    W: Write,
{
    let mut report = CleanupReport::default();

    for id in ids.iter().skip(1).rev() {
        writeln!(out, "\t{}", id)?;

        match engine.remove(id).await {
            Ok(()) => report.removed.push(id.clone()),
            Err(e) => {
                tracing::warn!("Failed to remove image {}: {}", id, e);
                writeln!(out, "{} {}", "Failed to remove image:".yellow(), id)?;
                report.failed.push(id.clone());
            }
        }
    }

    Ok(report)
}
