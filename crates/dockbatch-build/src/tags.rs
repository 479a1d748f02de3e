//! Dockerfile 先頭のコメントからタグを抽出
//!
//! ```text
//! # registry.example.com/team/app:1.4.2
//! # registry.example.com/team/app:latest
//!
//! FROM alpine:3.20
//! ```

use crate::error::{BuildError, BuildResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dockerfile に付けるタグの一覧を返す
pub fn tags_for(dockerfile: &Path) -> BuildResult<Vec<String>> {
    let file = File::open(dockerfile)?;
    let tags = read_tags(BufReader::new(file))?;

    if tags.is_empty() {
        return Err(BuildError::NoTagsFound(dockerfile.to_path_buf()));
    }

    tracing::debug!("Found {} tag(s) in {}", tags.len(), dockerfile.display());
    Ok(tags)
}

/// 連続するコメント行をタグとして読み取る
///
/// タグが見つかる前の空行・`#` のみの行は読み飛ばし、
/// タグが見つかった後の最初の区切り行で終了する。
/// コメントではない行に到達した時点でも終了する。
fn read_tags<R: BufRead>(reader: R) -> BuildResult<Vec<String>> {
    let mut tags = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line == "#" {
            if tags.is_empty() {
                continue;
            }
            break;
        }

        match line.strip_prefix('#') {
            Some(tag) => tags.push(tag.trim().to_string()),
            None => break,
        }
    }

    Ok(tags)
}
