//! Docker API の進捗メッセージ (改行区切り JSON) の処理
//!
//! ビルド出力からは中間イメージ ID を拾い出す。
//! `" ---> "` に続く 12 文字だけを ID とみなし、
//! `" ---> Running in a430b8c0596e"` のようなコンテナ ID の行は無視する。

use crate::error::{BuildError, BuildResult};
use serde::Deserialize;
use std::io::{BufRead, Write};

/// 中間イメージを示す行の接頭辞
pub const IMAGE_MARKER: &str = " ---> ";

/// 短縮イメージ ID の長さ
pub const SHORT_ID_LEN: usize = 12;

/// 進捗メッセージ 1 件
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    pub stream: Option<String>,
    pub status: Option<String>,
    pub progress: Option<String>,
    pub id: Option<String>,
    pub error: Option<String>,
    pub error_detail: Option<ErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    pub message: Option<String>,
}

impl ProgressMessage {
    /// JSON 1 行をデコード
    pub fn from_json_line(line: &str) -> BuildResult<Self> {
        serde_json::from_str(line).map_err(BuildError::Decode)
    }

    /// `stream` のみを持つメッセージ
    pub fn stream(text: impl Into<String>) -> Self {
        Self {
            stream: Some(text.into()),
            ..Default::default()
        }
    }

    /// エンジンが報告したエラー
    pub fn error_message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        self.error_detail.as_ref().map(|detail| {
            detail
                .message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string())
        })
    }
}

impl From<bollard::models::BuildInfo> for ProgressMessage {
    fn from(info: bollard::models::BuildInfo) -> Self {
        Self {
            stream: info.stream,
            status: info.status,
            progress: info.progress,
            id: info.id,
            error: info.error,
            error_detail: info.error_detail.map(|detail| ErrorDetail {
                message: detail.message,
            }),
        }
    }
}

impl From<bollard::models::PushImageInfo> for ProgressMessage {
    fn from(info: bollard::models::PushImageInfo) -> Self {
        Self {
            status: info.status,
            progress: info.progress,
            error: info.error,
            ..Default::default()
        }
    }
}

/// ビルド出力の 1 行から中間イメージ ID を取り出す
pub fn image_id_from_line(text: &str) -> Option<&str> {
    let id = text.strip_prefix(IMAGE_MARKER)?.trim();
    (id.len() == SHORT_ID_LEN).then_some(id)
}

/// 進捗メッセージを出力先に書き出しつつ中間イメージ ID を集める
pub struct ProgressLog<W> {
    out: W,
    ids: Vec<String>,
    last_status: String,
}

impl<W: Write> ProgressLog<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            ids: Vec::new(),
            last_status: String::new(),
        }
    }

    /// メッセージ 1 件を処理
    pub fn record(&mut self, message: &ProgressMessage) -> BuildResult<()> {
        if let Some(text) = &message.stream {
            if let Some(id) = image_id_from_line(text) {
                self.ids.push(id.to_string());
            }
            write!(self.out, "{}", text)?;
        }

        if let Some(status) = &message.status {
            self.record_status(status, message.id.as_deref(), message.progress.is_some())?;
        }

        Ok(())
    }

    fn record_status(
        &mut self,
        status: &str,
        layer: Option<&str>,
        has_progress: bool,
    ) -> BuildResult<()> {
        // プログレスバー付きの更新と準備中の行はノイズになるので出さない
        if has_progress || matches!(status, "Preparing" | "Waiting") {
            return Ok(());
        }

        let line = match layer {
            Some(layer) => format!("{}: {}", layer, status),
            None => status.to_string(),
        };
        if line != self.last_status {
            writeln!(self.out, "{}", line)?;
            self.last_status = line;
        }
        Ok(())
    }

    /// これまでに見つかった ID (古い順)
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn into_ids(self) -> Vec<String> {
        self.ids
    }
}

/// 改行区切り JSON のストリームを最後まで読み、中間イメージ ID を返す
///
/// Docker API の生のレスポンスボディや保存したビルドログを読むための入口。
/// デーモンとのやり取りは Bollard がデコードするので [`ProgressLog`] を直接使う。
///
/// ストリーム終端は正常終了。空行 (チャンク間の改行) は読み飛ばし、
/// デコードできない行があればそこで失敗する。
pub fn read_ndjson<R: BufRead, W: Write>(reader: R, out: W) -> BuildResult<Vec<String>> {
    let mut log = ProgressLog::new(out);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message = ProgressMessage::from_json_line(&line)?;
        log.record(&message)?;
    }

    Ok(log.into_ids())
}
