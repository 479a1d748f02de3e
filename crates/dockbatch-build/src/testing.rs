//! ユニットテスト用のインメモリ Engine

use crate::auth::decode_registry_auth;
use crate::engine::{Engine, ImageDetails, ProgressStream};
use crate::error::{BuildError, BuildResult};
use crate::progress::ProgressMessage;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeEngine {
    /// build が返す JSON 行
    pub build_lines: Vec<String>,
    /// push が返す JSON 行
    pub push_lines: Vec<String>,
    /// 削除に失敗させるイメージ
    pub fail_remove: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn with_build_output(ids: &[&str]) -> Self {
        let mut build_lines = vec![r#"{"stream":"Step 1/1 : FROM alpine\n"}"#.to_string()];
        for id in ids {
            build_lines.push(format!(r#"{{"stream":" ---> {}\n"}}"#, id));
        }
        Self {
            build_lines,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn replay(lines: &[String]) -> ProgressStream<'static> {
        let messages: Vec<BuildResult<ProgressMessage>> = lines
            .iter()
            .map(|line| ProgressMessage::from_json_line(line))
            .collect();
        stream::iter(messages).boxed()
    }
}

#[async_trait]
impl Engine for FakeEngine {
    fn build<'a>(
        &'a self,
        context: Vec<u8>,
        dockerfile: &'a str,
        tag: &'a str,
    ) -> ProgressStream<'a> {
        assert!(!context.is_empty());
        self.record(format!("build {} {}", dockerfile, tag));
        Self::replay(&self.build_lines)
    }

    async fn tag(&self, image: &str, repo: &str, tag: &str) -> BuildResult<()> {
        self.record(format!("tag {} {}:{}", image, repo, tag));
        Ok(())
    }

    fn push<'a>(
        &'a self,
        image: &'a str,
        tag: &'a str,
        registry_auth: &'a str,
    ) -> ProgressStream<'a> {
        // 実際に送られるヘッダと同じ経路で serveraddress を取り出す
        let server = match decode_registry_auth(registry_auth) {
            Ok(creds) => creds.serveraddress.unwrap_or_default(),
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        self.record(format!("push {}:{} {}", image, tag, server));
        Self::replay(&self.push_lines)
    }

    async fn inspect(&self, image: &str) -> BuildResult<ImageDetails> {
        self.record(format!("inspect {}", image));
        Ok(ImageDetails {
            id: format!("sha256:{}", image),
            architecture: "amd64".to_string(),
            os: "linux".to_string(),
            os_version: String::new(),
            size: 7_340_032,
        })
    }

    async fn remove(&self, image: &str) -> BuildResult<()> {
        self.record(format!("remove {}", image));
        if self.fail_remove.contains(image) {
            return Err(BuildError::BuildFailed(format!("conflict: {} is in use", image)));
        }
        Ok(())
    }
}
