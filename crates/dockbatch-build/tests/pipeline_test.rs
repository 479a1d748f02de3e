//! Engine をインメモリで差し替えた、複数 Dockerfile の一括処理テスト

use async_trait::async_trait;
use dockbatch_build::{
    AuthConfig, BuildError, BuildResult, Engine, ImageDetails, Pipeline, PipelineConfig,
    ProgressMessage, ProgressStream,
};
use futures_util::stream::{self, StreamExt};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Dockerfile ごとに異なる ID を返すエンジン
#[derive(Default)]
struct ScriptedEngine {
    builds: Mutex<usize>,
    calls: Mutex<Vec<String>>,
    fail_push: bool,
}

impl ScriptedEngine {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn build<'a>(
        &'a self,
        _context: Vec<u8>,
        dockerfile: &'a str,
        tag: &'a str,
    ) -> ProgressStream<'a> {
        let n = {
            let mut builds = self.builds.lock().unwrap();
            *builds += 1;
            *builds
        };
        self.record(format!("build {} {}", dockerfile, tag));

        let final_id = format!("{:0>12}", n);
        let messages: Vec<BuildResult<ProgressMessage>> = vec![
            Ok(ProgressMessage::stream("Step 1/2 : FROM alpine:3.20\n")),
            Ok(ProgressMessage::stream(" ---> 0123456789ab\n")),
            Ok(ProgressMessage::stream("Step 2/2 : RUN true\n")),
            Ok(ProgressMessage::stream(" ---> Running in a430b8c0596e\n")),
            Ok(ProgressMessage::stream(format!(" ---> {}\n", final_id))),
            Ok(ProgressMessage::stream(format!("Successfully built {}\n", final_id))),
        ];
        stream::iter(messages).boxed()
    }

    async fn tag(&self, image: &str, repo: &str, tag: &str) -> BuildResult<()> {
        self.record(format!("tag {} {}:{}", image, repo, tag));
        Ok(())
    }

    fn push<'a>(
        &'a self,
        image: &'a str,
        tag: &'a str,
        _registry_auth: &'a str,
    ) -> ProgressStream<'a> {
        self.record(format!("push {}:{}", image, tag));
        let message = if self.fail_push {
            ProgressMessage::from_json_line(r#"{"error":"unauthorized"}"#)
        } else {
            ProgressMessage::from_json_line(r#"{"status":"Pushed","id":"5f70bf18a086"}"#)
        };
        stream::iter(vec![message]).boxed()
    }

    async fn inspect(&self, image: &str) -> BuildResult<ImageDetails> {
        self.record(format!("inspect {}", image));
        Ok(ImageDetails {
            id: format!("sha256:{}", image),
            architecture: "amd64".to_string(),
            os: "linux".to_string(),
            os_version: String::new(),
            size: 5_000_000,
        })
    }

    async fn remove(&self, image: &str) -> BuildResult<()> {
        self.record(format!("remove {}", image));
        Ok(())
    }
}

fn project() -> (tempfile::TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().unwrap();
    let mut files = Vec::new();
    for name in ["a", "b"] {
        let service = dir.path().join(name);
        fs::create_dir(&service).unwrap();
        fs::write(
            service.join("Dockerfile"),
            format!("\n# registry.example.com/{}:1.0\n\nFROM alpine:3.20\nRUN true\n", name),
        )
        .unwrap();
        fs::write(service.join("app.txt"), name).unwrap();
        files.push(service.join("Dockerfile"));
    }
    (dir, files)
}

fn config() -> PipelineConfig {
    PipelineConfig {
        auth: AuthConfig::new(
            "ci",
            "secret",
            "ci@example.com",
            "",
            "registry.example.com",
        ),
        cleanup: true,
    }
}

#[tokio::test]
async fn test_two_dockerfiles_in_input_order() {
    let (_dir, files) = project();
    let engine = ScriptedEngine::default();
    let config = config();

    let mut out = Vec::new();
    let mut pipeline = Pipeline::new(&engine, &config, &mut out);
    let summary = pipeline.run(&files).await.unwrap();
    pipeline.report(&summary, Duration::from_secs(2)).unwrap();

    assert_eq!(summary.len(), 2);
    for (stat, file) in summary.stats().iter().zip(&files) {
        assert_eq!(&stat.dockerfile, file);
        assert!(!stat.id.is_empty());
        assert_eq!(stat.tags.len(), 1);
    }
    assert_eq!(summary.stats()[0].id, "000000000001");
    assert_eq!(summary.stats()[1].id, "000000000002");
    assert_eq!(summary.stats()[1].tags, vec!["registry.example.com/b:1.0"]);

    assert_eq!(
        engine.calls(),
        vec![
            "build Dockerfile registry.example.com/a:1.0",
            "push registry.example.com/a:1.0",
            "inspect 000000000001",
            "remove 000000000001",
            "build Dockerfile registry.example.com/b:1.0",
            "push registry.example.com/b:1.0",
            "inspect 000000000002",
            "remove 000000000002",
        ]
    );

    let text = String::from_utf8(out).unwrap();
    let first = text.find(&format!("Dockerfile: {}", files[0].display())).unwrap();
    let second = text.find(&format!("Dockerfile: {}", files[1].display())).unwrap();
    assert!(first < second);
    assert!(text.contains("Success:"));
    assert!(text.contains("5f70bf18a086: Pushed"));
    assert!(text.ends_with("Finished in: 2.00s\n"));
}

#[tokio::test]
async fn test_push_failure_stops_the_run() {
    let (_dir, files) = project();
    let engine = ScriptedEngine {
        fail_push: true,
        ..Default::default()
    };
    let config = config();

    let err = Pipeline::new(&engine, &config, std::io::sink())
        .run(&files)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to push tag registry.example.com/a:1.0");
    assert!(matches!(
        std::error::Error::source(&err)
            .and_then(|e| e.downcast_ref::<BuildError>()),
        Some(BuildError::PushFailed { message }) if message == "unauthorized"
    ));

    // 2 つ目の Dockerfile には進まない
    let calls = engine.calls();
    assert_eq!(
        calls,
        vec![
            "build Dockerfile registry.example.com/a:1.0",
            "push registry.example.com/a:1.0",
        ]
    );
}
