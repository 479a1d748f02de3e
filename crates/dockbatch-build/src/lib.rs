//! dockbatch の Docker イメージビルド機能
//!
//! Dockerfile 先頭のコメントからタグを読み取り、イメージのビルド、
//! レジストリへのプッシュ、中間イメージの削除を Dockerfile ごとに順番に行う。

pub mod auth;
pub mod builder;
pub mod cleanup;
pub mod context;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod pusher;
pub mod resolver;
pub mod stats;
pub mod tags;

#[cfg(test)]
mod testing;

pub use auth::{AuthConfig, RegistryAuth, decode_registry_auth};
pub use builder::{BuiltImage, ImageBuilder};
pub use cleanup::{CleanupReport, remove_intermediates};
pub use context::ContextArchive;
pub use engine::{DockerEngine, Engine, ImageDetails, ProgressStream};
pub use error::{BuildError, BuildResult};
pub use pipeline::{Pipeline, PipelineConfig};
pub use progress::{ProgressLog, ProgressMessage, read_ndjson};
pub use pusher::{ImagePusher, split_image_tag};
pub use resolver::BuildResolver;
pub use stats::{Stat, Summary};
pub use tags::tags_for;
