//! コンテナエンジンとの境界
//!
//! パイプラインが使う操作 (build / tag / push / inspect / remove) だけを公開する。

use crate::auth::decode_registry_auth;
use crate::error::{BuildError, BuildResult};
use crate::progress::ProgressMessage;
use async_trait::async_trait;
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use http_body_util::{Either, Full};

/// ビルド・プッシュの進捗ストリーム
pub type ProgressStream<'a> = BoxStream<'a, BuildResult<ProgressMessage>>;

/// `inspect` で得られるイメージ情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDetails {
    pub id: String,
    pub architecture: String,
    pub os: String,
    pub os_version: String,
    pub size: i64,
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// tar.gz のビルドコンテキストからイメージをビルド
    ///
    /// ベースイメージは常に pull し、キャッシュは使わない。
    /// 中間コンテナは成功・失敗に関わらず削除する。
    fn build<'a>(
        &'a self,
        context: Vec<u8>,
        dockerfile: &'a str,
        tag: &'a str,
    ) -> ProgressStream<'a>;

    /// イメージに `repo:tag` を付ける
    async fn tag(&self, image: &str, repo: &str, tag: &str) -> BuildResult<()>;

    /// `image:tag` をレジストリにプッシュ
    ///
    /// `registry_auth` は X-Registry-Auth の値 ([`crate::AuthConfig::encode`])。
    fn push<'a>(
        &'a self,
        image: &'a str,
        tag: &'a str,
        registry_auth: &'a str,
    ) -> ProgressStream<'a>;

    async fn inspect(&self, image: &str) -> BuildResult<ImageDetails>;

    /// イメージを強制削除
    async fn remove(&self, image: &str) -> BuildResult<()>;
}

/// Docker デーモンを使う [`Engine`]
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl Engine for DockerEngine {
    fn build<'a>(
        &'a self,
        context: Vec<u8>,
        dockerfile: &'a str,
        tag: &'a str,
    ) -> ProgressStream<'a> {
        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions::<String> {
            dockerfile: dockerfile.to_string(),
            t: tag.to_string(),
            nocache: true, // キャッシュを使わない
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            pull: true,    // ベースイメージを常にpull
            ..Default::default()
        };
        tracing::debug!("Build options: {:?}", options);

        let body = Full::new(Bytes::from(context));
        self.docker
            .build_image(options, None, Some(Either::Left(body)))
            .map(|result| result.map(ProgressMessage::from).map_err(BuildError::from))
            .boxed()
    }

    async fn tag(&self, image: &str, repo: &str, tag: &str) -> BuildResult<()> {
        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions::<String> {
            repo: repo.to_string(),
            tag: tag.to_string(),
        };
        self.docker.tag_image(image, Some(options)).await?;
        Ok(())
    }

    fn push<'a>(
        &'a self,
        image: &'a str,
        tag: &'a str,
        registry_auth: &'a str,
    ) -> ProgressStream<'a> {
        let credentials = match decode_registry_auth(registry_auth) {
            Ok(credentials) => credentials,
            Err(e) => return futures_util::stream::once(async move { Err(e) }).boxed(),
        };

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        #[allow(deprecated)]
        let stream = self
            .docker
            .push_image(image, Some(options), Some(credentials));
        stream
            .map(|result| result.map(ProgressMessage::from).map_err(BuildError::from))
            .boxed()
    }

    async fn inspect(&self, image: &str) -> BuildResult<ImageDetails> {
        let inspect = self.docker.inspect_image(image).await?;
        Ok(ImageDetails {
            id: inspect.id.unwrap_or_default(),
            architecture: inspect.architecture.unwrap_or_default(),
            os: inspect.os.unwrap_or_default(),
            os_version: inspect.os_version.unwrap_or_default(),
            size: inspect.size.unwrap_or(-1),
        })
    }

    async fn remove(&self, image: &str) -> BuildResult<()> {
        self.docker
            .remove_image(
                image,
                Some(bollard::query_parameters::RemoveImageOptions {
                    force: true,
                    ..Default::default()
                }),
                None,
            )
            .await?;
        Ok(())
    }
}
