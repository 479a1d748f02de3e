use bollard::{ClientVersion, Docker};
use colored::Colorize;
use std::fmt::Display;

/// Docker デーモンのソケット (固定)
pub const DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";

/// 長いビルドやプッシュが途中で切れないようにする
const REQUEST_TIMEOUT_SECS: u64 = 60 * 60;

/// Docker接続を初期化（エラーハンドリング付き）
pub async fn connect(version: &ClientVersion) -> anyhow::Result<Docker> {
    let docker = match Docker::connect_with_socket(DOCKER_SOCKET, REQUEST_TIMEOUT_SECS, version) {
        Ok(docker) => docker,
        Err(e) => {
            print_connection_error(&e);
            return Err(anyhow::anyhow!("Failed to connect to {}", DOCKER_SOCKET));
        }
    };

    // 接続テスト
    match docker.ping().await {
        Ok(_) => {
            tracing::debug!(
                "Connected to {} (API {}.{})",
                DOCKER_SOCKET,
                version.major_version,
                version.minor_version
            );
            Ok(docker)
        }
        Err(e) => {
            print_connection_error(&e);
            Err(anyhow::anyhow!("Failed to connect to {}", DOCKER_SOCKET))
        }
    }
}

fn print_connection_error(cause: &dyn Display) {
    eprintln!();
    eprintln!("{}", "✗ Docker connection error".red().bold());
    eprintln!();
    eprintln!("{}", "Cause:".yellow());
    eprintln!("  {}", cause);
    eprintln!();
    eprintln!("{}", "How to fix:".yellow());
    eprintln!("  • Make sure the Docker daemon is running");
    eprintln!("  • Make sure {} is readable by this user", DOCKER_SOCKET);
    eprintln!("  • Check that `docker ps` works");
}
