mod config;
mod docker;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use config::{Cli, Settings};
use dockbatch_build::{BuildResolver, DockerEngine, Pipeline, PipelineConfig, RegistryAuth};
use std::time::Instant;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let started = Instant::now();
    let cli = Cli::parse_from(config::normalize_args(std::env::args_os()));

    // stdout はビルドログとまとめに使うので、ログは stderr に出力
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let settings = match Settings::from_cli(cli) {
        Ok(settings) => settings,
        Err(e) => {
            Cli::command().print_help().ok();
            if e.has_message() {
                println!();
                println!("{}", e);
            }
            std::process::exit(1);
        }
    };

    if let Err(e) = run(settings, started).await {
        println!();
        println!("{}", "***** ERROR *****".red().bold());
        for cause in e.chain() {
            println!("{}", cause);
        }
        std::process::exit(1);
    }
}

async fn run(settings: Settings, started: Instant) -> anyhow::Result<()> {
    let docker = docker::connect(&settings.api_version)
        .await
        .context("Failed to create Docker client")?;
    let engine = DockerEngine::new(docker);

    let files = BuildResolver::from_current_dir()
        .and_then(|resolver| resolver.resolve_dockerfiles(&settings.files))
        .context("Failed to get valid Docker files")?;

    let auth = settings
        .auth
        .or_docker_config(&RegistryAuth::new())
        .context("Failed to load registry credentials")?;
    let config = PipelineConfig {
        auth,
        cleanup: settings.cleanup,
    };

    let stdout = std::io::stdout();
    let mut pipeline = Pipeline::new(&engine, &config, stdout.lock());
    let summary = pipeline.run(&files).await?;
    pipeline.report(&summary, started.elapsed())?;

    Ok(())
}
