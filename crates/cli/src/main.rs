//! # eventpipe CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 会话脚本回放 (去重 → 缓冲 → sinks)
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod replay;

use anyhow::Result;
use clap::Parser;
use observability::TracingConfig;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    observability::init_tracing(&TracingConfig::from_verbosity(
        cli.verbose,
        cli.quiet,
        cli.log_format.into(),
    ))?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "eventpipe starting");

    let outcome = match &cli.command {
        Commands::Replay(args) => commands::run_replay(args).await,
        Commands::Validate(args) => commands::run_validate(args),
        Commands::Info(args) => commands::run_info(args),
    };

    outcome.inspect_err(|e| tracing::error!(error = %e, "Command failed"))
}
