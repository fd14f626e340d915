//! Registrar - 教务记录管理工具
//!
//! 核心设计原则：
//! - 核心逻辑只通过持久化接口访问数据
//! - 约束冲突如实报告，从不自动重试
//! - 先修关系必须无环

pub mod cli;
pub mod core;
pub mod storage;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.resolve_config()?;

    // 初始化日志，RUST_LOG 优先；verbose 时输出执行的语句
    let default_filter = if config.verbose {
        "registrar=info"
    } else {
        "registrar=warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    tracing::debug!("启动 Registrar, 数据库: {}", config.database.display());

    cli.run(config)
}
