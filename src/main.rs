use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use rust_blogengine::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志系统，RUST_LOG 未设置时使用 info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // 解析命令行参数
    let cli = cli::Cli::parse();

    println!("{}", "
 ____  _             _____             _
| __ )| | ___   __ _| ____|_ __   __ _(_)_ __   ___
|  _ \\| |/ _ \\ / _` |  _| | '_ \\ / _` | | '_ \\ / _ \\
| |_) | | (_) | (_| | |___| | | | (_| | | | | |  __/
|____/|_|\\___/ \\__, |_____|_| |_|\\__, |_|_| |_|\\___|
               |___/             |___/
    ".bright_cyan());

    println!("{} {}", "rust-blogengine".bright_cyan(), env!("CARGO_PKG_VERSION").bright_green());
    println!("{}", "A multi-blog content management engine".bright_white());
    println!();

    // 执行命令
    if let Err(e) = cli::execute(cli).await {
        error!("Error: {}", e);

        // 打印错误链
        for cause in e.chain().skip(1) {
            error!("Caused by: {}", cause);
        }

        std::process::exit(1);
    }

    Ok(())
}
