use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use contract_compliance::utils::logging;
use contract_compliance::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    let contract_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("用法: contract_compliance <合同文件>")?;

    // Ctrl-C 取消当前批次
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，正在取消...");
            trigger.cancel();
        }
    });

    // 初始化并运行应用
    let outcome = App::initialize(config)
        .await?
        .run(&contract_path, cancel)
        .await?;

    if !outcome.batch.is_complete() {
        warn!(
            "⚠️ {} 个条款分析失败，详见日志",
            outcome.batch.failed()
        );
    }

    Ok(())
}
