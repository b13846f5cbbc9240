/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::orchestrator::BatchReport;
use crate::reporting::DashboardSummary;

/// 初始化日志输出
///
/// `RUST_LOG` 优先；未设置时按 `verbose` 选择 debug 或 info。
/// 重复初始化时静默忽略。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
/// - `contract`: 本次分析的合同文件
pub fn init_log_file(log_file_path: &str, contract: &str) -> Result<()> {
    let log_header = format!(
        "{}\n合同合规分析日志 - {}\n合同文件: {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        contract,
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 追加一行到日志文件
pub fn append_log_line(log_file_path: &str, line: &str) -> Result<()> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, providers: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 合同条款合规分析");
    info!("📊 最大并发条款数: {}", config.max_concurrent_clauses);
    if config.requests_per_minute > 0 {
        info!("⏱️ 请求速率上限: {}/分钟", config.requests_per_minute);
    } else {
        info!("⏱️ 请求速率: 不限");
    }
    info!("🤖 已配置 {} 个模型 provider", providers);
    info!("{}", "=".repeat(60));
}

/// 记录条款切分信息
pub fn log_clauses_loaded(total: usize, starting_id: u64) {
    info!("✓ 切分出 {} 个条款", total);
    if total > 0 {
        info!(
            "📋 Clause ID 范围: {}-{}",
            starting_id,
            starting_id + total as u64 - 1
        );
    }
}

/// 记录批次完成信息
pub fn log_batch_complete(report: &BatchReport) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 分析完成: 成功 {}/{}",
        report.succeeded(),
        report.total
    );
    if report.provider_switches > 0 {
        info!("🔁 切换模型后完成: {}", report.provider_switches);
    }
    for failure in &report.failures {
        info!(
            "❌ [条款 #{}] {} -> {}",
            failure.clause_id,
            truncate_text(&failure.clause, 40),
            failure.reason
        );
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &DashboardSummary, report: &BatchReport, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", report.succeeded(), report.total);
    info!("❌ 失败: {}", report.failed());
    info!(
        "📈 合规率: {:.0}%  高风险: {}  平均风险: {:.0}%",
        summary.compliance_rate, summary.high_risk_count, summary.average_risk_percent
    );
    info!("💡 建议: {}", summary.recommendation.message());
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
