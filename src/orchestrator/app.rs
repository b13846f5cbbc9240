//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：加载 provider 列表、创建连接工厂、限速器和表格存储
//! 2. **单次运行**：读取合同 → 切分条款 → 选择模型 → 并发分析 → 写表格
//! 3. **后处理**：可选的改写建议、统计汇总、JSON 报告
//! 4. **全局统计**：输出最终统计信息
//!
//! 只做调度和统计，不做具体业务判断。

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clients::{DefaultTransportFactory, TransportFactory};
use crate::config::Config;
use crate::error::LlmError;
use crate::models::clause::{ClauseResult, RewriteSuggestion};
use crate::models::loaders::{chunk_clauses, load_contract_text};
use crate::models::provider::ProviderRegistry;
use crate::orchestrator::dispatcher::{rewrite_all, BatchReport, ClauseDispatcher};
use crate::reporting::{write_report, ComplianceReport, DashboardSummary};
use crate::services::{AnalyzerSettings, ModelSelector, RequestLimiter, SheetStore, TsvSheet};
use crate::utils::logging::{
    append_log_line, init_log_file, log_batch_complete, log_clauses_loaded, log_startup,
    print_final_stats,
};
use crate::workflow::ClauseFlow;

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub batch: BatchReport,
    pub rewrites: Vec<RewriteSuggestion>,
    pub summary: DashboardSummary,
}

/// 应用主结构
pub struct App {
    config: Config,
    selector: Arc<ModelSelector>,
    dispatcher: ClauseDispatcher,
    store: Arc<dyn SheetStore>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let registry = config
            .provider_registry()
            .context("加载 provider 列表失败")?;
        let factory = Arc::new(DefaultTransportFactory::new(Duration::from_secs(
            config.request_timeout_secs,
        )));
        let store = Arc::new(TsvSheet::new(&config.sheet_path));

        Ok(Self::with_parts(config, registry, factory, store))
    }

    /// 使用指定组件组装应用（测试中注入替身）
    pub fn with_parts(
        config: Config,
        registry: ProviderRegistry,
        factory: Arc<dyn TransportFactory>,
        store: Arc<dyn SheetStore>,
    ) -> Self {
        log_startup(&config, registry.len());

        let limiter = Arc::new(if config.requests_per_minute > 0 {
            RequestLimiter::per_minute(config.requests_per_minute)
        } else {
            RequestLimiter::unlimited()
        });
        let selector = Arc::new(ModelSelector::new(registry, factory));
        let flow = Arc::new(ClauseFlow::new(
            selector.clone(),
            limiter,
            AnalyzerSettings::from(&config),
        ));
        let dispatcher = ClauseDispatcher::new(flow, config.max_concurrent_clauses);

        Self {
            config,
            selector,
            dispatcher,
            store,
        }
    }

    /// 分析一个合同文件
    pub async fn run(&self, contract_path: &Path, cancel: CancellationToken) -> Result<RunOutcome> {
        let contract = contract_path.display().to_string();
        init_log_file(&self.config.output_log_file, &contract)?;

        info!("\n📁 正在读取合同: {}", contract);
        let text = load_contract_text(contract_path).await?;
        let clauses = chunk_clauses(&text);

        self.analyze_clauses(&contract, clauses, cancel).await
    }

    /// 分析已切分好的条款
    pub async fn analyze_clauses(
        &self,
        contract: &str,
        clauses: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        self.store
            .ensure_header()
            .await
            .context("检查表头失败")?;
        let starting_id = self.store.next_id().await.context("读取下一个 Clause ID 失败")?;

        log_clauses_loaded(clauses.len(), starting_id);

        if clauses.is_empty() {
            warn!("⚠️ 没有找到可分析的条款，程序结束");
            return Ok(RunOutcome {
                batch: BatchReport {
                    starting_id,
                    ..Default::default()
                },
                rewrites: Vec::new(),
                summary: DashboardSummary::from_results(&[]),
            });
        }

        let selected = self.selector.select().await.context("没有可用的模型")?;
        info!(
            "🤖 使用模型: {} ({})",
            selected.config.model_id, selected.config.kind
        );

        let batch = self
            .dispatcher
            .dispatch(&clauses, starting_id, &selected, &cancel)
            .await?;
        log_batch_complete(&batch);

        self.store
            .append_rows(&batch.rows())
            .await
            .context("写入表格失败")?;
        self.write_run_log(&batch);

        ensure_not_cancelled(&cancel)?;

        let rewrites = if self.config.rewrite_clauses && !batch.results.is_empty() {
            info!("✏️ 正在生成改写建议...");
            // 批次中切换过模型时，改写前重新选择一次
            let rewriter = if batch.provider_switches > 0 {
                match self.selector.select().await {
                    Ok(current) => current,
                    Err(e) => {
                        warn!("⚠️ 重新选择模型失败，沿用批次模型: {}", e);
                        selected.clone()
                    }
                }
            } else {
                selected.clone()
            };
            let analyzer = self.dispatcher.flow().analyzer_for(&rewriter);
            ensure_not_cancelled(&cancel)?;
            rewrite_all(
                &batch.results,
                &analyzer,
                self.config.max_concurrent_clauses,
                &cancel,
            )
            .await?
        } else {
            Vec::new()
        };

        ensure_not_cancelled(&cancel)?;

        let summary = DashboardSummary::from_results(&batch.results);

        let report = ComplianceReport {
            generated_at: chrono::Local::now(),
            contract: contract.to_string(),
            model: selected.config.model_id.clone(),
            starting_id,
            summary: summary.clone(),
            results: batch.results.clone(),
            failures: batch.failures.clone(),
            rewrites: rewrites.clone(),
        };
        write_report(Path::new(&self.config.report_path), &report).await?;

        print_final_stats(&summary, &batch, &self.config.output_log_file);

        Ok(RunOutcome {
            batch,
            rewrites,
            summary,
        })
    }

    /// 逐条写入运行日志，写失败只记录警告
    fn write_run_log(&self, batch: &BatchReport) {
        let lines = batch
            .results
            .iter()
            .map(result_line)
            .chain(batch.failures.iter().map(|f| {
                format!("[条款 #{}] ❌ 分析失败: {}", f.clause_id, f.reason)
            }));

        for line in lines {
            if let Err(e) = append_log_line(&self.config.output_log_file, &line) {
                warn!("⚠️ 写入日志文件失败: {}", e);
                break;
            }
        }
    }
}

/// 已写入表格的行保留；取消后不再发起新请求，也不写报告
fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), LlmError> {
    if cancel.is_cancelled() {
        warn!("⚠️ 运行已取消");
        return Err(LlmError::Cancelled);
    }
    Ok(())
}

fn result_line(result: &ClauseResult) -> String {
    format!(
        "[条款 #{}] ✓ {} | {} | {}",
        result.clause_id, result.regulation, result.risk_level, result.risk_percent
    )
}
