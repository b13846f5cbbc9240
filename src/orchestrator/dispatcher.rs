//! 批量条款调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **预分配 ID**：第 i 个条款的 Clause ID 为 `starting_id + i`，与完成顺序无关
//! 2. **并发控制**：Semaphore 限制同时分析的条款数（0 表示不限）
//! 3. **按完成顺序收集**：JoinSet 中谁先完成先收谁
//! 4. **排序输出**：结果按 Clause ID 升序，保证写入顺序与文档顺序一致
//! 5. **取消**：CancellationToken 触发后中止所有未完成任务

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{AppResult, InputError, LlmError};
use crate::models::clause::{
    ClauseFailure, ClauseResult, ClauseStatus, RewriteSuggestion, SheetRow,
};
use crate::services::{ClauseAnalyzer, SelectedProvider};
use crate::workflow::{ClauseCtx, ClauseFlow, ClauseOutcome};

/// 一批条款的处理结果
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub starting_id: u64,
    pub total: usize,
    /// 按 Clause ID 升序
    pub results: Vec<ClauseResult>,
    /// 按 Clause ID 升序
    pub failures: Vec<ClauseFailure>,
    /// 经过模型切换才完成的条款数
    pub provider_switches: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// 待写入表格的行（按 Clause ID 升序，失败条款不写入）
    pub fn rows(&self) -> Vec<SheetRow> {
        self.results.iter().map(ClauseResult::to_row).collect()
    }

    /// 每个 Clause ID 的处理状态（按 Clause ID 升序）
    pub fn statuses(&self) -> Vec<(u64, ClauseStatus)> {
        let mut statuses: Vec<(u64, ClauseStatus)> = self
            .results
            .iter()
            .map(|r| (r.clause_id, ClauseStatus::Analyzed))
            .chain(self.failures.iter().map(|f| {
                (
                    f.clause_id,
                    ClauseStatus::Failed {
                        reason: f.reason.clone(),
                    },
                )
            }))
            .collect();
        statuses.sort_by_key(|(id, _)| *id);
        statuses
    }
}

/// 条款调度器
pub struct ClauseDispatcher {
    flow: Arc<ClauseFlow>,
    max_concurrent: usize,
}

impl ClauseDispatcher {
    pub fn new(flow: Arc<ClauseFlow>, max_concurrent: usize) -> Self {
        Self {
            flow,
            max_concurrent,
        }
    }

    pub fn flow(&self) -> &Arc<ClauseFlow> {
        &self.flow
    }

    /// 并发分析所有条款
    ///
    /// 单个条款失败不会中断批次；只有取消会让整个批次返回错误。
    pub async fn dispatch(
        &self,
        clauses: &[String],
        starting_id: u64,
        provider: &SelectedProvider,
        cancel: &CancellationToken,
    ) -> AppResult<BatchReport> {
        let total = clauses.len();
        let mut report = BatchReport {
            starting_id,
            total,
            ..Default::default()
        };

        if total == 0 {
            return Ok(report);
        }

        if ClauseCtx::last_id(starting_id, total).is_none() {
            return Err(InputError::ClauseIdOverflow {
                starting_id,
                count: total,
            }
            .into());
        }

        info!(
            "📦 开始分析 {} 个条款 (起始 ID: {}, 模型: {})",
            total,
            starting_id,
            provider.transport.model_id()
        );

        let semaphore =
            (self.max_concurrent > 0).then(|| Arc::new(Semaphore::new(self.max_concurrent)));

        // 尚未收到结果的条款（任务 panic 时用来补记失败）
        let mut pending: BTreeMap<u64, &str> = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for (index, clause) in clauses.iter().enumerate() {
            let ctx = ClauseCtx::new(starting_id, index, total);
            pending.insert(ctx.clause_id, clause.as_str());

            let flow = self.flow.clone();
            let provider = provider.clone();
            let clause = clause.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                flow.run(&ctx, &clause, &provider).await
            });
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    warn!("⚠️ 批次已取消，{} 个条款未完成", pending.len());
                    return Err(LlmError::Cancelled.into());
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok(ClauseOutcome::Analyzed {
                    result, switched, ..
                }) => {
                    pending.remove(&result.clause_id);
                    if switched {
                        report.provider_switches += 1;
                    }
                    report.results.push(result);
                }
                Ok(ClauseOutcome::Failed(failure)) => {
                    pending.remove(&failure.clause_id);
                    report.failures.push(failure);
                }
                Err(e) => {
                    error!("条款任务执行失败: {}", e);
                }
            }
        }

        for (clause_id, clause) in pending {
            report.failures.push(ClauseFailure {
                clause_id,
                clause: clause.to_string(),
                reason: "任务异常退出".to_string(),
            });
        }

        report.results.sort_by_key(|r| r.clause_id);
        report.failures.sort_by_key(|f| f.clause_id);

        info!(
            "✓ 批次完成: 成功 {}/{}，失败 {}",
            report.succeeded(),
            total,
            report.failed()
        );

        Ok(report)
    }
}

/// 为分析结果生成改写建议
///
/// 低风险条款原样返回；单个改写失败时保留原文并记录原因。
/// 输出按 Clause ID 升序。取消时丢弃未完成的请求并返回 `LlmError::Cancelled`。
pub async fn rewrite_all(
    results: &[ClauseResult],
    analyzer: &ClauseAnalyzer,
    max_concurrent: usize,
    cancel: &CancellationToken,
) -> Result<Vec<RewriteSuggestion>, LlmError> {
    let limit = if max_concurrent == 0 {
        results.len().max(1)
    } else {
        max_concurrent
    };

    let pending = stream::iter(results)
        .map(|result| async move {
            match analyzer
                .rewrite_clause(&result.clause, &result.risk_level)
                .await
            {
                Ok(rewritten) => RewriteSuggestion {
                    clause_id: result.clause_id,
                    risk_level: result.risk_level.clone(),
                    changed: rewritten != result.clause,
                    original: result.clause.clone(),
                    rewritten,
                    error: None,
                },
                Err(e) => {
                    warn!("[条款 #{}] ⚠️ 改写失败: {}", result.clause_id, e);
                    RewriteSuggestion {
                        clause_id: result.clause_id,
                        risk_level: result.risk_level.clone(),
                        original: result.clause.clone(),
                        rewritten: result.clause.clone(),
                        changed: false,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .buffer_unordered(limit)
        .collect::<Vec<RewriteSuggestion>>();

    let mut suggestions = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("⚠️ 改写已取消");
            return Err(LlmError::Cancelled);
        }
        suggestions = pending => suggestions,
    };

    suggestions.sort_by_key(|s| s.clause_id);
    Ok(suggestions)
}
