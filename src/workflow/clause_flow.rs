//! 条款处理流程 - 流程层
//!
//! 核心职责：定义"一个条款"的完整处理流程，统一失败策略
//!
//! 流程顺序：
//! 1. 使用本批选定的 provider 分析（分类 → 关键短语）
//! 2. 传输层失败 → 重新选择 provider（从列表顶部探测）→ 重试一次
//! 3. 仍然失败 → 记录为该条款失败，不中断整个批次

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::models::clause::{ClauseFailure, ClauseResult};
use crate::models::provider::ProviderKind;
use crate::services::{
    AnalyzerSettings, ClauseAnalysis, ClauseAnalyzer, ModelSelector, RequestLimiter,
    SelectedProvider,
};
use crate::workflow::clause_ctx::ClauseCtx;

/// 条款处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseOutcome {
    /// 分析成功
    Analyzed {
        result: ClauseResult,
        provider: ProviderKind,
        /// 是否经过一次模型切换
        switched: bool,
    },
    /// 重试后仍失败
    Failed(ClauseFailure),
}

/// 条款处理流程
///
/// - 不持有可变状态，可在多个 worker 间共享
/// - 只依赖业务能力（services）
pub struct ClauseFlow {
    selector: Arc<ModelSelector>,
    limiter: Arc<RequestLimiter>,
    settings: AnalyzerSettings,
}

impl ClauseFlow {
    pub fn new(
        selector: Arc<ModelSelector>,
        limiter: Arc<RequestLimiter>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            selector,
            limiter,
            settings,
        }
    }

    /// 为选定的 provider 创建分析服务
    pub fn analyzer_for(&self, provider: &SelectedProvider) -> ClauseAnalyzer {
        ClauseAnalyzer::new(
            provider.transport.clone(),
            self.limiter.clone(),
            self.settings.clone(),
        )
    }

    pub async fn run(
        &self,
        ctx: &ClauseCtx,
        clause: &str,
        provider: &SelectedProvider,
    ) -> ClauseOutcome {
        let first = self.analyzer_for(provider).analyze(clause).await;

        let err = match first {
            Ok(analysis) => {
                info!("{} ✓ 分析完成 ({})", ctx, provider.config.kind);
                return analyzed(ctx, clause, analysis, provider.config.kind, false);
            }
            Err(e) => e,
        };

        if !is_retryable(&err) {
            error!("{} ❌ 分析失败: {}", ctx, err);
            return failed(ctx, clause, &err);
        }

        warn!("{} ⚠️ 当前模型分析失败，尝试切换模型: {}", ctx, err);

        let replacement = match self.selector.select().await {
            Ok(replacement) => replacement,
            Err(select_err) => {
                error!("{} ❌ 无可用模型: {}", ctx, select_err);
                return failed(ctx, clause, &AppError::from(select_err));
            }
        };

        match self.analyzer_for(&replacement).analyze(clause).await {
            Ok(analysis) => {
                info!(
                    "{} ✓ 切换到 {} 后分析完成",
                    ctx, replacement.config.kind
                );
                analyzed(ctx, clause, analysis, replacement.config.kind, true)
            }
            Err(retry_err) => {
                error!("{} ❌ 重试后仍失败: {}", ctx, retry_err);
                failed(ctx, clause, &retry_err)
            }
        }
    }
}

fn is_retryable(err: &AppError) -> bool {
    matches!(err, AppError::Llm(e) if e.is_transport_failure())
}

fn analyzed(
    ctx: &ClauseCtx,
    clause: &str,
    analysis: ClauseAnalysis,
    provider: ProviderKind,
    switched: bool,
) -> ClauseOutcome {
    let ClauseAnalysis {
        classification,
        key_phrases,
    } = analysis;

    ClauseOutcome::Analyzed {
        result: ClauseResult {
            clause_id: ctx.clause_id,
            clause: clause.to_string(),
            regulation: classification.regulation,
            risk_level: classification.risk_level,
            risk_percent: classification.risk_percent,
            summary: classification.summary,
            key_phrases,
        },
        provider,
        switched,
    }
}

fn failed(ctx: &ClauseCtx, clause: &str, err: &AppError) -> ClauseOutcome {
    ClauseOutcome::Failed(ClauseFailure {
        clause_id: ctx.clause_id,
        clause: clause.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::models::provider::ProviderRegistry;
    use crate::testing::{MockTransport, MockTransportFactory, PromptKind};

    fn both_keys() -> ProviderRegistry {
        ProviderRegistry::defaults().with_credentials_from(|_| Some("key".to_string()))
    }

    fn unavailable() -> LlmError {
        LlmError::BadStatus {
            model: "mock".to_string(),
            status: 503,
            body: "overloaded".to_string(),
        }
    }

    async fn setup(
        registry: ProviderRegistry,
        primary: Arc<MockTransport>,
        fallback: Arc<MockTransport>,
    ) -> (ClauseFlow, SelectedProvider) {
        let factory = Arc::new(
            MockTransportFactory::new()
                .with_transport(primary)
                .with_transport(fallback),
        );
        let selector = Arc::new(ModelSelector::new(registry, factory));
        let selected = selector.select().await.unwrap();
        let flow = ClauseFlow::new(
            selector,
            Arc::new(RequestLimiter::unlimited()),
            AnalyzerSettings::default(),
        );
        (flow, selected)
    }

    fn setup_without_selection(
        registry: ProviderRegistry,
        primary: Arc<MockTransport>,
        fallback: Arc<MockTransport>,
    ) -> (ClauseFlow, Arc<MockTransportFactory>) {
        let factory = Arc::new(
            MockTransportFactory::new()
                .with_transport(primary)
                .with_transport(fallback),
        );
        let selector = Arc::new(ModelSelector::new(registry, factory.clone()));
        let flow = ClauseFlow::new(
            selector,
            Arc::new(RequestLimiter::unlimited()),
            AnalyzerSettings::default(),
        );
        (flow, factory)
    }

    #[tokio::test]
    async fn test_success_on_first_provider() {
        let primary = Arc::new(MockTransport::new(ProviderKind::Primary));
        let fallback = Arc::new(MockTransport::new(ProviderKind::Fallback));
        let (flow, selected) = setup(both_keys(), primary.clone(), fallback.clone()).await;

        let outcome = flow
            .run(&ClauseCtx::new(10, 0, 1), "The clause text.", &selected)
            .await;

        match outcome {
            ClauseOutcome::Analyzed {
                result,
                provider,
                switched,
            } => {
                assert_eq!(result.clause_id, 10);
                assert_eq!(result.risk_level, "Low");
                assert_eq!(result.key_phrases, "key obligation");
                assert_eq!(provider, ProviderKind::Primary);
                assert!(!switched);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_switches_model_once() {
        let primary = Arc::new(
            MockTransport::new(ProviderKind::Primary).with_handler(|_, _| Err(unavailable())),
        );
        let fallback = Arc::new(MockTransport::new(ProviderKind::Fallback));

        // 批次开始时选中首选
        let (_, selected) = setup(both_keys(), primary.clone(), fallback.clone()).await;
        assert_eq!(selected.config.kind, ProviderKind::Primary);

        // 重新选择时首选已失去凭据，只能落到备用
        let fallback_only = ProviderRegistry::defaults()
            .with_credentials_from(|name| (name == "GITHUB_TOKEN").then(|| "key".to_string()));
        let (flow, _) = setup(fallback_only, primary.clone(), fallback.clone()).await;

        let outcome = flow
            .run(&ClauseCtx::new(1, 0, 1), "Clause A text.", &selected)
            .await;
        match outcome {
            ClauseOutcome::Analyzed {
                provider, switched, ..
            } => {
                assert_eq!(provider, ProviderKind::Fallback);
                assert!(switched);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(primary.calls_of(PromptKind::Classification), 1);
        assert_eq!(fallback.calls_of(PromptKind::Classification), 1);
    }

    #[tokio::test]
    async fn test_reselecting_same_failing_model_gives_up() {
        let primary = Arc::new(
            MockTransport::new(ProviderKind::Primary).with_handler(|_, _| Err(unavailable())),
        );
        let fallback = Arc::new(MockTransport::new(ProviderKind::Fallback));
        let (flow, selected) = setup(both_keys(), primary.clone(), fallback.clone()).await;

        // 首选探测仍然成功，重新选择回到首选，第二次失败即放弃
        let outcome = flow
            .run(&ClauseCtx::new(1, 1, 2), "Clause B text.", &selected)
            .await;
        match outcome {
            ClauseOutcome::Failed(failure) => {
                assert_eq!(failure.clause_id, 2);
                assert!(failure.reason.contains("503"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(primary.calls_of(PromptKind::Classification), 2);
        assert_eq!(fallback.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_replacement_available_fails_clause() {
        let primary = Arc::new(
            MockTransport::new(ProviderKind::Primary).with_handler(|_, _| Err(unavailable())),
        );
        let fallback = Arc::new(MockTransport::new(ProviderKind::Fallback));
        let (_, selected) = setup(both_keys(), primary.clone(), fallback.clone()).await;

        // 重新选择时没有任何凭据
        let (flow, _) = setup_without_selection(ProviderRegistry::defaults(), primary, fallback);

        let outcome = flow
            .run(&ClauseCtx::new(5, 0, 1), "Clause text.", &selected)
            .await;
        match outcome {
            ClauseOutcome::Failed(failure) => {
                assert_eq!(failure.clause_id, 5);
                assert!(failure.reason.contains("所有 provider 均不可用"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_clause_not_retried() {
        let primary = Arc::new(MockTransport::new(ProviderKind::Primary));
        let fallback = Arc::new(MockTransport::new(ProviderKind::Fallback));
        let (flow, selected) = setup(both_keys(), primary.clone(), fallback.clone()).await;

        let outcome = flow.run(&ClauseCtx::new(1, 0, 1), "  ", &selected).await;
        assert!(matches!(outcome, ClauseOutcome::Failed(_)));
        assert_eq!(primary.call_count() + fallback.call_count(), 0);
        assert_eq!(primary.probe_count(), 1, "只有初始选择时探测过一次");
    }
}
