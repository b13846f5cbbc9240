//! 合规统计与报告
//!
//! 从分析结果计算仪表盘需要的统计数据，并输出 JSON 报告（不负责渲染）。

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::models::clause::{ClauseFailure, ClauseResult, RewriteSuggestion, RiskLevel};

/// 合同整体建议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// 存在高风险条款
    Reject,
    /// 中风险条款超过一半
    Review,
    Accept,
}

impl Recommendation {
    pub fn message(self) -> &'static str {
        match self {
            Recommendation::Reject => {
                "Do NOT accept this contract in current form. Review highlighted clauses before approval."
            }
            Recommendation::Review => {
                "Review recommended changes before proceeding with contract approval."
            }
            Recommendation::Accept => "Contract appears acceptable with minor considerations.",
        }
    }
}

/// 风险等级分布
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

impl RiskDistribution {
    fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::High => self.high += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::Low => self.low += 1,
            RiskLevel::Unknown => self.unknown += 1,
        }
    }
}

/// 仪表盘统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_clauses: usize,
    pub distribution: RiskDistribution,
    /// 低风险即视为合规
    pub compliant: usize,
    pub non_compliant: usize,
    /// 合规率（百分比），没有条款时为 0
    pub compliance_rate: f64,
    pub high_risk_count: usize,
    /// 可解析的风险百分比的平均值，没有可解析值时为 0
    pub average_risk_percent: f64,
    pub gdpr_mentions: usize,
    pub hipaa_mentions: usize,
    /// 关键短语中是否提到 liability
    pub mentions_liability: bool,
    pub insights: Vec<String>,
    pub key_points: Vec<String>,
    pub recommendation: Recommendation,
}

impl DashboardSummary {
    pub fn from_results(results: &[ClauseResult]) -> Self {
        let total = results.len();

        let mut distribution = RiskDistribution::default();
        for result in results {
            distribution.record(result.risk());
        }

        let compliant = distribution.low;
        let compliance_rate = if total > 0 {
            compliant as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        let percents: Vec<f64> = results
            .iter()
            .filter_map(ClauseResult::risk_percent_value)
            .collect();
        let average_risk_percent = if percents.is_empty() {
            0.0
        } else {
            percents.iter().sum::<f64>() / percents.len() as f64
        };

        let gdpr_mentions = results
            .iter()
            .filter(|r| r.regulation.contains("GDPR"))
            .count();
        let hipaa_mentions = results
            .iter()
            .filter(|r| r.regulation.contains("HIPAA"))
            .count();
        let mentions_liability = results
            .iter()
            .any(|r| r.key_phrases.to_lowercase().contains("liability"));

        let mut insights = Vec::new();
        if gdpr_mentions > 0 {
            insights.push("Data retention terms conflict with GDPR.".to_string());
        }
        if hipaa_mentions > 0 {
            insights.push("Access control and encryption measures are compliant.".to_string());
        }
        if distribution.high > 0 {
            insights
                .push("Liability clause is missing, which may increase legal risks.".to_string());
        }

        let mut key_points = Vec::new();
        if gdpr_mentions > 0 {
            key_points.push("Update retention policy to match GDPR timelines.".to_string());
        }
        if mentions_liability {
            key_points.push("Include liability clause to reduce legal exposure.".to_string());
        }

        let recommendation = if distribution.high > 0 {
            Recommendation::Reject
        } else if distribution.medium as f64 > total as f64 * 0.5 {
            Recommendation::Review
        } else {
            Recommendation::Accept
        };

        Self {
            total_clauses: total,
            distribution,
            compliant,
            non_compliant: total - compliant,
            compliance_rate,
            high_risk_count: distribution.high,
            average_risk_percent,
            gdpr_mentions,
            hipaa_mentions,
            mentions_liability,
            insights,
            key_points,
            recommendation,
        }
    }
}

/// 完整的 JSON 报告
#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub generated_at: DateTime<Local>,
    pub contract: String,
    pub model: String,
    pub starting_id: u64,
    pub summary: DashboardSummary,
    pub results: Vec<ClauseResult>,
    pub failures: Vec<ClauseFailure>,
    pub rewrites: Vec<RewriteSuggestion>,
}

pub async fn write_report(path: &Path, report: &ComplianceReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("序列化报告失败")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("写入报告失败: {}", path.display()))?;
    info!("📝 报告已保存至: {}", path.display());
    Ok(())
}
