//! 条款分析服务 - 业务能力层
//!
//! 只负责"分析一个条款"的能力：
//! - 分类请求：法规、摘要、风险等级、风险百分比
//! - 关键短语抽取请求
//! - 条款改写请求（低风险条款直接返回原文）
//!
//! 不做重试、不切换模型，失败原样返回给调用方。

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clients::ChatTransport;
use crate::config::Config;
use crate::error::{AppResult, InputError, LlmError};
use crate::models::clause::RiskLevel;
use crate::services::rate_limiter::RequestLimiter;
use crate::services::response_parser::{parse_classification, Classification};

/// 单次调用参数
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub request_timeout: Duration,
    pub classify_max_tokens: u32,
    pub key_phrase_max_tokens: u32,
    pub rewrite_max_tokens: u32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            classify_max_tokens: 200,
            key_phrase_max_tokens: 100,
            rewrite_max_tokens: 400,
        }
    }
}

impl From<&Config> for AnalyzerSettings {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            classify_max_tokens: config.classify_max_tokens,
            key_phrase_max_tokens: config.key_phrase_max_tokens,
            rewrite_max_tokens: config.rewrite_max_tokens,
        }
    }
}

/// 一个条款的完整分析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseAnalysis {
    pub classification: Classification,
    pub key_phrases: String,
}

/// 分类提示词，四行格式必须与 `response_parser` 保持一致
pub fn classification_prompt(clause: &str) -> String {
    format!(
        "Analyze this contract clause to identify the most relevant legal regulation (e.g., GDPR, HIPAA, or None) and assess its compliance. \
         Return the result in this format ONLY:\n\
         Regulation: <GDPR/HIPAA/Other/None>\n\
         Summary: <your 1-2 sentence summary under 100 words>\n\
         Risk: <High/Medium/Low>\n\
         Risk Percentage: <A percentage value from 0-100>\n\n\
         Clause: {}",
        clause
    )
}

/// 关键短语提示词
pub fn key_phrase_prompt(clause: &str) -> String {
    format!(
        "Read the following contract clause. \
         Extract the most important phrases that summarize its core obligation or purpose. \
         Return only the phrases as a comma-separated list. \
         For example, from 'CONSULTANT agrees to exercise special skill...', return 'exercise special skill, manner reasonably satisfactory'. \
         Clause: {}",
        clause
    )
}

/// 改写提示词
pub fn rewrite_prompt(clause: &str, risk_level: &str) -> String {
    format!(
        "Rewrite the following contract clause so that it complies with applicable data protection and privacy regulations (e.g., GDPR, HIPAA) and lowers its legal risk. \
         Its current risk level is {}. \
         Keep the original intent and return only the rewritten clause, without commentary.\n\n\
         Clause: {}",
        risk_level, clause
    )
}

/// 条款分析服务
///
/// 绑定一个已选定的 provider 连接；切换模型时由调用方创建新的实例。
#[derive(Clone)]
pub struct ClauseAnalyzer {
    transport: Arc<dyn ChatTransport>,
    limiter: Arc<RequestLimiter>,
    settings: AnalyzerSettings,
}

impl ClauseAnalyzer {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        limiter: Arc<RequestLimiter>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            transport,
            limiter,
            settings,
        }
    }

    /// 分类：返回法规、摘要、风险等级、风险百分比
    pub async fn classify(&self, clause: &str) -> AppResult<Classification> {
        let clause = non_empty(clause)?;
        let response = self
            .send(&classification_prompt(clause), self.settings.classify_max_tokens)
            .await?;
        Ok(parse_classification(&response))
    }

    /// 抽取关键短语，原样返回逗号分隔的字符串
    pub async fn extract_key_phrases(&self, clause: &str) -> AppResult<String> {
        let clause = non_empty(clause)?;
        let response = self
            .send(&key_phrase_prompt(clause), self.settings.key_phrase_max_tokens)
            .await?;
        Ok(response)
    }

    /// 依次执行分类和关键短语抽取
    pub async fn analyze(&self, clause: &str) -> AppResult<ClauseAnalysis> {
        let classification = self.classify(clause).await?;
        let key_phrases = self.extract_key_phrases(clause).await?;
        Ok(ClauseAnalysis {
            classification,
            key_phrases,
        })
    }

    /// 改写条款以满足合规要求
    ///
    /// 风险等级为 `Low` 时直接返回原文，不发起请求。
    pub async fn rewrite_clause(&self, clause: &str, risk_level: &str) -> AppResult<String> {
        if RiskLevel::parse(risk_level) == RiskLevel::Low {
            return Ok(clause.to_string());
        }

        let clause = non_empty(clause)?;
        let response = self
            .send(
                &rewrite_prompt(clause, risk_level),
                self.settings.rewrite_max_tokens,
            )
            .await?;
        Ok(response)
    }

    async fn send(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        self.limiter.acquire().await;

        debug!(
            "发送请求 -> {} ({})，提示词长度: {} 字符",
            self.transport.provider(),
            self.transport.model_id(),
            prompt.len()
        );

        match tokio::time::timeout(
            self.settings.request_timeout,
            self.transport.complete(prompt, max_tokens),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                model: self.transport.model_id().to_string(),
                secs: self.settings.request_timeout.as_secs(),
            }),
        }
    }
}

fn non_empty(clause: &str) -> Result<&str, InputError> {
    let clause = clause.trim();
    if clause.is_empty() {
        Err(InputError::EmptyClause)
    } else {
        Ok(clause)
    }
}
