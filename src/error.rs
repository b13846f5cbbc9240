//! 错误类型
//!
//! 按来源划分：LLM 调用、配置、表格存储、输入文件。
//! 应用层（main / orchestrator::app）统一用 `anyhow` 包装。

use thiserror::Error;

use crate::models::provider::ProviderKind;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 表格存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 输入文件错误
    #[error("输入错误: {0}")]
    Input(#[from] InputError),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 缺少凭据（该 provider 被跳过，非致命）
    #[error("provider {provider} 缺少凭据 (环境变量: {env_var})")]
    MissingCredential {
        provider: ProviderKind,
        env_var: String,
    },
    /// 连通性探测失败（该 provider 被跳过，非致命）
    #[error("provider {provider} 连通性探测失败: {source}")]
    ProbeFailed {
        provider: ProviderKind,
        #[source]
        source: BoxError,
    },
    /// 所有 provider 均不可用（对整个批次致命）
    #[error("所有 provider 均不可用 (共尝试 {tried} 个)")]
    AllProvidersExhausted { tried: usize },
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: BoxError,
    },
    /// 返回非 2xx 状态码
    #[error("LLM API返回错误状态 (模型: {model}): {status} {body}")]
    BadStatus {
        model: String,
        status: u16,
        body: String,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 单次调用超时
    #[error("LLM调用超时 (模型: {model}, {secs}秒)")]
    Timeout { model: String, secs: u64 },
    /// 批次被取消
    #[error("批次已取消")]
    Cancelled,
}

impl LlmError {
    /// 是否属于传输层失败（可以通过切换模型重试）
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            LlmError::ApiCallFailed { .. }
                | LlmError::BadStatus { .. }
                | LlmError::EmptyContent { .. }
                | LlmError::Timeout { .. }
        )
    }

    /// 创建 API 调用错误
    pub fn api_call_failed(model: impl Into<String>, source: impl Into<BoxError>) -> Self {
        LlmError::ApiCallFailed {
            model: model.into(),
            source: source.into(),
        }
    }

    /// 创建探测失败错误
    pub fn probe_failed(provider: ProviderKind, source: impl Into<BoxError>) -> Self {
        LlmError::ProbeFailed {
            provider,
            source: source.into(),
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取 provider 配置文件失败
    #[error("无法读取 provider 配置文件 {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// provider 配置文件解析失败
    #[error("provider 配置解析失败: {0}")]
    TomlParseFailed(#[from] toml::de::Error),
    /// provider 列表为空
    #[error("provider 列表为空")]
    EmptyRegistry,
}

/// 表格存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读写表格文件失败
    #[error("表格文件读写失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 表格中的 Clause ID 无法解析
    #[error("第 {line} 行的 Clause ID 无法解析: {value}")]
    BadClauseId { line: usize, value: String },
    /// Clause ID 已用尽
    #[error("Clause ID 已达上限 ({last})，无法分配新的 ID")]
    IdExhausted { last: u64 },
}

/// 输入错误
#[derive(Debug, Error)]
pub enum InputError {
    /// 不支持的文件格式
    #[error("不支持的文件格式: {extension} (仅支持 .txt / .md)")]
    UnsupportedFormat { extension: String },
    /// 条款为空
    #[error("条款内容为空")]
    EmptyClause,
    /// 起始 ID 加条款数超出 u64 范围
    #[error("Clause ID 溢出: 起始 {starting_id}，共 {count} 个条款")]
    ClauseIdOverflow { starting_id: u64, count: usize },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
