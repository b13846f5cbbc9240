use std::path::Path;

use crate::error::ConfigError;
use crate::models::provider::ProviderRegistry;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时分析的条款数量（0 表示不限）
    pub max_concurrent_clauses: usize,
    /// 每分钟请求上限（0 表示不限速）
    pub requests_per_minute: u32,
    /// 单次 LLM 调用超时（秒）
    pub request_timeout_secs: u64,
    // --- 单次请求的输出 token 上限 ---
    pub classify_max_tokens: u32,
    pub key_phrase_max_tokens: u32,
    pub rewrite_max_tokens: u32,
    /// 结果表格文件
    pub sheet_path: String,
    /// JSON 报告文件
    pub report_path: String,
    /// 运行日志文件
    pub output_log_file: String,
    /// provider 列表（TOML），不设置时使用内置默认值
    pub providers_file: Option<String>,
    /// 是否生成改写建议
    pub rewrite_clauses: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_clauses: 5,
            requests_per_minute: 30,
            request_timeout_secs: 60,
            classify_max_tokens: 200,
            key_phrase_max_tokens: 100,
            rewrite_max_tokens: 400,
            sheet_path: "compliance_sheet.tsv".to_string(),
            report_path: "compliance_report.json".to_string(),
            output_log_file: "output.txt".to_string(),
            providers_file: None,
            rewrite_clauses: true,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量读取（先加载 .env），缺失或无法解析时使用默认值
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        Self {
            max_concurrent_clauses: var("MAX_CONCURRENT_CLAUSES").and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_clauses),
            requests_per_minute: var("REQUESTS_PER_MINUTE").and_then(|v| v.parse().ok()).unwrap_or(default.requests_per_minute),
            request_timeout_secs: var("REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            classify_max_tokens: var("CLASSIFY_MAX_TOKENS").and_then(|v| v.parse().ok()).unwrap_or(default.classify_max_tokens),
            key_phrase_max_tokens: var("KEY_PHRASE_MAX_TOKENS").and_then(|v| v.parse().ok()).unwrap_or(default.key_phrase_max_tokens),
            rewrite_max_tokens: var("REWRITE_MAX_TOKENS").and_then(|v| v.parse().ok()).unwrap_or(default.rewrite_max_tokens),
            sheet_path: var("SHEET_PATH").unwrap_or(default.sheet_path),
            report_path: var("REPORT_PATH").unwrap_or(default.report_path),
            output_log_file: var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            providers_file: var("PROVIDERS_FILE").filter(|v| !v.trim().is_empty()),
            rewrite_clauses: var("REWRITE_CLAUSES").and_then(|v| v.parse().ok()).unwrap_or(default.rewrite_clauses),
            verbose_logging: var("VERBOSE_LOGGING").and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 加载 provider 列表并从环境变量填充凭据
    pub fn provider_registry(&self) -> Result<ProviderRegistry, ConfigError> {
        let registry = match &self.providers_file {
            Some(path) => ProviderRegistry::load(Path::new(path))?,
            None => ProviderRegistry::defaults(),
        };
        Ok(registry.with_env_credentials())
    }
}
