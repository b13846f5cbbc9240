//! Provider 注册表
//!
//! 有序的 LLM provider 列表。顺序即优先级，`ModelSelector` 从上往下探测。
//! 凭据只从环境变量读取，配置文件里只写变量名。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;

/// Provider 标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// 首选
    Primary,
    /// 备用
    Fallback,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Primary => "primary",
            ProviderKind::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 连接方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum TransportSpec {
    /// OpenAI 兼容接口，使用预认证的 client
    OpenAiCompatible { api_base: String },
    /// 原始 HTTPS POST（bearer token + API 版本头）
    RawHttp {
        api_url: String,
        api_version: String,
        #[serde(default)]
        probe_url: Option<String>,
    },
}

/// API 密钥（Debug 输出时隐藏）
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(***)")
    }
}

/// 单个 provider 的配置
///
/// 批次开始前选定后不再修改；重试时会重新选择，而不是修改已有配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// 服务名（如 groq / github），仅用于日志
    pub name: String,
    pub model_id: String,
    /// 存放密钥的环境变量名
    pub api_key_env: String,
    #[serde(flatten)]
    pub transport: TransportSpec,
    #[serde(skip)]
    pub api_key: Option<Credential>,
}

impl ProviderConfig {
    /// 是否带有可用凭据
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

/// 有序的 provider 列表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRegistry {
    pub providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    /// 内置默认配置：Groq（首选）+ GitHub Models（备用）
    pub fn defaults() -> Self {
        Self {
            providers: vec![
                ProviderConfig {
                    kind: ProviderKind::Primary,
                    name: "groq".to_string(),
                    model_id: "llama-3.3-70b-versatile".to_string(),
                    api_key_env: "GROQ_API_KEY".to_string(),
                    transport: TransportSpec::OpenAiCompatible {
                        api_base: "https://api.groq.com/openai/v1".to_string(),
                    },
                    api_key: None,
                },
                ProviderConfig {
                    kind: ProviderKind::Fallback,
                    name: "github".to_string(),
                    model_id: "openai/gpt-4o".to_string(),
                    api_key_env: "GITHUB_TOKEN".to_string(),
                    transport: TransportSpec::RawHttp {
                        api_url: "https://models.github.ai/inference/chat/completions"
                            .to_string(),
                        api_version: "2022-11-28".to_string(),
                        probe_url: Some("https://models.github.ai/catalog/models".to_string()),
                    },
                    api_key: None,
                },
            ],
        }
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let registry: ProviderRegistry = toml::from_str(content)?;
        if registry.providers.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        Ok(registry)
    }

    /// 从 TOML 文件加载
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 从进程环境读取凭据
    pub fn with_env_credentials(self) -> Self {
        self.with_credentials_from(|name| std::env::var(name).ok())
    }

    /// 使用自定义查找函数填充凭据，空白值视为缺失
    pub fn with_credentials_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for provider in &mut self.providers {
            provider.api_key = lookup(&provider.api_key_env)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(Credential::new);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }
}
