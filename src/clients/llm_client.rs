/// LLM API 客户端
///
/// 两种 provider 传输方式：
/// - OpenAI 兼容接口：使用 `async-openai` 的预认证 client
/// - 原始 HTTPS POST：bearer token + 固定 API 版本头，解析 `choices[0].message.content`
///
/// 客户端只负责一次请求/响应，不做重试。
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::models::provider::{Credential, ProviderConfig, ProviderKind, TransportSpec};

/// 与单个 LLM provider 的连接
#[async_trait]
pub trait ChatTransport: Send + Sync {
    fn provider(&self) -> ProviderKind;

    fn model_id(&self) -> &str;

    /// 轻量连通性检查（列出模型）
    async fn probe(&self) -> Result<(), LlmError>;

    /// 发送单条 user 消息，返回去掉首尾空白的回复
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}

/// 根据 provider 配置创建连接
pub trait TransportFactory: Send + Sync {
    fn connect(
        &self,
        config: &ProviderConfig,
        api_key: &Credential,
    ) -> Result<Arc<dyn ChatTransport>, LlmError>;
}

/// 默认工厂：按 `TransportSpec` 创建真实客户端
pub struct DefaultTransportFactory {
    request_timeout: Duration,
}

impl DefaultTransportFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn connect(
        &self,
        config: &ProviderConfig,
        api_key: &Credential,
    ) -> Result<Arc<dyn ChatTransport>, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| LlmError::api_call_failed(&config.model_id, e))?;

        let transport: Arc<dyn ChatTransport> = match &config.transport {
            TransportSpec::OpenAiCompatible { api_base } => Arc::new(OpenAiCompatClient::new(
                config.kind,
                &config.model_id,
                api_base,
                api_key,
                http,
            )),
            TransportSpec::RawHttp {
                api_url,
                api_version,
                probe_url,
            } => Arc::new(HttpChatClient {
                provider: config.kind,
                model_name: config.model_id.clone(),
                api_url: api_url.clone(),
                api_version: api_version.clone(),
                probe_url: probe_url.clone(),
                api_key: api_key.clone(),
                http,
            }),
        };

        Ok(transport)
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiCompatClient {
    provider: ProviderKind,
    client: Client<OpenAIConfig>,
    model_name: String,
    api_base: String,
    api_key: Credential,
    http: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        provider: ProviderKind,
        model_name: &str,
        api_base: &str,
        api_key: &Credential,
        http: reqwest::Client,
    ) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.expose())
            .with_api_base(api_base);

        // 关闭 async-openai 内置的退避重试：5xx / 429 立即返回，由流程层决定是否切换模型
        let no_retry = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Self {
            provider,
            client: Client::with_config(openai_config).with_backoff(no_retry),
            model_name: model_name.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.clone(),
            http,
        }
    }
}

#[async_trait]
impl ChatTransport for OpenAiCompatClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }

    async fn probe(&self) -> Result<(), LlmError> {
        let url = format!("{}/models", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .send()
            .await
            .map_err(|e| LlmError::probe_failed(self.provider, e))?;

        if !response.status().is_success() {
            return Err(LlmError::probe_failed(
                self.provider,
                format!("GET {} 返回 {}", url, response.status()),
            ));
        }
        Ok(())
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| LlmError::api_call_failed(&self.model_name, e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| LlmError::api_call_failed(&self.model_name, e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::api_call_failed(&self.model_name, e.to_string())
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("LLM API 调用成功");
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 原始 HTTPS 客户端
pub struct HttpChatClient {
    provider: ProviderKind,
    model_name: String,
    api_url: String,
    api_version: String,
    probe_url: Option<String>,
    api_key: Credential,
    http: reqwest::Client,
}

impl HttpChatClient {
    const API_VERSION_HEADER: &'static str = "X-GitHub-Api-Version";

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(self.api_key.expose())
            .header(Self::API_VERSION_HEADER, &self.api_version)
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

#[async_trait]
impl ChatTransport for HttpChatClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }

    async fn probe(&self) -> Result<(), LlmError> {
        // 没有配置探测地址时只校验凭据存在
        let Some(url) = self.probe_url.as_deref() else {
            return Ok(());
        };

        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| LlmError::probe_failed(self.provider, e))?;

        if !response.status().is_success() {
            return Err(LlmError::probe_failed(
                self.provider,
                format!("GET {} 返回 {}", url, response.status()),
            ));
        }
        Ok(())
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        debug!("调用 LLM API (HTTP)，模型: {}", self.model_name);

        let body = ChatBody {
            model: &self.model_name,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        let response = self
            .request(reqwest::Method::POST, &self.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                LlmError::api_call_failed(&self.model_name, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::BadStatus {
                model: self.model_name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::api_call_failed(&self.model_name, e))?;

        extract_content(parsed).ok_or_else(|| LlmError::EmptyContent {
            model: self.model_name.clone(),
        })
    }
}

fn extract_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  Regulation: GDPR \n"}},{"message":{"content":"second"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_content(parsed).as_deref(), Some("Regulation: GDPR"));
    }

    #[test]
    fn test_extract_content_missing() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_content(parsed).is_none());

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(extract_content(parsed).is_none());

        let parsed: ChatResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(extract_content(parsed).is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatBody {
            model: "openai/gpt-4o",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            max_tokens: 200,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "openai/gpt-4o",
                "messages": [{"role": "user", "content": "hello"}],
                "max_tokens": 200
            })
        );
    }

    #[test]
    fn test_factory_builds_both_kinds() {
        let factory = DefaultTransportFactory::new(Duration::from_secs(5));
        let key = Credential::new("test-key");

        for config in crate::models::ProviderRegistry::defaults().providers {
            let transport = factory.connect(&config, &key).unwrap();
            assert_eq!(transport.provider(), config.kind);
            assert_eq!(transport.model_id(), config.model_id);
        }
    }

    /// 本地 HTTP 服务：每个连接都返回 503，记录收到的请求数
    async fn serve_unavailable() -> (String, Arc<std::sync::atomic::AtomicUsize>) {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    // 读完请求头和请求体再响应
                    loop {
                        let n = match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => n,
                        };
                        buf.extend_from_slice(&chunk[..n]);
                        let text = String::from_utf8_lossy(&buf).to_string();
                        if let Some(end) = text.find("\r\n\r\n") {
                            let length = text[..end]
                                .lines()
                                .find_map(|l| {
                                    let (name, value) = l.split_once(':')?;
                                    name.eq_ignore_ascii_case("content-length")
                                        .then(|| value.trim().parse::<usize>().ok())
                                        .flatten()
                                })
                                .unwrap_or(0);
                            if buf.len() >= end + 4 + length {
                                break;
                            }
                        }
                    }

                    let body = r#"{"error":{"message":"overloaded","type":"server_error","param":null,"code":null}}"#;
                    let response = format!(
                        "HTTP/1.1 503 Service Unavailable\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}/v1", addr), requests)
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let (api_base, requests) = serve_unavailable().await;
        let client = OpenAiCompatClient::new(
            ProviderKind::Primary,
            "mock-model",
            &api_base,
            &Credential::new("test-key"),
            reqwest::Client::new(),
        );

        let started = std::time::Instant::now();
        let result =
            tokio::time::timeout(Duration::from_secs(4), client.complete("hi", 10)).await;

        let err = result.expect("5xx 应立即返回错误").unwrap_err();
        assert!(matches!(err, LlmError::ApiCallFailed { .. }));
        assert!(err.is_transport_failure());
        assert_eq!(requests.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    /// 需要真实的 GROQ_API_KEY
    #[tokio::test]
    #[ignore]
    async fn test_primary_connectivity() {
        let _ = tracing_subscriber::fmt::try_init();

        let registry = crate::models::ProviderRegistry::defaults().with_env_credentials();
        let config = &registry.providers[0];
        let key = config.api_key.clone().expect("GROQ_API_KEY 未设置");

        let transport = DefaultTransportFactory::new(Duration::from_secs(30))
            .connect(config, &key)
            .unwrap();
        transport.probe().await.unwrap();

        let reply = transport.complete("Reply with the word OK.", 10).await.unwrap();
        println!("LLM 响应: {}", reply);
        assert!(!reply.is_empty());
    }
}
