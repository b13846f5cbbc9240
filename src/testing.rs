//! 测试替身
//!
//! 提供可注入的 `ChatTransport` / `TransportFactory` 实现，记录调用次数，
//! 按提示词类型返回预设响应。单元测试和 tests/ 下的集成测试共用。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clients::{ChatTransport, TransportFactory};
use crate::error::LlmError;
use crate::models::provider::{Credential, ProviderConfig, ProviderKind};

/// 请求类型（根据提示词开头判断）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    Classification,
    KeyPhrases,
    Rewrite,
    Other,
}

impl PromptKind {
    pub fn of(prompt: &str) -> Self {
        if prompt.starts_with("Analyze this contract clause") {
            PromptKind::Classification
        } else if prompt.starts_with("Read the following contract clause") {
            PromptKind::KeyPhrases
        } else if prompt.starts_with("Rewrite the following contract clause") {
            PromptKind::Rewrite
        } else {
            PromptKind::Other
        }
    }
}

/// 从提示词中取出条款原文（最后一个 `Clause: ` 之后的内容）
pub fn clause_of(prompt: &str) -> &str {
    prompt
        .rfind("Clause: ")
        .map(|pos| &prompt[pos + "Clause: ".len()..])
        .unwrap_or(prompt)
}

type Handler = dyn Fn(PromptKind, &str) -> Result<String, LlmError> + Send + Sync;
type Delay = dyn Fn(&str) -> Duration + Send + Sync;

/// 可编程的 LLM 连接
pub struct MockTransport {
    provider: ProviderKind,
    model_name: String,
    /// 前 n 次探测成功，之后失败；None 表示一直成功
    healthy_probes: Option<usize>,
    handler: Box<Handler>,
    delay: Option<Box<Delay>>,
    calls: Mutex<Vec<(PromptKind, String)>>,
    probes: AtomicUsize,
}

impl MockTransport {
    /// 默认：所有条款都判为低风险
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            model_name: format!("mock-{}", provider),
            healthy_probes: None,
            handler: Box::new(default_reply),
            delay: None,
            calls: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(PromptKind, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    /// 按条款内容设置响应延迟，用于打乱完成顺序
    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn failing_probe(self) -> Self {
        self.failing_probe_after(0)
    }

    /// 前 `healthy` 次探测成功，之后一直失败（模拟批次中途掉线）
    pub fn failing_probe_after(mut self, healthy: usize) -> Self {
        self.healthy_probes = Some(healthy);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_of(&self, kind: PromptKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

fn default_reply(kind: PromptKind, clause: &str) -> Result<String, LlmError> {
    Ok(match kind {
        PromptKind::Classification => "Regulation: None\n\
                                       Summary: No compliance issue found.\n\
                                       Risk: Low\n\
                                       Risk Percentage: 10%"
            .to_string(),
        PromptKind::KeyPhrases => "key obligation".to_string(),
        PromptKind::Rewrite => format!("Revised: {}", clause),
        PromptKind::Other => String::new(),
    })
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }

    async fn probe(&self) -> Result<(), LlmError> {
        let attempt = self.probes.fetch_add(1, Ordering::SeqCst);
        match self.healthy_probes {
            Some(healthy) if attempt >= healthy => {
                Err(LlmError::probe_failed(self.provider, "mock probe failure"))
            }
            _ => Ok(()),
        }
    }

    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        let kind = PromptKind::of(prompt);
        let clause = clause_of(prompt).to_string();
        self.calls.lock().unwrap().push((kind, clause.clone()));

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(&clause)).await;
        }

        (self.handler)(kind, &clause)
    }
}

/// 按 `ProviderKind` 返回预先注册的 `MockTransport`
#[derive(Default)]
pub struct MockTransportFactory {
    transports: HashMap<ProviderKind, Arc<MockTransport>>,
    connects: Mutex<Vec<ProviderKind>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transport(mut self, transport: Arc<MockTransport>) -> Self {
        self.transports.insert(transport.provider, transport);
        self
    }

    /// 被连接过的 provider（按顺序）
    pub fn connects(&self) -> Vec<ProviderKind> {
        self.connects.lock().unwrap().clone()
    }
}

impl TransportFactory for MockTransportFactory {
    fn connect(
        &self,
        config: &ProviderConfig,
        _api_key: &Credential,
    ) -> Result<Arc<dyn ChatTransport>, LlmError> {
        self.connects.lock().unwrap().push(config.kind);
        match self.transports.get(&config.kind) {
            Some(transport) => Ok(transport.clone() as Arc<dyn ChatTransport>),
            None => Err(LlmError::probe_failed(
                config.kind,
                format!("no mock transport for {}", config.kind),
            )),
        }
    }
}
