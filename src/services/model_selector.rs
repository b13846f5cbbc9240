//! 模型选择服务
//!
//! 按优先级顺序探测 provider，返回第一个凭据存在且连通性检查通过的配置。
//! 不保存"当前 provider"状态：每次调用都从列表顶部重新探测。

use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::{ChatTransport, TransportFactory};
use crate::error::LlmError;
use crate::models::provider::{ProviderConfig, ProviderRegistry};

/// 已选定的 provider（配置 + 可用连接）
#[derive(Clone)]
pub struct SelectedProvider {
    pub config: Arc<ProviderConfig>,
    pub transport: Arc<dyn ChatTransport>,
}

impl std::fmt::Debug for SelectedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedProvider")
            .field("kind", &self.config.kind)
            .field("name", &self.config.name)
            .field("model_id", &self.config.model_id)
            .finish()
    }
}

/// 模型选择服务
pub struct ModelSelector {
    registry: ProviderRegistry,
    factory: Arc<dyn TransportFactory>,
}

impl ModelSelector {
    pub fn new(registry: ProviderRegistry, factory: Arc<dyn TransportFactory>) -> Self {
        Self { registry, factory }
    }

    /// 选择第一个可用的 provider
    ///
    /// 缺少凭据或探测失败的 provider 被跳过；全部不可用时返回
    /// `LlmError::AllProvidersExhausted`。
    pub async fn select(&self) -> Result<SelectedProvider, LlmError> {
        for config in self.registry.iter() {
            match self.try_provider(config).await {
                Ok(transport) => {
                    info!(
                        "✓ 使用 provider: {} ({} / {})",
                        config.kind, config.name, config.model_id
                    );
                    return Ok(SelectedProvider {
                        config: Arc::new(config.clone()),
                        transport,
                    });
                }
                Err(e) => {
                    warn!("⚠️ 跳过 provider {} ({}): {}", config.kind, config.name, e);
                }
            }
        }

        Err(LlmError::AllProvidersExhausted {
            tried: self.registry.len(),
        })
    }

    async fn try_provider(
        &self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn ChatTransport>, LlmError> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::MissingCredential {
                provider: config.kind,
                env_var: config.api_key_env.clone(),
            })?;

        let transport = self.factory.connect(config, api_key)?;
        transport.probe().await?;
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::provider::ProviderKind;
    use crate::testing::{MockTransport, MockTransportFactory};

    fn registry(primary_key: Option<&str>, fallback_key: Option<&str>) -> ProviderRegistry {
        let primary_key = primary_key.map(str::to_string);
        let fallback_key = fallback_key.map(str::to_string);
        ProviderRegistry::defaults().with_credentials_from(move |name| match name {
            "GROQ_API_KEY" => primary_key.clone(),
            "GITHUB_TOKEN" => fallback_key.clone(),
            _ => None,
        })
    }

    fn factory(primary: MockTransport, fallback: MockTransport) -> Arc<MockTransportFactory> {
        Arc::new(
            MockTransportFactory::new()
                .with_transport(Arc::new(primary))
                .with_transport(Arc::new(fallback)),
        )
    }

    #[tokio::test]
    async fn test_primary_without_credential_falls_back() {
        let factory = factory(
            MockTransport::new(ProviderKind::Primary),
            MockTransport::new(ProviderKind::Fallback),
        );
        let selector = ModelSelector::new(registry(None, Some("ghp_x")), factory.clone());

        let selected = selector.select().await.unwrap();
        assert_eq!(selected.config.kind, ProviderKind::Fallback);
        assert_eq!(factory.connects(), vec![ProviderKind::Fallback]);
    }

    #[tokio::test]
    async fn test_primary_preferred_when_available() {
        let factory = factory(
            MockTransport::new(ProviderKind::Primary),
            MockTransport::new(ProviderKind::Fallback),
        );
        let selector = ModelSelector::new(registry(Some("gsk_x"), Some("ghp_x")), factory.clone());

        let selected = selector.select().await.unwrap();
        assert_eq!(selected.config.kind, ProviderKind::Primary);
        assert_eq!(selected.transport.model_id(), "mock-primary");
    }

    #[tokio::test]
    async fn test_failed_probe_is_skipped() {
        let primary = Arc::new(MockTransport::new(ProviderKind::Primary).failing_probe());
        let factory = Arc::new(
            MockTransportFactory::new()
                .with_transport(primary.clone())
                .with_transport(Arc::new(MockTransport::new(ProviderKind::Fallback))),
        );
        let selector = ModelSelector::new(registry(Some("gsk_x"), Some("ghp_x")), factory);

        let selected = selector.select().await.unwrap();
        assert_eq!(selected.config.kind, ProviderKind::Fallback);
        assert_eq!(primary.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_all_missing_credentials_exhausted() {
        let factory = factory(
            MockTransport::new(ProviderKind::Primary),
            MockTransport::new(ProviderKind::Fallback),
        );
        let selector = ModelSelector::new(registry(None, None), factory.clone());

        let err = selector.select().await.unwrap_err();
        assert!(matches!(err, LlmError::AllProvidersExhausted { tried: 2 }));
        assert!(factory.connects().is_empty(), "缺少凭据时不应发起探测");
    }

    #[tokio::test]
    async fn test_every_call_reprobes_from_top() {
        let primary = Arc::new(MockTransport::new(ProviderKind::Primary).failing_probe());
        let factory = Arc::new(
            MockTransportFactory::new()
                .with_transport(primary.clone())
                .with_transport(Arc::new(MockTransport::new(ProviderKind::Fallback))),
        );
        let selector = ModelSelector::new(registry(Some("gsk_x"), Some("ghp_x")), factory);

        for _ in 0..3 {
            selector.select().await.unwrap();
        }
        assert_eq!(primary.probe_count(), 3);
    }
}
