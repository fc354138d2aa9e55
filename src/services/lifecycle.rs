//! Service startup and teardown.

use std::any::Any;
use std::sync::Arc;

use crate::config::{ConfigError, Settings};
use crate::mcp::handlers::builtin_tools;
use crate::mcp::{DispatcherError, ToolDispatcher};
use crate::services::arxiv::{ArxivBackend, ArxivService};
use crate::services::calculator::CalculatorService;
use crate::services::registry::{ServiceError, ServiceKind, ServiceRegistry};

/// Startup failures. Any of them aborts the server before it binds.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),
}

/// Request-scoped view of the started services
#[derive(Debug, Clone)]
pub struct ServiceContext {
    registry: Arc<ServiceRegistry>,
}

impl ServiceContext {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Look up a constructed service
    pub fn service<T>(&self, kind: ServiceKind) -> Result<Arc<T>, ServiceError>
    where
        T: Any + Send + Sync,
    {
        self.registry.get(kind)
    }
}

/// Owns the service registry and the tool table for the lifetime of a server
#[derive(Debug)]
pub struct LifecycleManager {
    settings: Settings,
    registry: Arc<ServiceRegistry>,
    dispatcher: Arc<ToolDispatcher>,
}

impl LifecycleManager {
    /// Validate settings, construct every service and build the tool table
    pub async fn start(settings: Settings) -> Result<Self, LifecycleError> {
        Self::start_inner(settings, None).await
    }

    /// Like [`start`](Self::start), with the arXiv service talking to `backend`
    pub async fn start_with_backend(
        settings: Settings,
        backend: Arc<dyn ArxivBackend>,
    ) -> Result<Self, LifecycleError> {
        Self::start_inner(settings, Some(backend)).await
    }

    async fn start_inner(
        settings: Settings,
        backend: Option<Arc<dyn ArxivBackend>>,
    ) -> Result<Self, LifecycleError> {
        tracing::info!("Starting services");
        settings.validate()?;

        let registry = Arc::new(ServiceRegistry::new());

        let arxiv_config = settings.arxiv.clone();
        registry
            .get_or_try_init(ServiceKind::ARXIV, || async move {
                match backend {
                    Some(backend) => Ok(ArxivService::with_backend(arxiv_config, backend)),
                    None => ArxivService::new(arxiv_config),
                }
            })
            .await?;

        let calculator_config = settings.calculator.clone();
        registry
            .get_or_try_init(ServiceKind::CALCULATOR, || async move {
                calculator_config.validate()?;
                Ok::<_, ConfigError>(CalculatorService::new(calculator_config))
            })
            .await?;

        let mut dispatcher = ToolDispatcher::new(ServiceContext::new(Arc::clone(&registry)));
        for tool in builtin_tools(&registry.constructed()) {
            dispatcher.register(tool)?;
        }

        tracing::info!(
            "Services ready: {} tools registered ({})",
            dispatcher.len(),
            registry
                .constructed()
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            settings,
            registry,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> ServiceContext {
        ServiceContext::new(Arc::clone(&self.registry))
    }

    pub fn dispatcher(&self) -> Arc<ToolDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Log dispatch statistics and tear down every service
    pub fn shutdown(&self) {
        let stats = self.dispatcher.stats();
        tracing::info!(
            calls = stats.calls,
            errors = stats.errors,
            error_rate = stats.error_rate,
            average_latency_ms = stats.average_latency_ms,
            "Dispatch statistics"
        );

        self.registry.shutdown();
        tracing::info!("Services shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArxivConfig;
    use crate::services::mock::MockArxivBackend;

    #[tokio::test]
    async fn test_start_builds_services_and_tools() {
        let manager = LifecycleManager::start_with_backend(
            Settings::default(),
            Arc::new(MockArxivBackend::with_candidates(2)),
        )
        .await
        .unwrap();

        let ctx = manager.context();
        assert!(ctx.service::<ArxivService>(ServiceKind::ARXIV).is_ok());
        assert!(ctx
            .service::<CalculatorService>(ServiceKind::CALCULATOR)
            .is_ok());
        assert_eq!(manager.dispatcher().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_start() {
        let settings = Settings {
            arxiv: ArxivConfig {
                default_max_results: 0,
                ..ArxivConfig::default()
            },
            ..Settings::default()
        };

        let err = LifecycleManager::start_with_backend(
            settings,
            Arc::new(MockArxivBackend::new()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LifecycleError::Config(ConfigError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_services() {
        let manager = LifecycleManager::start_with_backend(
            Settings::default(),
            Arc::new(MockArxivBackend::new()),
        )
        .await
        .unwrap();
        let ctx = manager.context();

        manager.shutdown();
        assert!(matches!(
            ctx.service::<ArxivService>(ServiceKind::ARXIV),
            Err(ServiceError::NotConstructed(_))
        ));
    }
}
