//! Serve command implementation

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapter::{AdapterRegistry, ProviderAdapter};
use crate::api::{create_router, AppState};
use crate::clock::Context;
use crate::config::{LogFormat, ProviderKind, RouterConfig};
use crate::cost::CostController;
use crate::crypto::EncryptionService;
use crate::key::KeyManager;
use crate::cli::ServeArgs;
use crate::orchestrator::Orchestrator;
use crate::policy::PolicyEngine;
use crate::quota::model::TimeWindow;
use crate::quota::QuotaEngine;
use crate::routing::RoutingEngine;
use crate::store::memory::InMemoryStateStore;
use crate::store::StateStore;

/// Interval between background recovery scans (spec §4.1: keys in cooldown
/// are periodically re-evaluated).
const RECOVERY_INTERVAL: Duration = Duration::from_secs(30);

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<RouterConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        RouterConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        RouterConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.enable_content_logging {
        eprintln!(
            "WARNING: Content logging is enabled. Request/response message content will be logged."
        );
        eprintln!("         This may include sensitive data. Use only for debugging.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// The assembled dependency graph a running router (or a one-shot CLI
/// management command) needs.
pub struct RouterStack {
    pub orchestrator: Arc<Orchestrator>,
    pub routing_engine: Arc<RoutingEngine>,
    pub key_manager: Arc<KeyManager>,
    pub cost_controller: Arc<CostController>,
    pub policy_engine: Arc<PolicyEngine>,
    pub adapters: Arc<AdapterRegistry>,
}

fn build_adapter(kind: ProviderKind, base_url: &str, client: Arc<reqwest::Client>) -> Arc<dyn ProviderAdapter> {
    match kind {
        ProviderKind::OpenAi => Arc::new(crate::adapter::openai::OpenAiAdapter::new(base_url, client)),
        ProviderKind::Anthropic => Arc::new(crate::adapter::anthropic::AnthropicAdapter::new(base_url, client)),
    }
}

/// Build the full dependency graph from configuration: the encryption
/// service, state store, domain engines, and registered provider adapters.
/// Budgets and policies declared in configuration are seeded into their
/// respective engines.
pub fn build_stack(config: &RouterConfig) -> Result<RouterStack, Box<dyn std::error::Error>> {
    let ctx = Context::system();
    let master_key = config.resolve_master_key()?;
    let encryption = Arc::new(EncryptionService::new(&master_key)?);
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::default());

    let key_manager = Arc::new(KeyManager::new(store.clone(), encryption, ctx.clone()));
    let quota_engine = Arc::new(QuotaEngine::new(store.clone(), ctx.clone(), TimeWindow::Daily));
    let cost_controller = Arc::new(CostController::new(ctx.clone()));
    let policy_engine = Arc::new(PolicyEngine::new(ctx.clone()));

    let adapters = Arc::new(AdapterRegistry::new());
    let client = Arc::new(
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?,
    );
    for provider in &config.providers {
        let adapter = build_adapter(provider.kind, &provider.base_url, client.clone());
        adapters.register(provider.id.clone(), adapter)?;
        tracing::info!(provider_id = %provider.id, kind = ?provider.kind, "provider_registered");
    }

    for seed in &config.budgets {
        cost_controller.create_budget(
            seed.scope,
            seed.scope_id.clone(),
            seed.limit,
            seed.currency.clone(),
            seed.period,
            seed.enforcement_mode,
            seed.alert_threshold,
        )?;
    }

    for seed in &config.policies {
        policy_engine.create_policy(
            seed.name.clone(),
            seed.policy_type,
            seed.scope,
            seed.scope_id.clone(),
            seed.rules.clone(),
            seed.priority,
        )?;
    }

    let routing_engine = Arc::new(
        RoutingEngine::new(key_manager.clone(), store, ctx.clone())
            .with_quota_engine(quota_engine.clone())
            .with_policy_engine(policy_engine.clone())
            .with_cost_controller(cost_controller.clone())
            .with_adapters(adapters.clone()),
    );

    let orchestrator = Arc::new(
        Orchestrator::new(
            routing_engine.clone(),
            key_manager.clone(),
            adapters.clone(),
            ctx,
        )
        .with_quota_engine(quota_engine)
        .with_cost_controller(cost_controller.clone()),
    );

    Ok(RouterStack {
        orchestrator,
        routing_engine,
        key_manager,
        cost_controller,
        policy_engine,
        adapters,
    })
}

/// Build API router with all endpoints
fn build_api_router(config: &RouterConfig, stack: &RouterStack) -> (axum::Router, Arc<AppState>) {
    let app_state = Arc::new(AppState::new(
        stack.orchestrator.clone(),
        stack.routing_engine.clone(),
        stack.key_manager.clone(),
        stack.cost_controller.clone(),
        stack.policy_engine.clone(),
        stack.adapters.clone(),
        config.resolve_management_token(),
        config.server.cors_allowed_origins.clone(),
        Context::system(),
    ));
    let router = create_router(Arc::clone(&app_state));
    (router, app_state)
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;

    tracing::info!("Starting keyrouterd");
    tracing::debug!(?config, "Loaded configuration");

    let stack = build_stack(&config)?;
    let (app, _app_state) = build_api_router(&config, &stack);

    let cancel_token = CancellationToken::new();
    let recovery_handle = stack.orchestrator.clone().spawn_recovery_task(RECOVERY_INTERVAL);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %addr, "keyrouterd listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
    .await?;

    recovery_handle.stop();
    tracing::info!("keyrouterd stopped");
    Ok(())
}
