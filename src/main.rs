use anyhow::{Context, Result};
use greenhouse::api::{
    create_admin_router, create_query_router, create_resource_router, create_ws_router,
    AdminAppState, QueryAppState, ResourceAppState, WsAppState,
};
use greenhouse::bridge::{run_command_listener, run_publisher, BridgeListener, NatsClient, TopicScheme};
use greenhouse::config::{load_config, new_runtime_config, GreenhouseConfig};
use greenhouse::dispatch::CommandDispatcher;
use greenhouse::driver::{Driver, SimulatedDriver};
use greenhouse::resource::ResourceTree;
use greenhouse::scheduler::SensorPoller;
use greenhouse::state::ChangeNotifier;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "greenhouse.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenhouse=info".into()),
        )
        .init();

    info!("Greenhouse starting...");

    // Load configuration: GREENHOUSE_CONFIG, then ./greenhouse.toml, then defaults
    let mut config = match std::env::var("GREENHOUSE_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            load_config(DEFAULT_CONFIG_PATH)?
        }
        Err(_) => {
            info!("No config file found, using defaults");
            GreenhouseConfig::default()
        }
    };
    config.apply_env();
    config.validate().context("Invalid configuration")?;

    info!(
        bind_addr = %config.server.bind_addr,
        interval_ms = config.polling.interval_ms,
        sensors = config.entities.sensors.len(),
        actuators = config.entities.actuators.len(),
        bridge = config.bridge.enabled,
        "Configuration loaded"
    );

    // Core: registry, driver, dispatcher, resource tree
    let notifier = Arc::new(ChangeNotifier::new());
    let registry = Arc::new(
        config
            .entities
            .build_registry(Arc::clone(&notifier))
            .context("Failed to register entities")?,
    );
    let driver: Arc<dyn Driver> = Arc::new(SimulatedDriver::new());
    let dispatcher = Arc::new(CommandDispatcher::new(Arc::clone(&registry), Arc::clone(&driver)));
    let tree = Arc::new(ResourceTree::new(Arc::clone(&dispatcher)));

    // Message bus bridge
    if config.bridge.enabled {
        let topics = TopicScheme::new(config.bridge.topic_prefix.clone());
        let nats = NatsClient::connect(&config.bridge)
            .await
            .context("Failed to start message bus bridge")?;

        let (listener, updates) = BridgeListener::channel(config.bridge.buffer);
        notifier.subscribe(listener);
        tokio::spawn(run_publisher(Arc::new(nats.clone()), topics.clone(), updates));

        let client = nats.client().clone();
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if let Err(e) = run_command_listener(client, topics, dispatcher).await {
                error!(error = %e, "Command listener failed");
            }
        });
        info!(prefix = %config.bridge.topic_prefix, "Message bus bridge started");
    }

    // Polling
    let interval = Duration::from_millis(config.polling.interval_ms);
    let pollers: Vec<SensorPoller> = config
        .polling
        .sensors
        .iter()
        .map(|sensor| {
            SensorPoller::new(
                &sensor.name,
                Arc::clone(&driver),
                Arc::clone(&registry),
                sensor.filter(),
            )
        })
        .collect();
    for poller in &pollers {
        poller.scheduler.start(interval)?;
    }

    // HTTP API
    let runtime_config = new_runtime_config(config.polling.interval_ms);
    let app = create_resource_router(Arc::new(ResourceAppState {
        tree: Arc::clone(&tree),
    }))
    .merge(create_query_router(Arc::new(QueryAppState {
        registry: Arc::clone(&registry),
    })))
    .merge(create_ws_router(Arc::new(WsAppState {
        tree: Arc::clone(&tree),
        observe_buffer: config.observe.buffer,
    })))
    .merge(create_admin_router(Arc::new(AdminAppState {
        runtime_config,
        pollers: pollers.clone(),
    })))
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(bind_addr = %config.server.bind_addr, "Greenhouse server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // Graceful shutdown
    for poller in &pollers {
        poller.scheduler.shutdown().await;
    }
    info!("Greenhouse stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for ctrl_c signal");
            std::future::pending::<()>().await;
        }
    }
}
