use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::telemetry::status_message;
use application::{
    AcquisitionScheduler, CommandDispatcher, CommandListener, CommandSource, DeviceState, Outbox,
    SchedulerSettings, SharedDriver,
};
use domain::{Channel, EventPublisher};
use infrastructure::config::SensorDriverKind;
use infrastructure::messaging::mqtt_publisher::to_qos;
use infrastructure::{
    DriverFactory, MqttClient, MqttEventPublisher, MqttPublisherClient, MqttSettings, NodeConfig,
    Topics,
};
use node_agent::api;
use node_agent::connectivity::ConnectivityWatcher;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override Device ID
    #[arg(long)]
    device_id: Option<String>,

    /// Override MQTT Host
    #[arg(long)]
    mqtt_host: Option<String>,

    /// Override MQTT Port
    #[arg(long)]
    mqtt_port: Option<u16>,

    /// Override metrics HTTP port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Use the built-in sensor simulator instead of the serial port
    #[arg(long)]
    simulate: bool,
}

async fn run() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,node_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(pid = std::process::id(), version = env!("CARGO_PKG_VERSION"), "Sensor node starting");

    let args = Args::parse();

    // 1. Load Configuration
    let mut config = NodeConfig::load(&args.config_dir)
        .with_context(|| format!("Failed to load configuration from {}", args.config_dir))?;

    if let Some(id) = args.device_id {
        config.device.id = id;
    }
    if let Some(host) = args.mqtt_host {
        config.mqtt.host = host;
    }
    if let Some(port) = args.mqtt_port {
        config.mqtt.port = port;
    }
    if let Some(port) = args.metrics_port {
        config.metrics.port = port;
    }
    if args.simulate {
        config.sensor.driver = SensorDriverKind::Simulator;
    }

    let identity = config.identity(env!("CARGO_PKG_VERSION"));
    let device_config = config
        .device_config()
        .context("Invalid initial device configuration")?;
    let state = Arc::new(DeviceState::new(identity.clone(), device_config)?);
    info!(
        device_id = %identity.device_id,
        class = identity.class.as_str(),
        interval_ms = device_config.interval_ms,
        "Loaded configuration"
    );

    // 2. Sensor driver. A failed bring-up is logged and retried by the
    //    acquisition loop; the node still serves commands and metrics
    let mut driver = DriverFactory::create_driver(identity.class, &config.sensor, &config.camera)?;
    match driver.initialize(&device_config).await {
        Ok(()) => info!(driver = driver.driver_type(), "Sensor driver initialized"),
        Err(e) => {
            error!(driver = driver.driver_type(), error = %e, "Sensor driver initialization failed");
            state.update_metrics(|metrics| {
                metrics.record_acquisition_error(chrono::Utc::now(), e.to_string())
            });
        }
    }
    let driver: SharedDriver = Arc::new(Mutex::new(driver));

    // 3. MQTT
    let topics = Topics::new(&config.mqtt.topic_prefix, &identity.device_id);
    let offline = status_message(&state.get_snapshot(), "offline")?;
    let last_will = rumqttc::LastWill::new(
        topics.topic(Channel::Status),
        offline.payload,
        to_qos(device_config.qos),
        true,
    );

    info!(host = %config.mqtt.host, port = config.mqtt.port, "Connecting to MQTT Broker...");
    let mqtt_client = MqttClient::new(MqttSettings {
        host: config.mqtt.host.clone(),
        port: config.mqtt.port,
        client_id: config.client_id(),
        keep_alive: Duration::from_secs(config.mqtt.keep_alive_secs),
        last_will: Some(last_will),
    })
    .await?;

    let client_arc: Arc<dyn MqttPublisherClient> = Arc::new(mqtt_client.clone());
    let publisher: Arc<dyn EventPublisher> =
        Arc::new(MqttEventPublisher::new(client_arc, topics.clone()));
    let outbox = Outbox::new(state.clone(), publisher);

    let cancel_token = CancellationToken::new();

    // 4. Command Listener
    let dispatcher = Arc::new(CommandDispatcher::new(state.clone(), driver.clone()));
    let source: Arc<dyn CommandSource> = Arc::new(mqtt_client.clone());
    let listener = CommandListener::new(source, topics.clone(), dispatcher, outbox.clone());
    let listener_token = cancel_token.clone();
    let listener_handle = tokio::spawn(async move { listener.start(listener_token).await });

    // 5. Presence
    let watcher = ConnectivityWatcher::new(
        state.clone(),
        outbox.clone(),
        mqtt_client.connection_events(),
    );
    let watcher_handle = tokio::spawn(watcher.run(cancel_token.clone()));

    // 6. Acquisition loop
    let scheduler = AcquisitionScheduler::new(
        state.clone(),
        driver.clone(),
        outbox.clone(),
        SchedulerSettings {
            tick: Duration::from_millis(config.scheduler.tick_ms.max(1)),
            telemetry_interval: Duration::from_millis(config.scheduler.telemetry_interval_ms),
            suppress_until_ready: config.scheduler.suppress_until_ready,
        },
    );
    let scheduler_handle = tokio::spawn(scheduler.run(cancel_token.clone()));

    // 7. Metrics endpoint
    let app = api::create_router(state.clone());
    let addr = format!("{}:{}", config.metrics.bind, config.metrics.port);
    let http_listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint on {}", addr))?;
    info!("Metrics listening on http://{}/metrics", addr);

    let http_token = cancel_token.clone();
    let http_handle = tokio::spawn(async move {
        let shutdown = async move { http_token.cancelled().await };
        if let Err(e) = axum::serve(http_listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!(error = %e, "Metrics server failed");
        }
    });

    // 8. Shutdown Signal
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
    }

    cancel_token.cancel();
    for handle in [listener_handle, watcher_handle, scheduler_handle, http_handle] {
        if let Err(e) = handle.await {
            warn!(error = %e, "Task ended abnormally");
        }
    }

    // Best effort, the last will covers an unclean exit
    if !outbox.send_status("offline").await {
        warn!("Could not publish offline status");
    }
    if let Err(e) = mqtt_client.disconnect().await {
        warn!(error = %e, "MQTT disconnect failed");
    }

    info!("Good bye!");
    Ok(())
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run()) {
        eprintln!("\nCRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}
