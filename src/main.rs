use anyhow::Result;
use fieldtester::config::{Config, LogFormat};
use fieldtester::ingest::mqtt::FieldTesterService;
use tracing::{error, info};

fn init_tracing(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("fieldtester={}", config.logging.level).parse()?);

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config)?;

    info!("Starting field tester server v{}", fieldtester::VERSION);

    config.validate()?;
    info!("Configuration loaded successfully");

    let parser = config.parser.build();
    let topic = config.subscribe_topic(parser.as_ref());
    info!("Using {:?} parser on topic {}", config.parser, topic);

    let service = FieldTesterService::new(config.mqtt.clone(), topic, parser);

    let service_handle = tokio::spawn(async move {
        if let Err(e) = service.start().await {
            error!("MQTT service error: {:#}", e);
        }
    });

    info!("Field tester server started successfully");

    // Wait for shutdown signal (SIGTERM or SIGINT)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT received, shutting down gracefully...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("SIGTERM received, shutting down gracefully...");
        }
    }

    service_handle.abort();

    info!("Field tester server shutdown complete");

    Ok(())
}
