use clap::Parser;
use figment::{Figment, providers::Env};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use docent::clock::{Clock, SystemClock};
use docent::config::Config;
use docent::formatter;
use docent::mail::{DisabledMailer, LogMailer, Mailer};
use docent::personalize::TierStrategy;
use docent::rag::RetrieverGenerator;
use docent::rag::client::UpstreamGenerator;
use docent::rag::fixture::FixtureGenerator;
use docent::services::manager::ServiceManager;
use docent::services::{
    ServiceResult, maintenance::MaintenanceService, web::WebService,
};
use docent::state::AppState;
use docent::store;

/// Docent backend - widget session, rate-limit, and request-lifecycle service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = LogFormatter::Auto)]
    formatter: LogFormatter,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum LogFormatter {
    /// Use pretty formatter (default in debug mode)
    Pretty,
    /// Use JSON formatter (default in release mode)
    Json,
    /// Auto-select based on build mode (debug=pretty, release=json)
    Auto,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load configuration first to get log level
    let config: Config = Figment::new()
        .merge(Env::raw().split("__"))
        .extract()
        .expect("Failed to load config");

    // Test mode turns verbosity up unless the deployment pinned a level.
    let base_level = if config.integration_test_mode && config.log_level == "info" {
        "debug"
    } else {
        &config.log_level
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,docent={base_level}")));

    let use_pretty = match args.formatter {
        LogFormatter::Pretty => true,
        LogFormatter::Json => false,
        LogFormatter::Auto => cfg!(debug_assertions),
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if use_pretty {
        Box::new(
            FmtSubscriber::builder()
                .with_target(true)
                .event_format(formatter::PrettyEventFormatter)
                .with_env_filter(filter)
                .finish(),
        )
    } else {
        Box::new(
            FmtSubscriber::builder()
                .with_target(true)
                .event_format(formatter::JsonEventFormatter)
                .with_env_filter(filter)
                .finish(),
        )
    };
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = if config.integration_test_mode {
            "integration-test"
        } else {
            "production"
        },
        "starting_docent"
    );

    // Fail fast on unsafe production values, before any listener opens.
    if let Err(e) = config.validate() {
        error!(error = %e, "configuration_invalid");
        std::process::exit(1);
    }

    let db_pool = store::init(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to initialize store");

    info!(
        port = config.port,
        shutdown_timeout = format!("{:.2?}", config.shutdown_timeout),
        email_enabled = config.email_enabled,
        "configuration_loaded"
    );

    let config = Arc::new(config);
    let clock = Arc::new(SystemClock);

    if config.integration_test_mode {
        store::seed_integration_fixtures(&db_pool, clock.now())
            .await
            .expect("Failed to seed integration fixtures");
    }

    let generator: Arc<dyn RetrieverGenerator> = if config.integration_test_mode {
        Arc::new(FixtureGenerator)
    } else {
        Arc::new(
            UpstreamGenerator::new(config.generator_base_url.clone())
                .expect("Failed to create generator client"),
        )
    };

    let mailer: Arc<dyn Mailer> = if config.email_enabled && !config.integration_test_mode {
        Arc::new(LogMailer)
    } else {
        Arc::new(DisabledMailer)
    };

    let app_state = AppState::new(
        db_pool,
        config.clone(),
        clock.clone(),
        generator,
        mailer,
        Arc::new(TierStrategy),
    );

    let shutdown_timeout = config.shutdown_timeout;
    let port = config.port;

    let mut service_manager = ServiceManager::new();
    service_manager.register_service("web", Box::new(WebService::new(port, app_state.clone())));
    service_manager.register_service(
        "maintenance",
        Box::new(MaintenanceService::new(app_state.clone())),
    );
    service_manager.spawn_all();

    // Set up signal handling for both SIGINT (Ctrl+C) and SIGTERM
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("received ctrl+c, gracefully shutting down...");
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm_stream =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM signal handler");
        sigterm_stream.recv().await;
        info!("received SIGTERM, gracefully shutting down...");
    };

    #[cfg(not(unix))]
    let sigterm = async {
        // On non-Unix systems, create a future that never completes
        // so the select! below still works.
        std::future::pending::<()>().await;
    };

    let mut exit_code = 0;

    tokio::select! {
        (service_name, result) = service_manager.run() => {
            match result {
                ServiceResult::GracefulShutdown => {
                    info!(service = service_name, "service_completed_gracefully");
                }
                ServiceResult::NormalCompletion => {
                    warn!(service = service_name, "service_completed_unexpectedly");
                    exit_code = 1;
                }
                ServiceResult::Error(e) => {
                    error!(service = service_name, error = %e, "service_failed");
                    exit_code = 1;
                }
            }
        }
        _ = ctrl_c => {}
        _ = sigterm => {}
    }

    match service_manager.shutdown(shutdown_timeout).await {
        Ok(elapsed) => {
            info!(
                remaining = format!("{:.2?}", shutdown_timeout.saturating_sub(elapsed)),
                "graceful_shutdown_complete"
            );
        }
        Err(pending_services) => {
            warn!(
                pending_services = ?pending_services,
                "graceful_shutdown_elapsed_with_pending_services"
            );
            exit_code = if exit_code == 0 { 2 } else { exit_code };
        }
    }

    info!(exit_code, "application_shutdown_complete");
    std::process::exit(exit_code);
}
