pub mod admin;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod job;
pub mod models;
pub mod modules;
pub mod state;
pub mod upstream;
mod utils;

#[cfg(test)]
mod test_utils;

use std::path::{Path, PathBuf};
use std::time::Duration;

use modules::system::{config, logger, validation};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

fn load_validated_config(data_dir: &Path) -> Result<models::AppConfig, String> {
    let mut config = config::load_app_config_from(data_dir)
        .map_err(|e| format!("failed_to_load_config: {}", e))?;
    config::apply_env_overrides(&mut config);
    validation::validate_app_config(&config).map_err(|errors| {
        format!(
            "configuration_validation_failed:\n{}",
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        )
    })?;
    Ok(config)
}

async fn run_headless_job(data_dir: PathBuf) -> i32 {
    let config = match load_validated_config(&data_dir) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current item");
            signal_cancel.cancel();
        }
    });

    match job::run_job(&config, &data_dir, cancel).await {
        Ok(summary) => {
            info!(
                "Job summary: {}",
                serde_json::to_string(&summary).unwrap_or_default()
            );
            0
        }
        Err(e) => {
            error!("Job setup failed: {}", e);
            1
        }
    }
}

async fn run_server(data_dir: PathBuf) -> i32 {
    let config = match load_validated_config(&data_dir) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };
    let services = match state::CoreServices::build(&config, &data_dir) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize services: {}", e);
            return 1;
        }
    };
    match services.gateway.pool().load().await {
        Ok(source) => info!("Credential pool ready ({:?})", source),
        Err(e) => warn!("Pool load failed, starting with an empty pool: {}", e),
    }

    let cancel = CancellationToken::new();
    let sync_handle = gateway::sync::start_sync_worker(
        services.gateway.clone(),
        gateway::sync::SyncSettings::from(&config.remote),
        cancel.child_token(),
    );
    let admin_state = admin::AdminState {
        gateway: services.gateway.clone(),
    };
    let admin_cancel = cancel.child_token();
    let admin_config = config.admin.clone();
    let admin_handle = tokio::spawn(async move {
        admin::serve_admin(admin_state, &admin_config, admin_cancel).await
    });

    info!("fleetgate is running. Press Ctrl+C to exit.");
    let exit_code = tokio::select! {
        _ = tokio::signal::ctrl_c() => 0,
        result = admin_handle => match result {
            Ok(Ok(())) => 0,
            Ok(Err(e)) => {
                error!("Admin API failed: {}", e);
                1
            }
            Err(e) => {
                error!("Admin API task failed: {}", e);
                1
            }
        },
    };

    info!("Shutting down");
    cancel.cancel();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, sync_handle).await.is_err() {
        warn!(
            "Pool sync worker did not stop within {:?}",
            SHUTDOWN_TIMEOUT
        );
    }
    exit_code
}

/// Entry point: `fleetgate job` runs one unattended pass, anything else
/// serves the admin API with background pool sync.
pub fn run() -> i32 {
    let data_dir = match config::get_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to resolve data directory: {}", e);
            return 1;
        }
    };
    logger::init_logger(&data_dir);
    info!(
        "fleetgate v{} (tls: {})",
        env!("CARGO_PKG_VERSION"),
        utils::http::tls_backend_name()
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            return 1;
        }
    };

    let headless_job = std::env::args().skip(1).any(|arg| arg == "job");
    runtime.block_on(async move {
        if headless_job {
            run_headless_job(data_dir).await
        } else {
            run_server(data_dir).await
        }
    })
}
