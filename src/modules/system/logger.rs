use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::AppResult;

const LOG_FILE_PREFIX: &str = "fleetgate.log";
const LOG_RETENTION_DAYS: u64 = 7;
const MAX_TOTAL_SIZE_BYTES: u64 = 256 * 1024 * 1024;
const TARGET_SIZE_BYTES: u64 = 128 * 1024 * 1024;

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(w, "{}", now.to_rfc3339())
    }
}

pub fn get_log_dir(data_dir: &Path) -> AppResult<PathBuf> {
    let log_dir = data_dir.join("logs");
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)?;
    }
    Ok(log_dir)
}

/// Console plus daily-rolling file output. Falls back to console only when
/// the log directory cannot be created.
pub fn init_logger(data_dir: &Path) {
    let _ = tracing_log::LogTracer::init();

    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_timer(LocalTimer);

    let log_dir = match get_log_dir(data_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to initialize log directory: {}", e);
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(console_layer)
                .try_init();
            return;
        }
    };

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::Layer::new()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_timer(LocalTimer);
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    // The writer thread must outlive every span; the process exits without dropping it.
    std::mem::forget(guard);

    info!("Log system initialized (Console + File persistence)");
    match cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS) {
        Ok(deleted) if deleted > 0 => info!("Log cleanup removed {} file(s)", deleted),
        Ok(_) => {}
        Err(e) => warn!("Failed to cleanup old logs: {}", e),
    }
}

/// Deletes files older than `days_to_keep`, then trims oldest-first while the
/// directory exceeds its size budget. Returns the number of files deleted.
pub fn cleanup_old_logs(log_dir: &Path, days_to_keep: u64) -> AppResult<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let cutoff_time = now.saturating_sub(days_to_keep * 24 * 60 * 60);

    let mut entries_info = Vec::new();
    for entry in fs::read_dir(log_dir)?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Ok(metadata) = fs::metadata(&path) {
            let modified_secs = metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(now);
            entries_info.push((path, metadata.len(), modified_secs));
        }
    }

    let mut deleted_count = 0;
    let mut remaining_entries = Vec::new();
    for (path, size, modified_secs) in entries_info {
        if modified_secs < cutoff_time {
            match fs::remove_file(&path) {
                Ok(()) => deleted_count += 1,
                Err(e) => {
                    warn!("Failed to delete old log file {:?}: {}", path, e);
                    remaining_entries.push((path, size, modified_secs));
                }
            }
        } else {
            remaining_entries.push((path, size, modified_secs));
        }
    }

    let mut current_total_size: u64 = remaining_entries.iter().map(|(_, size, _)| *size).sum();
    if current_total_size > MAX_TOTAL_SIZE_BYTES {
        remaining_entries.sort_by_key(|(_, _, modified)| *modified);
        for (path, size, _) in remaining_entries {
            if current_total_size <= TARGET_SIZE_BYTES {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                deleted_count += 1;
                current_total_size -= size;
            }
        }
    }

    Ok(deleted_count)
}
