pub mod accounts;
pub mod categories;
pub mod errors;
pub mod models;
pub mod reports;
pub mod requests;
pub mod search;
pub mod shortlist;
pub mod store;

pub use crate::errors::{AppError, AppResult};
pub use crate::models::{
    AccountPatch, AccountRecord, AccountStatus, AccountSummary, ActivityReport, CategoryPatch,
    CategoryRecord, CategoryVisibility, CreateAccountPayload, CreateCategoryPayload,
    CreateRequestPayload, ReportPeriod, ReportRow, RequestRecord, RequestStatus, SearchCriteria,
    ShortlistOutcome, UpdateRequestPatch, UserDirectory,
};
pub use crate::store::{FileBackend, StorageBackend, Store};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Daily-rolling JSON logs under `<data_dir>/logs`, filtered by
/// `RUST_LOG` with an `info` default. Call once from the hosting process.
pub fn init_tracing(data_dir: &Path) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "request-center.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
