//! Test configuration builders

use export_worker::config::TransferRetryConfig;
use export_worker::{Config, ExportMode};
use std::time::Duration;

/// Active FTP configuration pointing at `base_url`, with zero-delay polling and retries
pub fn test_config(base_url: &str, mode: ExportMode) -> Config {
    let mut config = Config::default();
    config.task_manager.base_url = base_url.to_string();
    config.task_manager.request_timeout = Duration::from_secs(5);
    config.task_manager.fetch_task.retries = 3;
    config.task_manager.fetch_task.interval = Duration::ZERO;
    config.export.mode = mode;
    config.transfer.retry = TransferRetryConfig {
        max_retry_count: 1,
        retry_sleep: Duration::ZERO,
    };
    config.transfer.ftp.active = true;
    config.transfer.ftp.host = "ftp.test".to_string();
    config
}
