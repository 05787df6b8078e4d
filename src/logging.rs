// logging.rs — 日志初始化
// 控制台（stderr）默认只输出 warn 以上，--verbose 时为 debug，可用 CHROMADESK_LOG 覆盖；
// 同时以 info 级别追加写入 ~/.config/chromadesk/chromadesk.log，供定时器运行时排查

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub const LOG_ENV: &str = "CHROMADESK_LOG";

fn console_filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "warn" };
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// 初始化全局 subscriber，log_file 为 None 时只输出到控制台
pub fn init(verbose: bool, log_file: Option<&Path>) {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter(verbose));

    let mut file_error = None;
    let file_layer = log_file.and_then(|path| {
        if let Some(dir) = path.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                file_error = Some(format!("{}: {e}", dir.display()));
                return None;
            }
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(LevelFilter::INFO),
            ),
            Err(e) => {
                file_error = Some(format!("{}: {e}", path.display()));
                None
            }
        }
    });

    // 测试或重复初始化时已经有全局 subscriber，忽略即可
    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    if let Some(e) = file_error {
        warn!("cannot open log file, logging to console only: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_lowers_console_level() {
        // 环境变量未设置时才检查默认值
        if std::env::var_os(LOG_ENV).is_none() {
            assert_eq!(console_filter(false).to_string(), "warn");
            assert_eq!(console_filter(true).to_string(), "debug");
        }
    }

    #[test]
    fn init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("chromadesk.log");
        init(false, Some(path.as_path()));
        assert!(path.is_file());
    }
}
