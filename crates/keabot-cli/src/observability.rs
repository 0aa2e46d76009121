use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "keabot.logs.jsonl";

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Logging knobs read from the environment.
///
/// Only the `KEABOT_*` names are read. The binary has a single prefix and no
/// earlier names to stay compatible with, so there is one variable per knob.
#[derive(Debug, Default, PartialEq, Eq)]
struct LogSettings {
    /// `KEABOT_OBSERVABILITY_ENABLED`; unparseable values count as enabled.
    disabled: bool,
    /// `KEABOT_LOG_LEVEL`, an `EnvFilter` directive.
    filter: Option<String>,
    /// `KEABOT_JSON_LOG_PATH`; switches output to JSONL in that file.
    json_path: Option<PathBuf>,
}

impl LogSettings {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            disabled: lookup("KEABOT_OBSERVABILITY_ENABLED")
                .and_then(|value| parse_bool_env(&value))
                == Some(false),
            filter: lookup("KEABOT_LOG_LEVEL").filter(|level| !level.trim().is_empty()),
            json_path: lookup("KEABOT_JSON_LOG_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// `KEABOT_LOG_LEVEL`, then `RUST_LOG`, then the `--log-level` default.
    fn env_filter(&self, default_level: &str) -> EnvFilter {
        if let Some(filter) = self
            .filter
            .as_deref()
            .and_then(|level| EnvFilter::try_new(level).ok())
        {
            return filter;
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    }
}

/// Splits a log file path into the directory and file name the appender wants.
fn log_file_location(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initialize logging once per process.
///
/// Console logs go to stderr so they never interleave with streamed content
/// on stdout. With `KEABOT_JSON_LOG_PATH` set, logs go to that file as JSONL
/// and the console stays quiet.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| {
        let settings = LogSettings::from_env();
        if settings.disabled {
            return;
        }

        let env_filter = settings.env_filter(default_level);
        match &settings.json_path {
            Some(path) => {
                let (dir, file_name) = log_file_location(path);
                let _ = std::fs::create_dir_all(&dir);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(tracing_appender::rolling::never(dir, file_name));
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            None => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}
