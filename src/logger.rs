use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

static STUDIO_LOGGER: Lazy<StudioLogger> = Lazy::new(StudioLogger::new);

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

/// Installs the logger. A second call only updates the configuration.
pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_level_filter();
    STUDIO_LOGGER.update_config(config)?;

    // Already installed: keep the existing registration.
    let _ = log::set_logger(&*STUDIO_LOGGER);
    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "💡",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn to_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }

    pub fn to_level_filter(&self) -> log::LevelFilter {
        self.to_level().to_level_filter()
    }

    pub fn from_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

/// One structured log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    pub request_id: Option<String>,
    pub duration_ms: Option<u64>,
}

impl LogEntry {
    /// A leading `[req:<id>]` tag in the message becomes `request_id`.
    pub fn new(level: LogLevel, message: String, module: String, file: String, line: u32) -> Self {
        let (request_id, message) = split_request_tag(message);
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            level,
            message,
            module,
            file,
            line,
            request_id,
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }
}

fn split_request_tag(message: String) -> (Option<String>, String) {
    if let Some(rest) = message.strip_prefix("[req:") {
        if let Some(end) = rest.find(']') {
            let id = rest[..end].to_string();
            let text = rest[end + 1..].trim_start().to_string();
            return (Some(id), text);
        }
    }
    (None, message)
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_file_location: bool,
    pub show_module: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_file_path: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_file_location: false,
            show_module: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
            log_file_path: None,
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `LOG_LEVEL` and `LOG_FORMAT=json` override the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = std::env::var("LOG_LEVEL").ok().as_deref().and_then(LogLevel::parse) {
            config.min_level = level;
        }
        if std::env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json")) {
            config = Self {
                min_level: config.min_level,
                ..Self::production()
            };
        }
        config
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_file_path = Some(path.to_string());
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            show_emojis: false,
            output_json: true,
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_file_location: true,
            ..Default::default()
        }
    }
}

pub struct StudioLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
}

impl StudioLogger {
    fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            log_file: Mutex::new(None),
        }
    }

    fn update_config(&self, new_config: LoggerConfig) -> Result<(), String> {
        let file = match &new_config.log_file_path {
            Some(path) => Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| format!("Failed to open log file {}: {}", path, e))?,
            ),
            None => None,
        };

        if let Ok(mut slot) = self.log_file.lock() {
            *slot = file;
        }
        let mut config = self
            .config
            .lock()
            .map_err(|_| "Logger configuration lock poisoned".to_string())?;
        *config = new_config;
        Ok(())
    }

    fn format_console(entry: &LogEntry, config: &LoggerConfig) -> String {
        let paint = |text: String, style: fn(ColoredString) -> ColoredString| -> String {
            if config.show_colors {
                style(text.normal()).to_string()
            } else {
                text
            }
        };

        let mut output = paint(
            format!("{} ", entry.timestamp.format(&config.timestamp_format)),
            |s| s.bright_black(),
        );

        let level = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };
        if config.show_colors {
            output.push_str(&format!("[{}] ", level.color(entry.level.color()).bold()));
        } else {
            output.push_str(&format!("[{}] ", level));
        }

        if config.show_module && !entry.module.is_empty() {
            output.push_str(&paint(format!("{}::", entry.module), |s| s.bright_blue()));
        }

        output.push_str(&paint(entry.message.clone(), |s| s.white()));

        if let Some(request_id) = &entry.request_id {
            output.push_str(&paint(format!(" [req:{}]", request_id), |s| s.bright_yellow()));
        }
        if let Some(duration) = entry.duration_ms {
            output.push_str(&paint(format!(" [{}ms]", duration), |s| s.bright_magenta()));
        }
        if config.show_file_location {
            output.push_str(&paint(format!(" ({}:{})", entry.file, entry.line), |s| s.bright_black()));
        }

        output
    }

    fn render(entry: &LogEntry, config: &LoggerConfig) -> String {
        if config.output_json {
            serde_json::to_string(entry).unwrap_or_default()
        } else {
            Self::format_console(entry, config)
        }
    }
}

impl log::Log for StudioLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match self.config.lock() {
            Ok(config) => metadata.level() <= config.min_level.to_level(),
            Err(_) => true,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry::new(
            LogLevel::from_level(record.level()),
            record.args().to_string(),
            record.module_path().unwrap_or("unknown").to_string(),
            record.file().unwrap_or("unknown").to_string(),
            record.line().unwrap_or(0),
        );

        let line = match self.config.lock() {
            Ok(config) => Self::render(&entry, &config),
            Err(_) => return,
        };
        // stderr keeps stdout free for command output.
        eprintln!("{}", line);

        if let Ok(mut file) = self.log_file.lock() {
            if let Some(file) = file.as_mut() {
                let _ = writeln!(file, "{}", line);
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Ok(mut file) = self.log_file.lock() {
            if let Some(file) = file.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

/// Logs how long a request took when dropped.
pub struct RequestTimer {
    start: Instant,
    request_id: String,
    name: String,
}

impl RequestTimer {
    pub fn new(request_id: &str, name: &str) -> Self {
        log::debug!("[req:{}] ⏱️  {} started", request_id, name);
        Self {
            start: Instant::now(),
            request_id: request_id.to_string(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        log::info!(
            "[req:{}] ⏱️  {} finished in {}ms",
            self.request_id,
            self.name,
            self.elapsed().as_millis()
        );
    }
}

pub fn log_startup_info(app_name: &str, version: &str, config: &crate::config::Config) {
    log::info!("🚀 Starting {} v{}", app_name, version);
    log::info!(
        "🌐 Listening on http://{}:{}",
        config.server.host,
        config.server.port
    );
    log::info!("⚙️  Provider host: {}", config.provider.host);
    log::info!("   Model: {}", config.provider.model);
    log::info!(
        "   API key: {}",
        if config.provider.has_key() { "✅" } else { "❌" }
    );
    log::info!(
        "   Retry: {} attempts/size, base delay {}ms, timeout {}ms",
        config.retry.max_attempts_per_size,
        config.retry.base_delay.as_millis(),
        config.retry.provider_timeout.as_millis()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn logger_presets() {
        let config = LoggerConfig::development();
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.show_colors);

        let prod_config = LoggerConfig::production();
        assert!(!prod_config.show_colors);
        assert!(prod_config.output_json);
    }

    #[test]
    fn request_tag_is_lifted_into_entry() {
        let entry = LogEntry::new(
            LogLevel::Info,
            "[req:abc-1] Generating image".to_string(),
            "thumbforge".to_string(),
            "src/endpoint.rs".to_string(),
            1,
        );
        assert_eq!(entry.request_id.as_deref(), Some("abc-1"));
        assert_eq!(entry.message, "Generating image");

        let plain = LogEntry::new(LogLevel::Info, "[req: no end".to_string(), String::new(), String::new(), 0);
        assert!(plain.request_id.is_none());
    }

    #[test]
    fn plain_console_line_has_no_escape_codes() {
        let config = LoggerConfig::new().with_colors(false);
        let entry = LogEntry::new(LogLevel::Warn, "hi".to_string(), "m".to_string(), "f".to_string(), 3)
            .with_duration(Duration::from_millis(12));
        let line = StudioLogger::format_console(&entry, &config);
        assert!(line.contains("WARN"));
        assert!(line.contains("m::hi"));
        assert!(line.contains("[12ms]"));
        assert!(!line.contains('\u{1b}'));
    }

    #[test]
    fn logger_initialization() {
        assert!(init_with_config(LoggerConfig::development()).is_ok());
        assert!(init_with_config(LoggerConfig::production()).is_ok());
    }
}
