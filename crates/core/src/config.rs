use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub bot: BotConfig,
    pub booking: BookingConfig,
    pub reminders: ReminderConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub token: SecretString,
    pub admin_handles: Vec<String>,
    pub admin_chat_ids: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub utc_offset: String,
    pub horizon_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReminderConfig {
    pub sweep_interval_secs: u64,
    pub day_lead_mins: u64,
    pub day_window_mins: u64,
    pub hour_lead_mins: u64,
    pub hour_window_mins: u64,
    pub past_grace_mins: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub admin_handles: Option<Vec<String>>,
    pub utc_offset: Option<String>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://lashbook.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            bot: BotConfig {
                token: String::new().into(),
                admin_handles: Vec::new(),
                admin_chat_ids: Vec::new(),
            },
            booking: BookingConfig { utc_offset: "+02:00".to_string(), horizon_days: 60 },
            reminders: ReminderConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            day_lead_mins: 24 * 60,
            day_window_mins: 120,
            hour_lead_mins: 60,
            hour_window_mins: 20,
            past_grace_mins: 60,
        }
    }
}

impl BookingConfig {
    /// The studio's single reference timezone.
    pub fn zone(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset.trim().parse::<FixedOffset>().map_err(|_| {
            ConfigError::Validation(format!(
                "booking.utc_offset must look like `+02:00` (got `{}`)",
                self.utc_offset
            ))
        })
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("lashbook.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(bot_token_value) = bot.token {
                self.bot.token = secret_value(bot_token_value);
            }
            if let Some(admin_handles) = bot.admin_handles {
                self.bot.admin_handles = admin_handles;
            }
            if let Some(admin_chat_ids) = bot.admin_chat_ids {
                self.bot.admin_chat_ids = admin_chat_ids;
            }
        }

        if let Some(booking) = patch.booking {
            if let Some(utc_offset) = booking.utc_offset {
                self.booking.utc_offset = utc_offset;
            }
            if let Some(horizon_days) = booking.horizon_days {
                self.booking.horizon_days = horizon_days;
            }
        }

        if let Some(reminders) = patch.reminders {
            if let Some(value) = reminders.sweep_interval_secs {
                self.reminders.sweep_interval_secs = value;
            }
            if let Some(value) = reminders.day_lead_mins {
                self.reminders.day_lead_mins = value;
            }
            if let Some(value) = reminders.day_window_mins {
                self.reminders.day_window_mins = value;
            }
            if let Some(value) = reminders.hour_lead_mins {
                self.reminders.hour_lead_mins = value;
            }
            if let Some(value) = reminders.hour_window_mins {
                self.reminders.hour_window_mins = value;
            }
            if let Some(value) = reminders.past_grace_mins {
                self.reminders.past_grace_mins = value;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LASHBOOK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LASHBOOK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LASHBOOK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LASHBOOK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LASHBOOK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let bot_token = read_env("LASHBOOK_BOT_TOKEN").or_else(|| read_env("BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.bot.token = secret_value(value);
        }
        if let Some(value) = read_env("LASHBOOK_BOT_ADMIN_HANDLES") {
            self.bot.admin_handles = split_list(&value);
        }
        if let Some(value) = read_env("LASHBOOK_BOT_ADMIN_CHAT_IDS") {
            self.bot.admin_chat_ids = split_list(&value);
        }

        if let Some(value) = read_env("LASHBOOK_BOOKING_UTC_OFFSET") {
            self.booking.utc_offset = value;
        }
        if let Some(value) = read_env("LASHBOOK_BOOKING_HORIZON_DAYS") {
            self.booking.horizon_days = parse_u32("LASHBOOK_BOOKING_HORIZON_DAYS", &value)?;
        }

        if let Some(value) = read_env("LASHBOOK_REMINDERS_SWEEP_INTERVAL_SECS") {
            self.reminders.sweep_interval_secs =
                parse_u64("LASHBOOK_REMINDERS_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("LASHBOOK_REMINDERS_DAY_WINDOW_MINS") {
            self.reminders.day_window_mins =
                parse_u64("LASHBOOK_REMINDERS_DAY_WINDOW_MINS", &value)?;
        }
        if let Some(value) = read_env("LASHBOOK_REMINDERS_HOUR_WINDOW_MINS") {
            self.reminders.hour_window_mins =
                parse_u64("LASHBOOK_REMINDERS_HOUR_WINDOW_MINS", &value)?;
        }
        if let Some(value) = read_env("LASHBOOK_REMINDERS_PAST_GRACE_MINS") {
            self.reminders.past_grace_mins =
                parse_u64("LASHBOOK_REMINDERS_PAST_GRACE_MINS", &value)?;
        }

        if let Some(value) = read_env("LASHBOOK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LASHBOOK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("LASHBOOK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("LASHBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LASHBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("LASHBOOK_LOGGING_LEVEL").or_else(|| read_env("LASHBOOK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LASHBOOK_LOGGING_FORMAT").or_else(|| read_env("LASHBOOK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.bot.token = secret_value(bot_token);
        }
        if let Some(admin_handles) = overrides.admin_handles {
            self.bot.admin_handles = admin_handles;
        }
        if let Some(utc_offset) = overrides.utc_offset {
            self.booking.utc_offset = utc_offset;
        }
        if let Some(sweep_interval_secs) = overrides.sweep_interval_secs {
            self.reminders.sweep_interval_secs = sweep_interval_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_bot(&self.bot)?;
        validate_booking(&self.booking)?;
        validate_reminders(&self.reminders)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("lashbook.toml"), PathBuf::from("config/lashbook.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    let token = bot.token.expose_secret();
    if token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "bot.token is required (set LASHBOOK_BOT_TOKEN or BOT_TOKEN)".to_string(),
        ));
    }

    let well_formed = token
        .split_once(':')
        .is_some_and(|(id, secret)| {
            !id.is_empty() && id.chars().all(|ch| ch.is_ascii_digit()) && !secret.is_empty()
        });
    if !well_formed {
        return Err(ConfigError::Validation(
            "bot.token must look like `<numeric bot id>:<secret>`".to_string(),
        ));
    }

    if bot.admin_handles.iter().any(|handle| handle.trim().trim_start_matches('@').is_empty()) {
        return Err(ConfigError::Validation(
            "bot.admin_handles must not contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    booking.zone()?;

    if booking.horizon_days == 0 || booking.horizon_days > 366 {
        return Err(ConfigError::Validation(
            "booking.horizon_days must be in range 1..=366".to_string(),
        ));
    }

    Ok(())
}

fn validate_reminders(reminders: &ReminderConfig) -> Result<(), ConfigError> {
    if reminders.sweep_interval_secs == 0 || reminders.sweep_interval_secs > 300 {
        return Err(ConfigError::Validation(
            "reminders.sweep_interval_secs must be in range 1..=300".to_string(),
        ));
    }

    let week_mins = 7 * 24 * 60;
    let windows = [
        ("day", reminders.day_lead_mins, reminders.day_window_mins),
        ("hour", reminders.hour_lead_mins, reminders.hour_window_mins),
    ];
    for (name, lead, window) in windows {
        if lead == 0 || lead > week_mins {
            return Err(ConfigError::Validation(format!(
                "reminders.{name}_lead_mins must be in range 1..={week_mins}"
            )));
        }
        if window == 0 || window > lead {
            return Err(ConfigError::Validation(format!(
                "reminders.{name}_window_mins must be in range 1..=reminders.{name}_lead_mins"
            )));
        }
        if window * 60 < reminders.sweep_interval_secs {
            return Err(ConfigError::Validation(format!(
                "reminders.{name}_window_mins must be wider than the sweep interval"
            )));
        }
    }

    if reminders.hour_lead_mins >= reminders.day_lead_mins - reminders.day_window_mins {
        return Err(ConfigError::Validation(
            "the hour reminder window must close before the day reminder window opens"
                .to_string(),
        ));
    }

    if reminders.past_grace_mins > week_mins {
        return Err(ConfigError::Validation(format!(
            "reminders.past_grace_mins must be at most {week_mins}"
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    bot: Option<BotPatch>,
    booking: Option<BookingPatch>,
    reminders: Option<ReminderPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    token: Option<String>,
    admin_handles: Option<Vec<String>>,
    admin_chat_ids: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    utc_offset: Option<String>,
    horizon_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ReminderPatch {
    sweep_interval_secs: Option<u64>,
    day_lead_mins: Option<u64>,
    day_window_mins: Option<u64>,
    hour_lead_mins: Option<u64>,
    hour_window_mins: Option<u64>,
    past_grace_mins: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use chrono::FixedOffset;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const TOKEN: &str = "123456:test-secret";

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LASHBOOK_TOKEN", TOKEN);

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("lashbook.toml");
            fs::write(
                &path,
                r#"
[bot]
token = "${TEST_LASHBOOK_TOKEN}"
admin_handles = ["@studio_owner"]
admin_chat_ids = ["1001"]

[booking]
utc_offset = "+03:00"

[reminders]
day_window_mins = 90
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.bot.token.expose_secret() == TOKEN, "token should be interpolated")?;
            ensure(config.bot.admin_handles == ["@studio_owner"], "admin handles from file")?;
            ensure(config.reminders.day_window_mins == 90, "day window from file")?;
            ensure(
                config.booking.zone().ok() == FixedOffset::east_opt(3 * 3600),
                "zone should parse from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_LASHBOOK_TOKEN"]);
        result
    }

    #[test]
    fn legacy_bot_token_variable_is_honoured() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BOT_TOKEN", TOKEN);
        env::set_var("LASHBOOK_LOG_LEVEL", "warn");
        env::set_var("LASHBOOK_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.bot.token.expose_secret() == TOKEN, "legacy BOT_TOKEN should load")?;
            ensure(config.logging.level == "warn", "log level alias should apply")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "log format alias")?;
            Ok(())
        })();

        clear_vars(&["BOT_TOKEN", "LASHBOOK_LOG_LEVEL", "LASHBOOK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LASHBOOK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("LASHBOOK_BOT_TOKEN", "999:from-env");
        env::set_var("LASHBOOK_BOT_ADMIN_HANDLES", "alice, @bob");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("lashbook.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[bot]
token = "111:from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.bot.token.expose_secret() == "999:from-env",
                "env token should win over file and defaults",
            )?;
            ensure(config.bot.admin_handles == ["alice", "@bob"], "env list should be split")?;
            Ok(())
        })();

        clear_vars(&[
            "LASHBOOK_DATABASE_URL",
            "LASHBOOK_BOT_TOKEN",
            "LASHBOOK_BOT_ADMIN_HANDLES",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("not-a-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure but config load succeeded".into()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("bot.token")),
            "validation failure should mention bot.token",
        )
    }

    #[test]
    fn invalid_offset_and_overlapping_windows_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let offset_error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some(TOKEN.to_string()),
                utc_offset: Some("Europe/Kyiv".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        ensure(
            matches!(offset_error, Err(ConfigError::Validation(ref m)) if m.contains("utc_offset")),
            "named zones are not accepted as offsets",
        )?;

        let mut config = AppConfig::default();
        config.bot.token = TOKEN.to_string().into();
        config.reminders.hour_lead_mins = 23 * 60;
        ensure(config.validate().is_err(), "overlapping reminder windows must be rejected")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                bot_token: Some("4242:super-secret-value".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        let debug = format!("{config:?}");

        ensure(!debug.contains("super-secret-value"), "debug output should not contain token")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }
}
