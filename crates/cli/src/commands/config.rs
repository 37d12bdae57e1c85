use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use lashbook_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let bot_token = redact_token(config.bot.token.expose_secret());
    let bot_token_source = if env::var_os("LASHBOOK_BOT_TOKEN").is_none()
        && env::var_os("BOT_TOKEN").is_some()
    {
        "env (BOT_TOKEN)".to_string()
    } else {
        source("bot.token", "LASHBOOK_BOT_TOKEN")
    };

    let entries = [
        (
            "database.url",
            config.database.url.clone(),
            source("database.url", "LASHBOOK_DATABASE_URL"),
        ),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            source("database.max_connections", "LASHBOOK_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            source("database.timeout_secs", "LASHBOOK_DATABASE_TIMEOUT_SECS"),
        ),
        ("bot.token", bot_token, bot_token_source),
        (
            "bot.admin_handles",
            config.bot.admin_handles.join(","),
            source("bot.admin_handles", "LASHBOOK_BOT_ADMIN_HANDLES"),
        ),
        (
            "bot.admin_chat_ids",
            config.bot.admin_chat_ids.join(","),
            source("bot.admin_chat_ids", "LASHBOOK_BOT_ADMIN_CHAT_IDS"),
        ),
        (
            "booking.utc_offset",
            config.booking.utc_offset.clone(),
            source("booking.utc_offset", "LASHBOOK_BOOKING_UTC_OFFSET"),
        ),
        (
            "booking.horizon_days",
            config.booking.horizon_days.to_string(),
            source("booking.horizon_days", "LASHBOOK_BOOKING_HORIZON_DAYS"),
        ),
        (
            "reminders.sweep_interval_secs",
            config.reminders.sweep_interval_secs.to_string(),
            source("reminders.sweep_interval_secs", "LASHBOOK_REMINDERS_SWEEP_INTERVAL_SECS"),
        ),
        (
            "reminders.day_window_mins",
            config.reminders.day_window_mins.to_string(),
            source("reminders.day_window_mins", "LASHBOOK_REMINDERS_DAY_WINDOW_MINS"),
        ),
        (
            "reminders.hour_window_mins",
            config.reminders.hour_window_mins.to_string(),
            source("reminders.hour_window_mins", "LASHBOOK_REMINDERS_HOUR_WINDOW_MINS"),
        ),
        (
            "reminders.past_grace_mins",
            config.reminders.past_grace_mins.to_string(),
            source("reminders.past_grace_mins", "LASHBOOK_REMINDERS_PAST_GRACE_MINS"),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            source("server.bind_address", "LASHBOOK_SERVER_BIND_ADDRESS"),
        ),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            source("server.health_check_port", "LASHBOOK_SERVER_HEALTH_CHECK_PORT"),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", "LASHBOOK_LOGGING_LEVEL"),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", "LASHBOOK_LOGGING_FORMAT"),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|(key, value, source)| render_line(key, &value, source)));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("lashbook.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/lashbook.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}
