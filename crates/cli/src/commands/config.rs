use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use loadline_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line("database.url", &config.database.url, source("database.url", "LOADLINE_DATABASE_URL")));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "LOADLINE_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "LOADLINE_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "registry.mode",
        &format!("{:?}", config.registry.mode),
        source("registry.mode", "LOADLINE_REGISTRY_MODE"),
    ));
    lines.push(render_line(
        "registry.base_url",
        &config.registry.base_url,
        source("registry.base_url", "LOADLINE_REGISTRY_BASE_URL"),
    ));
    let api_key = if config.registry.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "registry.api_key",
        api_key,
        source("registry.api_key", "LOADLINE_REGISTRY_API_KEY"),
    ));
    lines.push(render_line(
        "registry.timeout_secs",
        &config.registry.timeout_secs.to_string(),
        source("registry.timeout_secs", "LOADLINE_REGISTRY_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "catalog.pitch_limit",
        &config.catalog.pitch_limit.to_string(),
        source("catalog.pitch_limit", "LOADLINE_CATALOG_PITCH_LIMIT"),
    ));

    lines.push(render_line(
        "negotiation.max_rounds",
        &config.negotiation.max_rounds.to_string(),
        source("negotiation.max_rounds", "LOADLINE_NEGOTIATION_MAX_ROUNDS"),
    ));
    lines.push(render_line(
        "negotiation.floor_pct",
        &config.negotiation.floor_pct.to_string(),
        source("negotiation.floor_pct", "LOADLINE_NEGOTIATION_FLOOR_PCT"),
    ));
    lines.push(render_line(
        "negotiation.target_pct",
        &config.negotiation.target_pct.to_string(),
        source("negotiation.target_pct", "LOADLINE_NEGOTIATION_TARGET_PCT"),
    ));
    lines.push(render_line(
        "negotiation.sweeten_pct",
        &config.negotiation.sweeten_pct.to_string(),
        source("negotiation.sweeten_pct", "LOADLINE_NEGOTIATION_SWEETEN_PCT"),
    ));
    lines.push(render_line(
        "negotiation.anchor_pct",
        &config.negotiation.anchor_pct.to_string(),
        source("negotiation.anchor_pct", "LOADLINE_NEGOTIATION_ANCHOR_PCT"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "LOADLINE_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "LOADLINE_SERVER_PORT"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "LOADLINE_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "LOADLINE_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("loadline.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/loadline.toml");
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
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
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
