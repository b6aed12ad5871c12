use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub registry: RegistryConfig,
    pub catalog: CatalogConfig,
    pub negotiation: NegotiationConfig,
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
pub struct RegistryConfig {
    pub mode: RegistryMode,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub pitch_limit: u32,
}

/// Thresholds for the rate decision function. All percentages are factors
/// applied to the posted rate (or, for `sweeten_pct`, the carrier offer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiationConfig {
    pub max_rounds: u32,
    pub floor_pct: Decimal,
    pub target_pct: Decimal,
    pub sweeten_pct: Decimal,
    pub anchor_pct: Decimal,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// How carrier verification resolves. The sandbox fallback reproduces the
/// behavior of demo environments where registry outages must not stall
/// test calls; it substitutes canned carrier data and is therefore never
/// the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMode {
    Live,
    Sandbox,
    LiveWithSandboxFallback,
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
    pub registry_mode: Option<RegistryMode>,
    pub registry_base_url: Option<String>,
    pub registry_api_key: Option<String>,
    pub max_rounds: Option<u32>,
    pub log_level: Option<String>,
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
                url: "sqlite://loadline.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            registry: RegistryConfig {
                mode: RegistryMode::Live,
                base_url: "https://mobile.fmcsa.dot.gov/qc/services/carriers".to_string(),
                api_key: None,
                timeout_secs: 10,
            },
            catalog: CatalogConfig { pitch_limit: 5 },
            negotiation: NegotiationConfig::default(),
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            floor_pct: Decimal::new(90, 2),
            target_pct: Decimal::new(95, 2),
            sweeten_pct: Decimal::new(103, 2),
            anchor_pct: Decimal::new(93, 2),
        }
    }
}

impl std::str::FromStr for RegistryMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "sandbox" => Ok(Self::Sandbox),
            "live_with_sandbox_fallback" => Ok(Self::LiveWithSandboxFallback),
            other => Err(ConfigError::Validation(format!(
                "unsupported registry mode `{other}` (expected live|sandbox|live_with_sandbox_fallback)"
            ))),
        }
    }
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
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("loadline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
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

        if let Some(registry) = patch.registry {
            if let Some(mode) = registry.mode {
                self.registry.mode = mode;
            }
            if let Some(base_url) = registry.base_url {
                self.registry.base_url = base_url;
            }
            if let Some(api_key_value) = registry.api_key {
                self.registry.api_key = Some(api_key_value.into());
            }
            if let Some(timeout_secs) = registry.timeout_secs {
                self.registry.timeout_secs = timeout_secs;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(pitch_limit) = catalog.pitch_limit {
                self.catalog.pitch_limit = pitch_limit;
            }
        }

        if let Some(negotiation) = patch.negotiation {
            if let Some(max_rounds) = negotiation.max_rounds {
                self.negotiation.max_rounds = max_rounds;
            }
            if let Some(floor_pct) = negotiation.floor_pct {
                self.negotiation.floor_pct = decimal_from_f64("negotiation.floor_pct", floor_pct)?;
            }
            if let Some(target_pct) = negotiation.target_pct {
                self.negotiation.target_pct =
                    decimal_from_f64("negotiation.target_pct", target_pct)?;
            }
            if let Some(sweeten_pct) = negotiation.sweeten_pct {
                self.negotiation.sweeten_pct =
                    decimal_from_f64("negotiation.sweeten_pct", sweeten_pct)?;
            }
            if let Some(anchor_pct) = negotiation.anchor_pct {
                self.negotiation.anchor_pct =
                    decimal_from_f64("negotiation.anchor_pct", anchor_pct)?;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LOADLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LOADLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("LOADLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LOADLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LOADLINE_REGISTRY_MODE") {
            self.registry.mode = value.parse()?;
        }
        if let Some(value) = read_env("LOADLINE_REGISTRY_BASE_URL") {
            self.registry.base_url = value;
        }
        if let Some(value) = read_env("LOADLINE_REGISTRY_API_KEY") {
            self.registry.api_key = Some(value.into());
        }
        if let Some(value) = read_env("LOADLINE_REGISTRY_TIMEOUT_SECS") {
            self.registry.timeout_secs = parse_u64("LOADLINE_REGISTRY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LOADLINE_CATALOG_PITCH_LIMIT") {
            self.catalog.pitch_limit = parse_u32("LOADLINE_CATALOG_PITCH_LIMIT", &value)?;
        }

        if let Some(value) = read_env("LOADLINE_NEGOTIATION_MAX_ROUNDS") {
            self.negotiation.max_rounds = parse_u32("LOADLINE_NEGOTIATION_MAX_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_NEGOTIATION_FLOOR_PCT") {
            self.negotiation.floor_pct = parse_decimal("LOADLINE_NEGOTIATION_FLOOR_PCT", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_NEGOTIATION_TARGET_PCT") {
            self.negotiation.target_pct = parse_decimal("LOADLINE_NEGOTIATION_TARGET_PCT", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_NEGOTIATION_SWEETEN_PCT") {
            self.negotiation.sweeten_pct =
                parse_decimal("LOADLINE_NEGOTIATION_SWEETEN_PCT", &value)?;
        }
        if let Some(value) = read_env("LOADLINE_NEGOTIATION_ANCHOR_PCT") {
            self.negotiation.anchor_pct = parse_decimal("LOADLINE_NEGOTIATION_ANCHOR_PCT", &value)?;
        }

        if let Some(value) = read_env("LOADLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LOADLINE_SERVER_PORT") {
            self.server.port = parse_u16("LOADLINE_SERVER_PORT", &value)?;
        }

        let log_level = read_env("LOADLINE_LOGGING_LEVEL").or_else(|| read_env("LOADLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LOADLINE_LOGGING_FORMAT").or_else(|| read_env("LOADLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(registry_mode) = overrides.registry_mode {
            self.registry.mode = registry_mode;
        }
        if let Some(registry_base_url) = overrides.registry_base_url {
            self.registry.base_url = registry_base_url;
        }
        if let Some(registry_api_key) = overrides.registry_api_key {
            self.registry.api_key = Some(registry_api_key.into());
        }
        if let Some(max_rounds) = overrides.max_rounds {
            self.negotiation.max_rounds = max_rounds;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_registry(&self.registry)?;
        validate_catalog(&self.catalog)?;
        validate_negotiation(&self.negotiation)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("loadline.toml"), PathBuf::from("config/loadline.toml")]
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

fn validate_registry(registry: &RegistryConfig) -> Result<(), ConfigError> {
    if registry.timeout_secs == 0 || registry.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "registry.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if registry.mode != RegistryMode::Sandbox {
        let base_url = registry.base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "registry.base_url must start with http:// or https:// for live modes".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.pitch_limit == 0 || catalog.pitch_limit > 50 {
        return Err(ConfigError::Validation(
            "catalog.pitch_limit must be in range 1..=50".to_string(),
        ));
    }
    Ok(())
}

fn validate_negotiation(negotiation: &NegotiationConfig) -> Result<(), ConfigError> {
    if negotiation.max_rounds == 0 || negotiation.max_rounds > 10 {
        return Err(ConfigError::Validation(
            "negotiation.max_rounds must be in range 1..=10".to_string(),
        ));
    }

    let one = Decimal::ONE;
    if negotiation.floor_pct <= Decimal::ZERO || negotiation.floor_pct >= one {
        return Err(ConfigError::Validation(
            "negotiation.floor_pct must be between 0 and 1 exclusive".to_string(),
        ));
    }
    if negotiation.target_pct < negotiation.floor_pct || negotiation.target_pct >= one {
        return Err(ConfigError::Validation(
            "negotiation.target_pct must be in range [floor_pct, 1)".to_string(),
        ));
    }
    if negotiation.sweeten_pct < one {
        return Err(ConfigError::Validation(
            "negotiation.sweeten_pct must be at least 1".to_string(),
        ));
    }
    if negotiation.anchor_pct < negotiation.floor_pct || negotiation.anchor_pct >= one {
        return Err(ConfigError::Validation(
            "negotiation.anchor_pct must be in range [floor_pct, 1)".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
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

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn decimal_from_f64(field: &str, value: f64) -> Result<Decimal, ConfigError> {
    Decimal::try_from(value)
        .map_err(|_| ConfigError::Validation(format!("{field} is not a representable number")))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    registry: Option<RegistryPatch>,
    catalog: Option<CatalogPatch>,
    negotiation: Option<NegotiationPatch>,
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
struct RegistryPatch {
    mode: Option<RegistryMode>,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    pitch_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct NegotiationPatch {
    max_rounds: Option<u32>,
    floor_pct: Option<f64>,
    target_pct: Option<f64>,
    sweeten_pct: Option<f64>,
    anchor_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
