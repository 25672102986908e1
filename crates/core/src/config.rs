use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub payroll: PayrollConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub provider: AgentProvider,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct PayrollConfig {
    pub computation: ComputationMode,
    pub service_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_recompute_attempts: u32,
    pub seed_roster: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentProvider {
    /// Deterministic in-process analyst.
    Offline,
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationMode {
    Local,
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl AgentProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Http => "http",
        }
    }
}

impl ComputationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Http => "http",
        }
    }
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl AgentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PayrollConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub agent_provider: Option<AgentProvider>,
    pub agent_model: Option<String>,
    pub payroll_computation: Option<ComputationMode>,
    pub payroll_service_url: Option<String>,
    pub seed_roster: Option<bool>,
    pub server_port: Option<u16>,
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
            agent: AgentConfig {
                provider: AgentProvider::Offline,
                base_url: None,
                api_key: None,
                model: "payroll-analyst".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            payroll: PayrollConfig {
                computation: ComputationMode::Local,
                service_url: None,
                api_key: None,
                timeout_secs: 30,
                max_retries: 2,
                max_recompute_attempts: 4,
                seed_roster: true,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for AgentProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(Self::Offline),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Validation(format!(
                "unsupported agent provider `{other}` (expected offline|http)"
            ))),
        }
    }
}

impl std::str::FromStr for ComputationMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Validation(format!(
                "unsupported payroll computation `{other}` (expected local|http)"
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
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("paydesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(agent) = patch.agent {
            if let Some(provider) = agent.provider {
                self.agent.provider = provider;
            }
            if let Some(base_url) = agent.base_url {
                self.agent.base_url = Some(base_url);
            }
            if let Some(agent_api_key) = agent.api_key {
                self.agent.api_key = Some(secret_value(agent_api_key));
            }
            if let Some(model) = agent.model {
                self.agent.model = model;
            }
            if let Some(timeout_secs) = agent.timeout_secs {
                self.agent.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = agent.max_retries {
                self.agent.max_retries = max_retries;
            }
        }

        if let Some(payroll) = patch.payroll {
            if let Some(computation) = payroll.computation {
                self.payroll.computation = computation;
            }
            if let Some(service_url) = payroll.service_url {
                self.payroll.service_url = Some(service_url);
            }
            if let Some(payroll_api_key) = payroll.api_key {
                self.payroll.api_key = Some(secret_value(payroll_api_key));
            }
            if let Some(timeout_secs) = payroll.timeout_secs {
                self.payroll.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = payroll.max_retries {
                self.payroll.max_retries = max_retries;
            }
            if let Some(max_recompute_attempts) = payroll.max_recompute_attempts {
                self.payroll.max_recompute_attempts = max_recompute_attempts;
            }
            if let Some(seed_roster) = payroll.seed_roster {
                self.payroll.seed_roster = seed_roster;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("PAYDESK_AGENT_PROVIDER") {
            self.agent.provider = value.parse()?;
        }
        if let Some(value) = read_env("PAYDESK_AGENT_BASE_URL") {
            self.agent.base_url = Some(value);
        }
        if let Some(value) = read_env("PAYDESK_AGENT_API_KEY") {
            self.agent.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PAYDESK_AGENT_MODEL") {
            self.agent.model = value;
        }
        if let Some(value) = read_env("PAYDESK_AGENT_TIMEOUT_SECS") {
            self.agent.timeout_secs = parse_u64("PAYDESK_AGENT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PAYDESK_AGENT_MAX_RETRIES") {
            self.agent.max_retries = parse_u32("PAYDESK_AGENT_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PAYDESK_PAYROLL_COMPUTATION") {
            self.payroll.computation = value.parse()?;
        }
        if let Some(value) = read_env("PAYDESK_PAYROLL_SERVICE_URL") {
            self.payroll.service_url = Some(value);
        }
        if let Some(value) = read_env("PAYDESK_PAYROLL_API_KEY") {
            self.payroll.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PAYDESK_PAYROLL_TIMEOUT_SECS") {
            self.payroll.timeout_secs = parse_u64("PAYDESK_PAYROLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PAYDESK_PAYROLL_MAX_RETRIES") {
            self.payroll.max_retries = parse_u32("PAYDESK_PAYROLL_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("PAYDESK_PAYROLL_MAX_RECOMPUTE_ATTEMPTS") {
            self.payroll.max_recompute_attempts =
                parse_u32("PAYDESK_PAYROLL_MAX_RECOMPUTE_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("PAYDESK_PAYROLL_SEED_ROSTER") {
            self.payroll.seed_roster = parse_bool("PAYDESK_PAYROLL_SEED_ROSTER", &value)?;
        }

        if let Some(value) = read_env("PAYDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PAYDESK_SERVER_PORT") {
            self.server.port = parse_u16("PAYDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PAYDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PAYDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("PAYDESK_LOGGING_LEVEL").or_else(|| read_env("PAYDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PAYDESK_LOGGING_FORMAT").or_else(|| read_env("PAYDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(provider) = overrides.agent_provider {
            self.agent.provider = provider;
        }
        if let Some(model) = overrides.agent_model {
            self.agent.model = model;
        }
        if let Some(computation) = overrides.payroll_computation {
            self.payroll.computation = computation;
        }
        if let Some(service_url) = overrides.payroll_service_url {
            self.payroll.service_url = Some(service_url);
        }
        if let Some(seed_roster) = overrides.seed_roster {
            self.payroll.seed_roster = seed_roster;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_agent(&self.agent)?;
        validate_payroll(&self.payroll)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("paydesk.toml"), PathBuf::from("config/paydesk.toml")]
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

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.timeout_secs == 0 || agent.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "agent.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if agent.provider == AgentProvider::Http {
        let base_url = agent.base_url.as_deref().map(str::trim).unwrap_or_default();
        if base_url.is_empty() {
            return Err(ConfigError::Validation(
                "agent.base_url is required for the http agent provider".to_string(),
            ));
        }
        validate_http_url("agent.base_url", base_url)?;

        let missing_key =
            agent.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "agent.api_key is required for the http agent provider".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_payroll(payroll: &PayrollConfig) -> Result<(), ConfigError> {
    if payroll.timeout_secs == 0 || payroll.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "payroll.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if payroll.max_recompute_attempts == 0 {
        return Err(ConfigError::Validation(
            "payroll.max_recompute_attempts must be greater than zero".to_string(),
        ));
    }

    if payroll.computation == ComputationMode::Http {
        let service_url = payroll.service_url.as_deref().map(str::trim).unwrap_or_default();
        if service_url.is_empty() {
            return Err(ConfigError::Validation(
                "payroll.service_url is required when payroll.computation = http".to_string(),
            ));
        }
        validate_http_url("payroll.service_url", service_url)?;
    }

    Ok(())
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
        ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    agent: Option<AgentPatch>,
    payroll: Option<PayrollPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    provider: Option<AgentProvider>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PayrollPatch {
    computation: Option<ComputationMode>,
    service_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    max_recompute_attempts: Option<u32>,
    seed_roster: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
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

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AgentProvider, AppConfig, ComputationMode, ConfigError, ConfigOverrides, LoadOptions,
        LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

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
    fn defaults_run_fully_offline() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.agent.provider == AgentProvider::Offline, "default agent is offline")?;
        ensure(config.payroll.computation == ComputationMode::Local, "default computation is local")?;
        ensure(config.payroll.seed_roster, "demo roster is seeded by default")?;
        ensure(config.server.port == 8080, "default port is 8080")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PAYDESK_AGENT_KEY", "agent-key-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("paydesk.toml");
            fs::write(
                &path,
                r#"
[agent]
provider = "http"
base_url = "https://agent.internal/v1/turns"
api_key = "${TEST_PAYDESK_AGENT_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.agent.provider == AgentProvider::Http, "provider should come from file")?;
            ensure(
                config.agent.api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("agent-key-from-env".to_string()),
                "api key should be interpolated from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PAYDESK_AGENT_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("paydesk.toml");
        fs::write(&path, "[payroll]\nservice_url = \"${PAYDESK_TEST_UNSET_URL}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "PAYDESK_TEST_UNSET_URL"),
            "missing variable should be named",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAYDESK_LOG_LEVEL", "warn");
        env::set_var("PAYDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["PAYDESK_LOG_LEVEL", "PAYDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAYDESK_PAYROLL_SERVICE_URL", "http://from-env:9000/payroll");
        env::set_var("PAYDESK_PAYROLL_MAX_RECOMPUTE_ATTEMPTS", "6");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("paydesk.toml");
            fs::write(
                &path,
                r#"
[payroll]
computation = "http"
service_url = "http://from-file:9000/payroll"
max_recompute_attempts = 2
seed_roster = true

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    seed_roster: Some(false),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.payroll.computation == ComputationMode::Http, "file computation mode")?;
            ensure(
                config.payroll.service_url.as_deref() == Some("http://from-env:9000/payroll"),
                "env service url should win over file",
            )?;
            ensure(config.payroll.max_recompute_attempts == 6, "env attempts should win over file")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(!config.payroll.seed_roster, "override should disable the seed roster")?;
            Ok(())
        })();

        clear_vars(&["PAYDESK_PAYROLL_SERVICE_URL", "PAYDESK_PAYROLL_MAX_RECOMPUTE_ATTEMPTS"]);
        result
    }

    #[test]
    fn http_computation_requires_service_url() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAYDESK_PAYROLL_COMPUTATION", "http");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("payroll.service_url")),
                "validation failure should mention payroll.service_url",
            )
        })();

        clear_vars(&["PAYDESK_PAYROLL_COMPUTATION"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAYDESK_SERVER_PORT", "eighty");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PAYDESK_SERVER_PORT"),
                "invalid port should name the env key",
            )
        })();

        clear_vars(&["PAYDESK_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAYDESK_AGENT_PROVIDER", "http");
        env::set_var("PAYDESK_AGENT_BASE_URL", "https://agent.internal/v1/turns");
        env::set_var("PAYDESK_AGENT_API_KEY", "agent-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("agent-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PAYDESK_AGENT_PROVIDER", "PAYDESK_AGENT_BASE_URL", "PAYDESK_AGENT_API_KEY"]);
        result
    }
}
