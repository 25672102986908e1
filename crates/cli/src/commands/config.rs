use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use paydesk_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field<'a> {
    key_path: &'static str,
    value: String,
    env_keys: &'a [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field<'static>> {
    let agent = &config.agent;
    let payroll = &config.payroll;
    let server = &config.server;
    let logging = &config.logging;

    vec![
        Field {
            key_path: "agent.provider",
            value: agent.provider.as_str().to_string(),
            env_keys: &["PAYDESK_AGENT_PROVIDER"],
        },
        Field {
            key_path: "agent.base_url",
            value: agent.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["PAYDESK_AGENT_BASE_URL"],
        },
        Field {
            key_path: "agent.api_key",
            value: redact_secret(agent.api_key.as_ref()),
            env_keys: &["PAYDESK_AGENT_API_KEY"],
        },
        Field {
            key_path: "agent.model",
            value: agent.model.clone(),
            env_keys: &["PAYDESK_AGENT_MODEL"],
        },
        Field {
            key_path: "agent.timeout_secs",
            value: agent.timeout_secs.to_string(),
            env_keys: &["PAYDESK_AGENT_TIMEOUT_SECS"],
        },
        Field {
            key_path: "agent.max_retries",
            value: agent.max_retries.to_string(),
            env_keys: &["PAYDESK_AGENT_MAX_RETRIES"],
        },
        Field {
            key_path: "payroll.computation",
            value: payroll.computation.as_str().to_string(),
            env_keys: &["PAYDESK_PAYROLL_COMPUTATION"],
        },
        Field {
            key_path: "payroll.service_url",
            value: payroll.service_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["PAYDESK_PAYROLL_SERVICE_URL"],
        },
        Field {
            key_path: "payroll.api_key",
            value: redact_secret(payroll.api_key.as_ref()),
            env_keys: &["PAYDESK_PAYROLL_API_KEY"],
        },
        Field {
            key_path: "payroll.timeout_secs",
            value: payroll.timeout_secs.to_string(),
            env_keys: &["PAYDESK_PAYROLL_TIMEOUT_SECS"],
        },
        Field {
            key_path: "payroll.max_retries",
            value: payroll.max_retries.to_string(),
            env_keys: &["PAYDESK_PAYROLL_MAX_RETRIES"],
        },
        Field {
            key_path: "payroll.max_recompute_attempts",
            value: payroll.max_recompute_attempts.to_string(),
            env_keys: &["PAYDESK_PAYROLL_MAX_RECOMPUTE_ATTEMPTS"],
        },
        Field {
            key_path: "payroll.seed_roster",
            value: payroll.seed_roster.to_string(),
            env_keys: &["PAYDESK_PAYROLL_SEED_ROSTER"],
        },
        Field {
            key_path: "server.bind_address",
            value: server.bind_address.clone(),
            env_keys: &["PAYDESK_SERVER_BIND_ADDRESS"],
        },
        Field {
            key_path: "server.port",
            value: server.port.to_string(),
            env_keys: &["PAYDESK_SERVER_PORT"],
        },
        Field {
            key_path: "server.graceful_shutdown_secs",
            value: server.graceful_shutdown_secs.to_string(),
            env_keys: &["PAYDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key_path: "logging.level",
            value: logging.level.clone(),
            env_keys: &["PAYDESK_LOGGING_LEVEL", "PAYDESK_LOG_LEVEL"],
        },
        Field {
            key_path: "logging.format",
            value: logging.format.as_str().to_string(),
            env_keys: &["PAYDESK_LOGGING_FORMAT", "PAYDESK_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("paydesk.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/paydesk.toml");
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
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };

    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::redact_secret;

    #[test]
    fn redaction_keeps_only_the_key_prefix() {
        let prefixed = SecretString::from("sk-live-abc123".to_string());
        assert_eq!(redact_secret(Some(&prefixed)), "sk-***");

        let opaque = SecretString::from("abc123".to_string());
        assert_eq!(redact_secret(Some(&opaque)), "<redacted>");
        assert_eq!(redact_secret(None), "<unset>");
    }
}
