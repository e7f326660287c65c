use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pricepromo_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_key = match config.llm.api_key.as_ref() {
        Some(key) => redact_key(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    let entries = [
        (
            "llm.api_key",
            api_key,
            source("llm.api_key", &["PRICEPROMO_LLM_API_KEY", "OPENAI_API_KEY"]),
        ),
        (
            "llm.base_url",
            config.llm.base_url.clone(),
            source("llm.base_url", &["PRICEPROMO_LLM_BASE_URL"]),
        ),
        (
            "llm.model",
            config.llm.model.clone(),
            source("llm.model", &["PRICEPROMO_LLM_MODEL", "OPENAI_MODEL"]),
        ),
        (
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            source("llm.timeout_secs", &["PRICEPROMO_LLM_TIMEOUT_SECS"]),
        ),
        (
            "llm.max_tokens",
            config.llm.max_tokens.to_string(),
            source("llm.max_tokens", &["PRICEPROMO_LLM_MAX_TOKENS"]),
        ),
        (
            "pipeline.reference_date",
            config.pipeline.reference_date.to_string(),
            source("pipeline.reference_date", &["PRICEPROMO_PIPELINE_REFERENCE_DATE"]),
        ),
        (
            "pipeline.default_region",
            config.pipeline.default_region.clone(),
            source("pipeline.default_region", &["PRICEPROMO_PIPELINE_DEFAULT_REGION"]),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            source("server.bind_address", &["PRICEPROMO_SERVER_BIND_ADDRESS"]),
        ),
        (
            "server.port",
            config.server.port.to_string(),
            source("server.port", &["PRICEPROMO_SERVER_PORT", "PORT"]),
        ),
        (
            "server.max_upload_bytes",
            config.server.max_upload_bytes.to_string(),
            source("server.max_upload_bytes", &["PRICEPROMO_SERVER_MAX_UPLOAD_BYTES"]),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            source("logging.level", &["PRICEPROMO_LOGGING_LEVEL", "PRICEPROMO_LOG_LEVEL"]),
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            source("logging.format", &["PRICEPROMO_LOGGING_FORMAT", "PRICEPROMO_LOG_FORMAT"]),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.iter().map(|(key, value, source)| render_line(key, value, source)));
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("pricepromo.toml"), PathBuf::from("config/pricepromo.toml")]
        .into_iter()
        .find(|path| path.exists())
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

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognisable `sk-` style prefix, never any key material.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
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
    use super::{contains_path, redact_key};

    #[test]
    fn keys_are_redacted_to_their_prefix() {
        assert_eq!(redact_key("sk-abc123"), "sk-***");
        assert_eq!(redact_key("abc123"), "<redacted>");
        assert_eq!(redact_key("  "), "<empty>");
    }

    #[test]
    fn dotted_paths_are_found_in_toml_documents() {
        let doc: toml::Value = "[pipeline]\ndefault_region = \"US\"\n".parse().unwrap();

        assert!(contains_path(&doc, "pipeline.default_region"));
        assert!(!contains_path(&doc, "pipeline.reference_date"));
    }
}
