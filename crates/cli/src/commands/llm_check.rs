use pricepromo_agent::llm::{CompletionRequest, LlmClient, OpenAiClient};
use pricepromo_core::config::{AppConfig, LoadOptions};

use crate::commands::CommandResult;

const COMMAND: &str = "llm-check";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    run_with_config(&config)
}

pub fn run_with_config(config: &AppConfig) -> CommandResult {
    let client = match OpenAiClient::from_config(&config.llm) {
        Ok(Some(client)) => client,
        Ok(None) => {
            return CommandResult::failure(
                COMMAND,
                "llm_unconfigured",
                "no LLM credential configured; set PRICEPROMO_LLM_API_KEY or OPENAI_API_KEY",
                4,
            );
        }
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "llm_client",
                error.redacted(config.llm.credential()),
                5,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let request = CompletionRequest::probe(config.llm.model.clone());
    match runtime.block_on(client.complete(&request)) {
        Ok(reply) => CommandResult::success(
            COMMAND,
            format!("model {} answered: {reply}", config.llm.model),
        ),
        Err(error) => CommandResult::failure(
            COMMAND,
            "llm_request",
            error.redacted(Some(client.api_key())),
            5,
        ),
    }
}
