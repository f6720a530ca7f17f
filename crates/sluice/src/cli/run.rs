//! Compliance run command handler.

use super::ModelArgs;
use sluice::{
    BatchScheduler, ComplianceRequest, ComplianceService, ConfigError, JsonError,
    OpenAiSettingsBuilder, OpenAiTransport, RuleRegistry, SluiceConfig, SluiceResult,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Run the request in `input` against the OpenAI Responses API.
#[instrument(skip(config, model), fields(input = %input.display()))]
pub async fn run_compliance(
    config: &SluiceConfig,
    input: &Path,
    output: Option<&Path>,
    model: &ModelArgs,
) -> SluiceResult<()> {
    let raw = std::fs::read_to_string(input)
        .map_err(|e| ConfigError::new(format!("Failed to read {}: {}", input.display(), e)))?;
    let request: ComplianceRequest = serde_json::from_str(&raw)
        .map_err(|e| JsonError::new(format!("Invalid compliance request: {}", e)))?;

    let mut settings = OpenAiSettingsBuilder::default();
    settings.model(model.model.clone());
    if let Some(base_url) = &model.base_url {
        settings.base_url(base_url.clone());
    }
    if let Some(max_output_tokens) = model.max_output_tokens {
        settings.max_output_tokens(max_output_tokens);
    }
    let settings = settings
        .build()
        .map_err(|e| ConfigError::new(format!("Invalid model settings: {}", e)))?;

    let transport = Arc::new(OpenAiTransport::new(settings)?);
    let service = ComplianceService::new(
        RuleRegistry::with_defaults(),
        BatchScheduler::new(transport, config),
    );

    let report = service.check(&request).await?;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| JsonError::new(format!("Failed to serialize report: {}", e)))?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| ConfigError::new(format!("Failed to write {}: {}", path.display(), e)))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
