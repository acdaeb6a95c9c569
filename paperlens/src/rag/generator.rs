use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::completion::{CompletionError, CompletionModel, CompletionParams, Message};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to generate answer with {model}: {source}")]
    Primary {
        model: String,
        #[source]
        source: CompletionError,
    },
    #[error(
        "Failed to generate answer: {model} failed ({primary}); fallback {fallback_model} failed ({fallback})"
    )]
    Exhausted {
        model: String,
        primary: CompletionError,
        fallback_model: String,
        fallback: CompletionError,
    },
}

/// Calls the primary model and, on any failure, retries exactly once
/// against the fallback model with the same messages and parameters.
#[derive(Clone)]
pub struct Generator {
    primary: Arc<dyn CompletionModel>,
    fallback: Option<Arc<dyn CompletionModel>>,
    params: CompletionParams,
}

impl Generator {
    pub fn new(
        primary: Arc<dyn CompletionModel>,
        fallback: Option<Arc<dyn CompletionModel>>,
        params: CompletionParams,
    ) -> Self {
        Self {
            primary,
            fallback,
            params,
        }
    }

    pub async fn generate(&self, messages: &[Message]) -> Result<String, GenerationError> {
        let model = self.primary.model_name().to_string();
        info!("Calling completion model {model}");

        let primary_err = match self.primary.complete(messages, &self.params).await {
            Ok(result) => {
                info!("Generated answer with {model}");
                return Ok(result.content);
            }
            Err(e) => e,
        };

        let fallback = match &self.fallback {
            Some(fallback) if fallback.model_name() != model => fallback,
            _ => {
                error!("Completion model {model} failed: {primary_err}");
                return Err(GenerationError::Primary {
                    model,
                    source: primary_err,
                });
            }
        };

        let fallback_model = fallback.model_name().to_string();
        warn!("Completion model {model} failed ({primary_err}), trying fallback {fallback_model}");

        match fallback.complete(messages, &self.params).await {
            Ok(result) => {
                info!("Generated answer with fallback {fallback_model}");
                Ok(result.content)
            }
            Err(fallback_err) => {
                error!("Fallback model {fallback_model} also failed: {fallback_err}");
                Err(GenerationError::Exhausted {
                    model,
                    primary: primary_err,
                    fallback_model,
                    fallback: fallback_err,
                })
            }
        }
    }
}
