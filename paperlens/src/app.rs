use std::sync::Arc;

use crate::config::Settings;
use crate::parser::pdf::TextExtractor;
use crate::rag::RagService;

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub settings: Settings,
    pub extractor: Arc<dyn TextExtractor>,
    pub rag: RagService,
}
