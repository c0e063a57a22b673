use std::sync::Arc;

use crate::credits::CreditLedger;
use crate::outline::OutlineWorkflow;
use crate::provider::TextGenerator;
use crate::rate_limit::Limiters;

// app's shared state, built once in main and handed to every handler
pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
    pub limiters: Limiters,
    pub credits: CreditLedger,
    pub model: String,
    pub title_model: String,
}

impl AppState {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        limiters: Limiters,
        model: impl Into<String>,
        title_model: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            limiters,
            credits: CreditLedger::new(),
            model: model.into(),
            title_model: title_model.into(),
        }
    }

    pub fn outline_workflow(&self) -> OutlineWorkflow {
        OutlineWorkflow::new(self.generator.clone()).with_model(self.model.clone())
    }
}
