use std::time::Duration;

use tracing::{debug, info, warn};

use crate::document::HostDocument;
use crate::error::{GenerateError, Result};
use crate::executor::{RequestExecutor, Transport};
use crate::merge::{MergeOptions, MergeResult, Placement, merge};
use crate::prompt::compose;
use crate::provider::{ProviderAdapter, ProviderConfig, adapter_for};
use crate::request::GenerationRequest;
use crate::sanitize::{repair, sanitize};
use crate::store::{HistoryEntry, HistoryLog, KeyValueStore};

pub const MAX_VARIATIONS: usize = 4;
pub const MIN_INTENT_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub placement: Placement,
    pub group: bool,
    pub group_name: Option<String>,
    pub variations: usize,
    pub retries: u32,
    pub timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            placement: Placement::Center,
            group: true,
            group_name: None,
            variations: 1,
            retries: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
pub struct VariationOutcome {
    pub index: usize,
    pub result: Result<MergeResult>,
}

#[derive(Debug)]
pub struct RunReport {
    pub model: String,
    pub outcomes: Vec<VariationOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &MergeResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &GenerateError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|err| (o.index, err)))
    }

    pub fn all_failed(&self) -> bool {
        self.succeeded().next().is_none()
    }
}

pub struct Pipeline<'a> {
    config: ProviderConfig,
    options: PipelineOptions,
    transport: &'a dyn Transport,
    adapter: Box<dyn ProviderAdapter>,
    history: Option<HistoryLog<Box<dyn KeyValueStore + 'a>>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: ProviderConfig, options: PipelineOptions, transport: &'a dyn Transport) -> Self {
        let adapter = adapter_for(config.kind);
        Self {
            config,
            options,
            transport,
            adapter,
            history: None,
        }
    }

    pub fn with_history(mut self, history: HistoryLog<Box<dyn KeyValueStore + 'a>>) -> Self {
        self.history = Some(history);
        self
    }

    /// The model name actually sent, after falling back from foreign names.
    pub fn model(&self) -> String {
        self.adapter.resolve_model(&self.config.model)
    }

    /// Generate every requested variation into `host`.
    ///
    /// Configuration and validation problems abort before any network traffic.
    /// Past that point each variation fails on its own and earlier merges stay in place.
    pub fn run(&self, host: &mut dyn HostDocument, request: &GenerationRequest) -> Result<RunReport> {
        self.config.validate()?;
        if request.intent.trim().chars().count() < MIN_INTENT_CHARS {
            return Err(GenerateError::Validation(format!(
                "please enter a description of at least {MIN_INTENT_CHARS} characters"
            )));
        }

        let count = self.options.variations.clamp(1, MAX_VARIATIONS);
        if count != self.options.variations {
            debug!(requested = self.options.variations, count, "clamped variation count");
        }
        let model = self.model();
        info!(provider = self.config.kind.id(), model = %model, count, "generating SVG");

        let mut outcomes = Vec::with_capacity(count);
        for index in 0..count {
            let variation = request.for_variation(index, count);
            let result = self.run_variation(host, &variation, &model);
            match &result {
                Ok(merged) => debug!(variation = index + 1, ids = ?merged.node_ids, "variation merged"),
                Err(err) => warn!(variation = index + 1, error = %err, "variation failed"),
            }
            outcomes.push(VariationOutcome { index, result });
        }

        let report = RunReport { model, outcomes };
        if !report.all_failed() {
            self.record_history(request, &report.model);
        }
        Ok(report)
    }

    fn run_variation(
        &self,
        host: &mut dyn HostDocument,
        request: &GenerationRequest,
        model: &str,
    ) -> Result<MergeResult> {
        let prompt = compose(request);
        let executor = RequestExecutor::new(self.transport, self.adapter.as_ref());
        let reply = executor.execute(&prompt, &self.config, self.options.retries, self.options.timeout)?;
        let fragment = repair(&sanitize(&reply), request.width, request.height);

        let options = MergeOptions {
            placement: self.options.placement,
            width: request.width,
            height: request.height,
            variation: request.variation,
            group: self.options.group,
            group_name: self.options.group_name.clone(),
            accessibility: request.accessibility,
            intent: request.intent.clone(),
            provenance: format!("Generated by {} ({model})", self.config.kind.display_name()),
        };
        merge(&fragment, host, &options)
    }

    fn record_history(&self, request: &GenerationRequest, model: &str) {
        let Some(history) = &self.history else {
            return;
        };
        let mut entry = HistoryEntry::now(
            request.intent.trim(),
            request.width,
            request.height,
            self.config.kind.id(),
            model,
        );
        entry.style = request.style.as_str().to_string();
        entry.colors = request.colors.as_str().to_string();
        if let Err(err) = history.append(entry) {
            warn!(error = %err, "could not update prompt history");
        }
    }
}
