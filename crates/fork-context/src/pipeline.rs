//! The [`ForkPipeline`] facade tying the stages together.

use tracing::{debug, info};

use crate::config::ForkContextConfig;
use crate::context::{ProcessingStats, detect_boundary, enforce_budget, truncate_tool_results};
use crate::preamble::build_preamble;
use crate::Message;

/// Prepares bounded context for a forked child session.
///
/// Construction validates the configuration once; every later call is total
/// and cannot fail.
#[derive(Debug, Clone)]
pub struct ForkPipeline {
    config: ForkContextConfig,
}

impl ForkPipeline {
    /// Create a pipeline, rejecting inconsistent configuration.
    pub fn new(config: ForkContextConfig) -> Result<Self, String> {
        config
            .validate()
            .map_err(|e| format!("invalid fork context config: {e}"))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ForkContextConfig {
        &self.config
    }

    /// Slice at the latest compaction boundary and truncate tool results.
    pub fn process_for_fork(&self, mut messages: Vec<Message>) -> (Vec<Message>, ProcessingStats) {
        let mut stats = ProcessingStats::new(messages.len());

        if let Some(idx) = detect_boundary(&messages) {
            stats.compaction_detected = true;
            stats.compaction_slice_index = Some(idx);
            messages.drain(..idx);
            debug!("dropped {idx} message(s) before compaction summary");
        }

        truncate_tool_results(messages, stats, &self.config)
    }

    /// Render processed messages into the context block, evicting the
    /// oldest messages if the result exceeds the character budget.
    pub fn render_context(
        &self,
        messages: &[Message],
        stats: ProcessingStats,
    ) -> (String, ProcessingStats) {
        enforce_budget(messages, stats, &self.config)
    }

    /// Run the full pipeline.
    pub fn prepare(&self, messages: Vec<Message>) -> ForkContext {
        let (processed, stats) = self.process_for_fork(messages);
        let (text, stats) = self.render_context(&processed, stats);
        info!("{}", stats.to_log_string());
        ForkContext {
            text,
            stats,
            char_budget: self.config.char_budget,
        }
    }
}

/// Rendered context plus the statistics describing how it was built.
#[derive(Debug, Clone)]
pub struct ForkContext {
    pub text: String,
    pub stats: ProcessingStats,
    /// Budget the context was rendered against.
    pub char_budget: usize,
}

impl ForkContext {
    /// Summary of how the context was reduced.
    pub fn preamble(&self) -> String {
        build_preamble(&self.stats, self.char_budget)
    }

    /// Preamble followed by the context block, ready to inject into the
    /// child session. Empty when there was no history.
    pub fn to_injection(&self) -> String {
        if self.text.is_empty() {
            return String::new();
        }
        format!("{}\n\n{}", self.preamble(), self.text)
    }
}
