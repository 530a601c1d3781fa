//! Driving a single run from launch to its final render

use futures::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::publisher::Publisher;
use crate::opencode::{RunCompletion, RunHandle, RunSignal};
use crate::render::{
    enforce_block_limit, error_banner, exit_code_banner, Accumulator, Block, RenderLimits,
};
use crate::render::split::clip;

/// Stderr lines kept for the exit-code banner
const DIAGNOSTIC_TAIL: usize = 5;

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunCompletion),
    /// The run could not be started or its stream broke
    Failed(String),
}

impl RunOutcome {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            RunOutcome::Completed(done) => done.session_id.as_deref(),
            RunOutcome::Failed(_) => None,
        }
    }
}

/// Signals absorbed from one run so far
struct Progress {
    accumulator: Accumulator,
    diagnostics: VecDeque<String>,
}

impl Progress {
    fn new(limits: RenderLimits) -> Self {
        Self {
            accumulator: Accumulator::new(limits),
            diagnostics: VecDeque::with_capacity(DIAGNOSTIC_TAIL),
        }
    }

    /// Fold one stream item in; `Some` once the run is over
    fn absorb(&mut self, signal: Option<RunSignal>) -> Option<RunOutcome> {
        match signal {
            Some(RunSignal::Event(event)) => {
                self.accumulator.push(event);
                None
            }
            Some(RunSignal::Diagnostic(line)) => {
                tracing::debug!(stderr = %line);
                if self.diagnostics.len() == DIAGNOSTIC_TAIL {
                    self.diagnostics.pop_front();
                }
                self.diagnostics.push_back(line);
                None
            }
            Some(RunSignal::Completed(done)) => Some(RunOutcome::Completed(done)),
            Some(RunSignal::Failed(e)) => Some(RunOutcome::Failed(e.to_string())),
            None => Some(RunOutcome::Failed(
                "event stream closed without a completion report".to_string(),
            )),
        }
    }

    fn finish(self, outcome: RunOutcome) -> (RunOutcome, Accumulator, Vec<String>) {
        (outcome, self.accumulator, self.diagnostics.into())
    }
}

/// Pump `handle` into an accumulator, publishing on every tick that has news
pub async fn drive(
    mut handle: RunHandle,
    publisher: &mut Publisher<'_>,
    limits: RenderLimits,
    publish_interval: Duration,
) -> (RunOutcome, Accumulator, Vec<String>) {
    let mut progress = Progress::new(limits);

    publisher.publish_progress(&progress.accumulator.render()).await;

    let mut ticker = tokio::time::interval(publish_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;
    let mut dirty = false;

    let outcome = loop {
        tokio::select! {
            signal = handle.next() => {
                let diagnostic = matches!(signal, Some(RunSignal::Diagnostic(_)));
                if let Some(outcome) = progress.absorb(signal) {
                    break outcome;
                }
                dirty |= !diagnostic;
            }
            _ = ticker.tick() => {
                if dirty {
                    dirty = !publisher.publish_progress(&progress.accumulator.render()).await;
                }
            }
        }
    };

    progress.finish(outcome)
}

/// Read `handle` to the end without publishing anything
pub async fn collect(
    mut handle: RunHandle,
    limits: RenderLimits,
) -> (RunOutcome, Accumulator, Vec<String>) {
    let mut progress = Progress::new(limits);
    loop {
        if let Some(outcome) = progress.absorb(handle.next().await) {
            return progress.finish(outcome);
        }
    }
}

/// The render a finished run leaves behind.
///
/// Progress markers and the placeholder are dropped. A failed run gets an
/// error banner, a non-zero exit without content gets an exit-code banner.
pub fn final_render(
    outcome: &RunOutcome,
    accumulator: &Accumulator,
    diagnostics: &[String],
    limits: &RenderLimits,
) -> Vec<Block> {
    let mut blocks: Vec<Block> = accumulator
        .render()
        .into_iter()
        .filter(|block| !block.is_placeholder() && !block.is_in_progress())
        .collect();

    let mut banner = Vec::new();
    match outcome {
        RunOutcome::Failed(message) => banner.push(error_banner(message)),
        RunOutcome::Completed(done) if !done.success() && !accumulator.has_content() => {
            banner.push(exit_code_banner(done.exit_code));
            if !diagnostics.is_empty() {
                let tail = clip(&diagnostics.join("\n"), limits.max_block_chars.saturating_sub(8));
                banner.push(Block::context(format!("```\n{}\n```", tail)));
            }
        }
        RunOutcome::Completed(_) => {}
    }

    if banner.is_empty() && blocks.is_empty() {
        blocks.push(Block::context("✅ _Done, no output_"));
    }
    banner.extend(blocks);
    enforce_block_limit(banner, limits)
}
