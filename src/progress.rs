//! Terminal progress: one bar counting pipeline steps, plus a short-lived bar per
//! worker pass.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

pub const PIPELINE_STEPS: u64 = 7;

const STEP_TEMPLATE: &str = "[{elapsed_precise}] step {pos}/{len} {spinner} {msg}";
const ITEM_TEMPLATE: &str = "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta} @ {per_sec}) {msg}";

pub struct PipelineProgress {
    multi: MultiProgress,
    steps: ProgressBar,
    started: Instant,
}

impl PipelineProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Draws nothing; used in tests.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let steps = multi.add(ProgressBar::new(PIPELINE_STEPS));
        if let Ok(style) = ProgressStyle::default_spinner().template(STEP_TEMPLATE) {
            steps.set_style(style);
        }
        Self { multi, steps, started: Instant::now() }
    }

    pub fn start(&self, label: &str) {
        self.steps.set_position(0);
        self.steps.set_message(label.to_string());
        self.steps.enable_steady_tick(Duration::from_millis(500));
    }

    pub fn step(&self, label: &str) {
        self.steps.inc(1);
        self.steps.set_message(label.to_string());
    }

    pub fn position(&self) -> u64 {
        self.steps.position()
    }

    /// Bar for one worker pass over `len` items. Callers clear it when the pass ends.
    pub fn items(&self, len: usize, label: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(len as u64));
        if let Ok(style) = ProgressStyle::default_bar().template(ITEM_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(label.to_string());
        bar
    }

    pub fn finish(&self) {
        self.steps.set_position(PIPELINE_STEPS);
        self.steps
            .finish_with_message(format!("Done after {:.2}s", self.started.elapsed().as_secs_f64()));
    }

    pub fn abandon(&self, reason: &str) {
        self.steps.abandon_with_message(reason.to_string());
    }
}

impl Default for PipelineProgress {
    fn default() -> Self {
        Self::new()
    }
}
