//! Runs the stages in order, snapshotting after each one.
//!
//! Between stages the queue is split on the flag the next stage fills in. Only
//! outlets still missing it are processed; the rest rejoin afterwards and the
//! merged queue is deduplicated before the next snapshot.

use crate::context::PipelineContext;
use crate::countries::CountryTotals;
use crate::outlet::{Flag, NewsOutlet};
use crate::persistence::{clear_run_files, latest_snapshot, read_snapshot, read_totals, write_lookup, write_snapshot, write_totals, LAST_SNAPSHOT};
use crate::queue::{filter_dedup, merge_bypass, split_by_flag};
use crate::source::Engine;
use crate::stages::{add_bypassed_totals, discover_newspapers, discover_tv_channels, extract_raw_readership, normalize_readership, resolve_names};
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;

/// Queue sizes around one stage: merged size, then how many were processed and
/// how many bypassed in the split that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSizes {
    pub stage: usize,
    pub merged: usize,
    pub processed: usize,
    pub bypassed: usize,
}

#[derive(Debug, Default)]
pub struct PipelineReport {
    pub resumed_from: Option<usize>,
    pub stages: Vec<StageSizes>,
    pub outlets: usize,
    pub lookup_rows: usize,
    /// Outlets left unsearched by a paused name stage.
    pub paused: Option<(Engine, usize)>,
}

/// Where a run picks up given the last snapshot it finds. Name stages are
/// re-entered while any outlet still lacks that engine's name, so a paused
/// search continues where it stopped.
pub fn resume_stage(snapshot: usize, queue: &[NewsOutlet]) -> usize {
    let mut next = snapshot + 1;
    if snapshot >= 4 {
        for (stage, engine) in [(4, Engine::Google), (5, Engine::Bing)] {
            if stage <= snapshot && queue.iter().any(|o| !o.has(Flag::for_engine(engine))) {
                next = next.min(stage);
            }
        }
    }
    next
}

struct Pipeline<'a> {
    ctx: &'a PipelineContext,
    report: PipelineReport,
}

impl<'a> Pipeline<'a> {
    fn snapshot(&mut self, stage: usize, queue: Vec<NewsOutlet>) -> Result<Vec<NewsOutlet>> {
        let merged = queue.len();
        let queue = filter_dedup(queue);
        write_snapshot(&self.ctx.config.data_dir, stage, &queue)?;
        self.report.stages.push(StageSizes { stage, merged, processed: 0, bypassed: 0 });
        Ok(queue)
    }

    /// Splits on `flag` and records the sizes on the latest stage entry.
    fn split(&mut self, queue: Vec<NewsOutlet>, flag: Flag) -> (Vec<NewsOutlet>, Vec<NewsOutlet>) {
        let (remaining, bypassed) = split_by_flag(queue, flag);
        info!("Split on {}: {} to process, {} bypassed", flag, remaining.len(), bypassed.len());
        if let Some(sizes) = self.report.stages.last_mut() {
            sizes.processed = remaining.len();
            sizes.bypassed = bypassed.len();
        }
        (remaining, bypassed)
    }

    fn discovery(&mut self) -> Result<Vec<NewsOutlet>> {
        let mut queue = discover_newspapers(self.ctx)?;
        queue.extend(discover_tv_channels(self.ctx)?);
        self.snapshot(1, queue)
    }

    fn raw_readership(&mut self, queue: Vec<NewsOutlet>, totals: &CountryTotals) -> Result<Vec<NewsOutlet>> {
        let (remaining, bypassed) = self.split(queue, Flag::RawReadership);
        let processed = extract_raw_readership(self.ctx, remaining, totals)?;
        add_bypassed_totals(&bypassed, totals);
        write_totals(&self.ctx.config.data_dir, totals)?;

        let mut merged = merge_bypass(processed, bypassed);
        merged.iter_mut().for_each(NewsOutlet::clear_document);
        self.snapshot(2, merged)
    }

    fn normalization(&mut self, queue: Vec<NewsOutlet>, totals: &CountryTotals) -> Result<Vec<NewsOutlet>> {
        let (remaining, bypassed) = self.split(queue, Flag::NormalizedReadership);
        let processed = normalize_readership(self.ctx, remaining, totals)?;
        let merged = merge_bypass(processed, bypassed);
        self.snapshot(3, merged)
    }

    fn names(&mut self, stage: usize, queue: Vec<NewsOutlet>, engine: Engine) -> Result<Vec<NewsOutlet>> {
        let (remaining, bypassed) = self.split(queue, Flag::for_engine(engine));
        let outcome = resolve_names(self.ctx, remaining, engine);
        if outcome.paused() {
            self.report.paused = Some((engine, outcome.remainder.len()));
        }
        let merged = merge_bypass(merge_bypass(outcome.resolved, outcome.remainder), bypassed);
        self.snapshot(stage, merged)
    }
}

/// Runs or resumes the whole pipeline and writes the lookup table. Stops after
/// the snapshot of a name stage that had to pause.
pub fn run(ctx: &PipelineContext) -> Result<PipelineReport> {
    let data_dir = &ctx.config.data_dir;
    fs::create_dir_all(data_dir).with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    let mut pipeline = Pipeline { ctx, report: PipelineReport::default() };
    let progress = &ctx.progress;
    progress.start("loading");

    let resume = if ctx.config.fresh {
        let removed = clear_run_files(data_dir)?;
        if removed > 0 {
            info!("Fresh run: removed {} files left by an earlier run", removed);
        }
        None
    } else {
        latest_snapshot(data_dir)?
    };
    let (mut queue, start) = match resume {
        Some((stage, path)) => {
            let queue = read_snapshot(&path)?;
            let start = resume_stage(stage, &queue);
            info!("Resuming from {} ({} outlets) at stage {}", path.display(), queue.len(), start);
            pipeline.report.resumed_from = Some(stage);
            (queue, start)
        }
        None => {
            info!("Starting a fresh run in {}", data_dir.display());
            (Vec::new(), 1)
        }
    };

    // Only normalization reads the totals; the readership stage rebuilds them.
    let totals = if start == 3 {
        read_totals(data_dir).context("Resuming at normalization needs the saved newspaper totals")?
    } else {
        CountryTotals::new()
    };

    progress.step("discovery");
    if start <= 1 {
        queue = pipeline.discovery()?;
    }
    progress.step("raw readership");
    if start <= 2 {
        queue = pipeline.raw_readership(queue, &totals)?;
    }
    progress.step("normalization");
    if start <= 3 {
        queue = pipeline.normalization(queue, &totals)?;
    }
    for (stage, engine) in [(4, Engine::Google), (5, Engine::Bing)] {
        progress.step(&format!("{} names", engine));
        if start <= stage {
            queue = pipeline.names(stage, queue, engine)?;
            if let Some((engine, left)) = pipeline.report.paused {
                warn!("{} name search paused with {} outlets left; run again without --fresh to continue", engine, left);
                pipeline.report.outlets = queue.len();
                progress.abandon(&format!("Paused at {} names", engine));
                return Ok(pipeline.report);
            }
        }
    }

    progress.step("lookup table");
    if start > LAST_SNAPSHOT {
        info!("All stages already complete, rewriting the lookup table");
    }
    pipeline.report.lookup_rows = write_lookup(data_dir, &queue)?;
    pipeline.report.outlets = queue.len();
    progress.finish();
    Ok(pipeline.report)
}
