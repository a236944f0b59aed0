//! Stage 2: raw readership per outlet, plus per-country newspaper totals.

use crate::context::PipelineContext;
use crate::countries::{CountryStats, CountryTotals};
use crate::error::TaskError;
use crate::extract::{newspaper_circulation, tv_audience};
use crate::outlet::{NewsOutlet, OutletKind};
use crate::runner::TaskOutput;
use anyhow::Result;
use log::{debug, info};

struct ReadershipArgs<'a> {
    ctx: &'a PipelineContext,
    totals: &'a CountryTotals,
}

/// Raw figure from the page, or the assumed share of the country when the page
/// has none: 0.5% of the population for newspapers, 1% of TV households for TV.
pub fn raw_readership(kind: OutletKind, page: &str, stats: &CountryStats) -> u64 {
    match kind {
        OutletKind::Newspaper => newspaper_circulation(page).unwrap_or(stats.population / 200),
        OutletKind::TvChannel => tv_audience(page, stats.tv_households).unwrap_or(stats.tv_households / 100),
    }
}

fn page_of(outlet: &mut NewsOutlet, ctx: &PipelineContext) -> Result<String, TaskError> {
    if let Some(page) = outlet.document() {
        return Ok(page.to_string());
    }
    match outlet.wiki_url() {
        Some(url) => {
            let page = ctx.documents.fetch_document(url)?;
            outlet.set_document(page.clone());
            Ok(page)
        }
        None => Ok(String::new()),
    }
}

fn extract(mut outlet: NewsOutlet, args: &ReadershipArgs) -> Result<TaskOutput<NewsOutlet>, TaskError> {
    let country = outlet
        .country()
        .map(str::to_string)
        .ok_or_else(|| TaskError::invalid(format!("{} has no country", outlet.name())))?;
    let stats = *args
        .ctx
        .countries
        .get(&country)
        .ok_or_else(|| TaskError::invalid(format!("{} is not in the country table", country)))?;

    let page = page_of(&mut outlet, args.ctx)?;
    let readers = raw_readership(outlet.kind(), &page, &stats);
    outlet.clear_document();
    if readers == 0 {
        debug!("No readership for {}, dropping", outlet.name());
        return Ok(TaskOutput::Dropped);
    }

    outlet.set_raw_readership(readers);
    if outlet.kind() == OutletKind::Newspaper {
        args.totals.add(&country, readers);
    }
    Ok(TaskOutput::single(outlet))
}

/// Runs the extraction pass. Every surviving newspaper's figure is added to
/// `totals`.
pub fn extract_raw_readership(ctx: &PipelineContext, queue: Vec<NewsOutlet>, totals: &CountryTotals) -> Result<Vec<NewsOutlet>> {
    let args = ReadershipArgs { ctx, totals };
    let outlets = ctx.run_pass("raw-readership", ctx.config.workers.raw_readership, queue, extract, &args)?;
    info!("Raw readership found for {} outlets across {} countries", outlets.len(), totals.len());
    Ok(outlets)
}

/// Adds outlets that skipped the pass with a readership already known.
pub fn add_bypassed_totals(bypassed: &[NewsOutlet], totals: &CountryTotals) {
    for outlet in bypassed.iter().filter(|o| o.kind() == OutletKind::Newspaper) {
        if let (Some(country), Some(readers)) = (outlet.country(), outlet.raw_readership()) {
            totals.add(country, readers);
        }
    }
}
