//! Stage 4: the publisher name each search engine uses for an outlet.
//!
//! Searches run one outlet at a time. A rate limit pauses the stage and hands
//! back everything not yet searched, so a later run can pick it up.

use crate::context::PipelineContext;
use crate::error::FetchError;
use crate::outlet::NewsOutlet;
use crate::source::{Engine, SearchHit};
use log::{info, warn};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct NameOutcome {
    pub resolved: Vec<NewsOutlet>,
    /// Outlets never searched because the engine refused further requests.
    pub remainder: Vec<NewsOutlet>,
}

impl NameOutcome {
    pub fn paused(&self) -> bool {
        !self.remainder.is_empty()
    }
}

/// The publisher holding strictly more than `threshold` of the hits. A tie for
/// the top share is ambiguous and resolves to the empty string, as does no
/// result at all.
pub fn dominant_publisher(hits: &[SearchHit], threshold: f64) -> String {
    if hits.is_empty() {
        return String::new();
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for hit in hits {
        *counts.entry(hit.publisher.as_str()).or_insert(0) += 1;
    }
    let Some(top) = counts.values().copied().max() else { return String::new() };
    let mut leaders = counts.iter().filter(|(_, count)| **count == top);
    match (leaders.next(), leaders.next()) {
        (Some((name, _)), None) if top as f64 / hits.len() as f64 > threshold => name.to_string(),
        _ => String::new(),
    }
}

pub fn resolve_names(ctx: &PipelineContext, queue: Vec<NewsOutlet>, engine: Engine) -> NameOutcome {
    let settings = &ctx.config.name_search;
    let bar = ctx.progress.items(queue.len(), &format!("{} names", engine));
    let mut outcome = NameOutcome { resolved: Vec::with_capacity(queue.len()), remainder: Vec::new() };

    let mut pending = queue.into_iter();
    while let Some(mut outlet) = pending.next() {
        let name = match ctx.search.search_news(outlet.name(), engine, settings.result_count, settings.prefer_english) {
            Ok(hits) => dominant_publisher(&hits, settings.share_threshold),
            Err(e @ FetchError::RateLimited { .. }) => {
                outcome.remainder.push(outlet);
                outcome.remainder.extend(pending);
                warn!(
                    "{} search refused after {} searches ({}); {} outlets left for a later run",
                    engine,
                    outcome.resolved.len(),
                    e,
                    outcome.remainder.len()
                );
                bar.abandon();
                return outcome;
            }
            Err(e) => {
                warn!("{} search for {} failed: {}", engine, outlet.name(), e);
                String::new()
            }
        };
        outlet.set_engine_name(engine, name);
        outcome.resolved.push(outlet);
        bar.inc(1);
    }

    bar.finish_and_clear();
    let matched = outcome.resolved.iter().filter(|o| o.engine_name(engine).is_some_and(|n| !n.is_empty())).count();
    info!("{} names: {} of {} outlets matched a publisher", engine, matched, outcome.resolved.len());
    outcome
}
