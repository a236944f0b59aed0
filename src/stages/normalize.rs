//! Stage 3: turn raw readership into internet-user-comparable figures.

use crate::context::PipelineContext;
use crate::countries::{CountryStats, CountryTotals};
use crate::error::TaskError;
use crate::outlet::{NewsOutlet, OutletKind};
use crate::runner::TaskOutput;
use anyhow::Result;
use log::{debug, info};

/// `internet_users × raw ÷ denominator`, where the denominator is the country's
/// newspaper total for newspapers and its TV households for TV channels. `None`
/// when the denominator is missing or zero.
pub fn normalized_readership(kind: OutletKind, raw: u64, stats: &CountryStats, newspaper_total: Option<u64>) -> Option<u64> {
    let denominator = match kind {
        OutletKind::Newspaper => newspaper_total?,
        OutletKind::TvChannel => stats.tv_households,
    };
    if denominator == 0 {
        return None;
    }
    let value = stats.internet_users as u128 * raw as u128 / denominator as u128;
    u64::try_from(value).ok()
}

struct NormalizeArgs<'a> {
    ctx: &'a PipelineContext,
    totals: &'a CountryTotals,
}

fn normalize(mut outlet: NewsOutlet, args: &NormalizeArgs) -> Result<TaskOutput<NewsOutlet>, TaskError> {
    let (Some(country), Some(raw)) = (outlet.country(), outlet.raw_readership()) else {
        return Err(TaskError::invalid(format!("{} lacks a country or raw readership", outlet.name())));
    };
    let Some(stats) = args.ctx.countries.get(country) else {
        return Err(TaskError::invalid(format!("{} is not in the country table", country)));
    };

    match normalized_readership(outlet.kind(), raw, stats, args.totals.get(country)) {
        Some(readers) => {
            outlet.set_normalized_readership(readers);
            Ok(TaskOutput::single(outlet))
        }
        None => {
            debug!("Cannot normalize {} in {}, dropping", outlet.name(), country);
            Ok(TaskOutput::Dropped)
        }
    }
}

pub fn normalize_readership(ctx: &PipelineContext, queue: Vec<NewsOutlet>, totals: &CountryTotals) -> Result<Vec<NewsOutlet>> {
    let args = NormalizeArgs { ctx, totals };
    let outlets = ctx.run_pass("normalization", ctx.config.workers.normalization, queue, normalize, &args)?;
    info!("Normalized readership for {} outlets", outlets.len());
    Ok(outlets)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTRY_X: CountryStats = CountryStats { internet_users: 1000, tv_households: 500, population: 2000 };

    #[test]
    fn newspaper_share_of_country_total() {
        assert_eq!(normalized_readership(OutletKind::Newspaper, 100, &COUNTRY_X, Some(100)), Some(1000));
        assert_eq!(normalized_readership(OutletKind::Newspaper, 25, &COUNTRY_X, Some(100)), Some(250));
        assert_eq!(normalized_readership(OutletKind::Newspaper, 1, &COUNTRY_X, Some(3)), Some(333));
    }

    #[test]
    fn tv_share_of_households() {
        assert_eq!(normalized_readership(OutletKind::TvChannel, 50, &COUNTRY_X, None), Some(100));
    }

    #[test]
    fn missing_or_zero_denominator_yields_nothing() {
        assert_eq!(normalized_readership(OutletKind::Newspaper, 100, &COUNTRY_X, None), None);
        assert_eq!(normalized_readership(OutletKind::Newspaper, 100, &COUNTRY_X, Some(0)), None);
        let no_tv = CountryStats { tv_households: 0, ..COUNTRY_X };
        assert_eq!(normalized_readership(OutletKind::TvChannel, 100, &no_tv, Some(5)), None);
    }

    #[test]
    fn large_values_do_not_overflow() {
        let big = CountryStats { internet_users: 4_000_000_000, tv_households: 1, population: 1 };
        assert_eq!(
            normalized_readership(OutletKind::Newspaper, 3_000_000_000, &big, Some(6_000_000_000)),
            Some(2_000_000_000)
        );
    }
}
