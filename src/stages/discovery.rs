//! Stage 1: find candidate outlets on encyclopedia list pages.
//!
//! Newspapers come from one "List of newspapers in {country}" page per known
//! country. TV channels come from a single list page whose rows only name the
//! channel; the country is read from each channel's own page afterwards.

use crate::context::PipelineContext;
use crate::error::{FetchError, TaskError};
use crate::outlet::{NewsOutlet, OutletKind};
use crate::runner::{Element, TaskOutput};
use crate::source::wiki_link;
use anyhow::Result;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

pub const TV_LIST_TITLE: &str = "List of news television channels";

static NEWSPAPER_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<i><a href="/wiki/([^"]*)"#).unwrap());
static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<tr>.*?</tr>").unwrap());
static ROW_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"title="([^"]*)"#).unwrap());
static COUNTRY_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[Cc]ountry\b</th><td>(<.*?>)?([^<]*)").unwrap());

pub fn newspaper_list_title(country: &str) -> String {
    format!("List of newspapers in {}", country)
}

/// Outlet names linked in italics on a newspaper list page, in page order.
pub fn newspaper_names(page: &str) -> Vec<String> {
    NEWSPAPER_LINK
        .captures_iter(page)
        .map(|caps| {
            let title = caps[1].replace('_', " ");
            match urlencoding::decode(&title) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => title,
            }
        })
        .collect()
}

/// First `title="…"` of every table row of the TV channel list.
pub fn tv_channel_names(page: &str) -> Vec<String> {
    TABLE_ROW
        .find_iter(page)
        .filter_map(|row| ROW_TITLE.captures(row.as_str()).map(|caps| caps[1].to_string()))
        .collect()
}

/// Value of the first "Country" infobox field, if any.
pub fn country_field(page: &str) -> Option<&str> {
    COUNTRY_FIELD.captures(page).and_then(|caps| caps.get(2)).map(|m| m.as_str().trim())
}

/// Fetches the outlet's reference page, which also proves the link resolves.
/// The page stays on the outlet for the readership stage.
fn resolve(ctx: &PipelineContext, outlet: &mut NewsOutlet) -> Result<(), FetchError> {
    let url = wiki_link(outlet.name());
    let page = ctx.documents.fetch_document(&url)?;
    outlet.set_wiki_url(url);
    outlet.set_document(page);
    outlet.acquire_last_edited();
    Ok(())
}

fn newspapers_in_country(country: String, ctx: &PipelineContext) -> Result<TaskOutput<NewsOutlet>, TaskError> {
    let page = ctx.documents.fetch_document(&wiki_link(&newspaper_list_title(&country)))?;
    let names = newspaper_names(&page);
    if names.is_empty() {
        return Ok(TaskOutput::Dropped);
    }

    let mut found = Vec::with_capacity(names.len());
    for name in names {
        let mut outlet = NewsOutlet::new(name, OutletKind::Newspaper);
        match resolve(ctx, &mut outlet) {
            Ok(()) => {
                outlet.set_country(country.as_str());
                found.push(Element::Item(outlet));
            }
            Err(e @ FetchError::RateLimited { .. }) => return Err(e.into()),
            Err(e) => debug!("Skipping newspaper '{}' in {}: {}", outlet.name(), country, e),
        }
    }
    Ok(TaskOutput::Iterate(found))
}

fn tv_channel_country(name: String, ctx: &PipelineContext) -> Result<TaskOutput<NewsOutlet>, TaskError> {
    let mut outlet = NewsOutlet::new(name, OutletKind::TvChannel);
    resolve(ctx, &mut outlet)?;
    let country = outlet.document().and_then(country_field).map(str::to_string);
    match country {
        Some(country) if ctx.countries.contains(&country) => {
            outlet.set_country(country);
            Ok(TaskOutput::single(outlet))
        }
        _ => Ok(TaskOutput::Dropped),
    }
}

pub fn discover_newspapers(ctx: &PipelineContext) -> Result<Vec<NewsOutlet>> {
    let countries: Vec<String> = ctx.countries.names().into_iter().map(str::to_string).collect();
    let outlets = ctx.run_pass("newspapers", ctx.config.workers.newspapers, countries, newspapers_in_country, ctx)?;
    info!("Discovered {} newspapers", outlets.len());
    Ok(outlets)
}

/// A failing list page is not fatal: the run continues with newspapers only.
pub fn discover_tv_channels(ctx: &PipelineContext) -> Result<Vec<NewsOutlet>> {
    let list = match ctx.documents.fetch_document(&wiki_link(TV_LIST_TITLE)) {
        Ok(page) => page,
        Err(e) => {
            warn!("Could not fetch the TV channel list: {}", e);
            return Ok(Vec::new());
        }
    };
    let names = tv_channel_names(&list);
    debug!("TV channel list holds {} candidate rows", names.len());
    let outlets = ctx.run_pass("tv-channels", ctx.config.workers.tv_channels, names, tv_channel_country, ctx)?;
    info!("Discovered {} TV channels with a known country", outlets.len());
    Ok(outlets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newspaper_links_are_decoded() {
        let page = r#"<li><i><a href="/wiki/El_Comercio_(Peru)" title="x">El Comercio</a></i></li>
            <li><i><a href="/wiki/La_Rep%C3%BAblica_(Peru)">La República</a></i></li>
            <li><a href="/wiki/Lima">Lima</a></li>"#;
        assert_eq!(newspaper_names(page), vec!["El Comercio (Peru)", "La República (Peru)"]);
    }

    #[test]
    fn tv_rows_yield_first_title() {
        let page = "<table><tr>\n<th>Name</th></tr><tr>\n<td><a href=\"/wiki/CNN\" title=\"CNN\">CNN</a></td>\n<td title=\"USA\"></td>\n</tr><tr><td>plain</td></tr></table>";
        assert_eq!(tv_channel_names(page), vec!["CNN"]);
    }

    #[test]
    fn country_field_skips_one_inner_tag() {
        let page = r#"<th scope="row">Country</th><td><a href="/wiki/Peru">Peru</a></td>"#;
        assert_eq!(country_field(page), Some("Peru"));
        let page = r#"<th>Country</th><td><span><a href="/wiki/Peru">Peru</a></span></td>"#;
        assert_eq!(country_field(page), Some(""));
        let page = r#"<tr><th>Country</th><td><span class="flag">Peru</span></td>"#;
        assert_eq!(country_field(page), Some("Peru"));
        let page = "<th>Country</th><td>Chile</td>";
        assert_eq!(country_field(page), Some("Chile"));
    }
}
