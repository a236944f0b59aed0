//! Pattern heuristics that pull a raw readership figure out of an encyclopedia
//! document. Each extractor returns the first pattern that yields a number and
//! `None` when nothing matched, leaving the fallback to the caller.

use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9,.]+[,.][0-9]{3}").unwrap());

static CIRCULATION_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[cC]irculation\b.*?\n?[^0-9]*[0-9,.]+[,.][0-9]{3}").unwrap());
static COPIES_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9,.]+[,.][0-9]{3} \b[cC]opies\b").unwrap());
static CIRCULATION_LOOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[cC]irculation\b .{0,4} [0-9,.]+[,.][0-9]{3}").unwrap());

static AUDIENCE_SHARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\b[Aa]udience [Ss]hare\b</th><td>([0-9,.]+[,.][0-9]{3}|[0-9]{1,2}.[0-9]*%|[0-9.]+ \bmillion\b|[0-9]+))").unwrap()
});
static VIEWERS_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(([0-9,.]+ (\bmillion\b )?)(\b[Vv]iewers\b|\b[Hh]omes\b)|\b[Hh]ouseholds\b)").unwrap()
});

/// Digits of a separated figure such as `1,234,567` or `1.234.567`.
fn separated_number(text: &str) -> Option<u64> {
    let found = NUMBER.find(text)?;
    found.as_str().replace(['.', ','], "").parse().ok()
}

/// Circulation table entry, then the last "N,NNN copies", then the last loose
/// "circulation ... N,NNN".
pub fn newspaper_circulation(document: &str) -> Option<u64> {
    if let Some(found) = CIRCULATION_TABLE.find(document) {
        if let Some(n) = separated_number(found.as_str()) {
            return Some(n);
        }
    }
    if let Some(found) = COPIES_TEXT.find_iter(document).last() {
        if let Some(n) = separated_number(found.as_str()) {
            return Some(n);
        }
    }
    CIRCULATION_LOOSE.find_iter(document).last().and_then(|found| separated_number(found.as_str()))
}

/// Audience-share table entry (percentage of TV households, "X million", or a
/// plain count), then the most recent "N viewers/homes" mention.
pub fn tv_audience(document: &str, tv_households: u64) -> Option<u64> {
    for caps in AUDIENCE_SHARE.captures_iter(document) {
        let value = &caps[2];
        if let Some(pct) = value.strip_suffix('%') {
            if let Ok(pct) = pct.parse::<f64>() {
                return Some((pct / 100.0 * tv_households as f64) as u64);
            }
        } else if let Some(millions) = value.strip_suffix(" million") {
            if let Ok(millions) = millions.parse::<f64>() {
                return Some((millions * 1_000_000.0) as u64);
            }
        } else if let Ok(n) = value.replace(',', "").parse::<u64>() {
            return Some(n);
        }
    }

    let mentions: Vec<_> = VIEWERS_TEXT.captures_iter(document).collect();
    for caps in mentions.iter().rev() {
        let Some(amount) = caps.get(2).map(|m| m.as_str()) else { continue };
        if amount.contains("million") {
            if let Ok(millions) = amount.replace("million", "").trim().parse::<f64>() {
                return Some((millions * 1_000_000.0) as u64);
            }
        } else if let Ok(n) = amount.replace(',', "").trim().parse::<u64>() {
            return Some(n);
        }
    }
    None
}

/// Number at the start of a short count label: `"21.4K Hello World"` is 21400,
/// `"1M"` is 1,000,000. Anything else unparsable is 0.
pub fn parse_count(text: &str) -> u64 {
    let token = text.split(' ').next().unwrap_or("").trim();
    let Some(last) = token.chars().last() else { return 0 };
    let scaled = |digits: &str, factor: f64| digits.parse::<f64>().map(|n| (n * factor) as u64).unwrap_or(0);
    match last {
        c if c.is_ascii_digit() => token.replace(',', "").parse().unwrap_or(0),
        'K' => scaled(&token[..token.len() - 1], 1e3),
        'M' => scaled(&token[..token.len() - 1], 1e6),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_from_labels() {
        assert_eq!(parse_count("21.4K Hello World"), 21_400);
        assert_eq!(parse_count("21.4K Hello World ! 37K"), 21_400);
        assert_eq!(parse_count("21 Hello World ! 37K"), 21);
        assert_eq!(parse_count("1K"), 1_000);
        assert_eq!(parse_count("1M"), 1_000_000);
        assert_eq!(parse_count("37"), 37);
        assert_eq!(parse_count("1,234 likes"), 1_234);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("likes"), 0);
    }

    #[test]
    fn circulation_table_wins() {
        let page = "<th>Circulation</th><td>123,456 (2019)</td> ... 9,999 copies";
        assert_eq!(newspaper_circulation(page), Some(123_456));
    }

    #[test]
    fn copies_text_uses_last_mention() {
        let page = "printed 10,000 copies in 1990 and 45.000 copies today";
        assert_eq!(newspaper_circulation(page), Some(45_000));
    }

    #[test]
    fn no_circulation_figure() {
        assert_eq!(newspaper_circulation("a small paper with 12 staff"), None);
    }

    #[test]
    fn audience_share_percent_is_a_fraction_of_households() {
        // 12.5% of a million households, not 12.5 times the household count.
        assert_eq!(tv_audience("<th>Audience share</th><td>12.5%</td>", 1_000_000), Some(125_000));
        assert_ne!(tv_audience("<th>Audience share</th><td>12.5%</td>", 1_000_000), Some(12_500_000));
        assert_eq!(tv_audience("<th>Audience share</th><td>100%</td>", 400), Some(400));
    }

    #[test]
    fn audience_share_forms() {
        assert_eq!(tv_audience("<th>Audience share</th><td>2.5 million</td>", 0), Some(2_500_000));
        assert_eq!(tv_audience("<th>Audience share</th><td>1,250,000</td>", 0), Some(1_250_000));
        assert_eq!(tv_audience("<th>Audience Share</th><td>4500</td>", 0), Some(4_500));
    }

    #[test]
    fn viewers_text_scans_from_the_end() {
        let page = "reached 300,000 viewers in 2001, now 1.5 million viewers";
        assert_eq!(tv_audience(page, 0), Some(1_500_000));
        let page = "1.5 million viewers at launch, today 40,000 homes";
        assert_eq!(tv_audience(page, 0), Some(40_000));
        assert_eq!(tv_audience("available in most households", 0), None);
    }
}
