//! The outlet entity: one newspaper or TV channel being enriched stage by stage.
//!
//! Completeness is never stored. [`NewsOutlet::completeness`] derives it from the
//! fields on every call, so it cannot go stale after a mutation.

use crate::error::TaskError;
use crate::source::Engine;
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Footer date format of encyclopedia pages, e.g. `07 March 2021`.
pub const WIKI_DATE_FORMAT: &str = "%d %B %Y";

static LAST_EDITED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bThis page was last edited on \b(([0-9]{1,2}) [a-zA-Z]+ [0-9]+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutletKind {
    #[serde(rename = "pp")]
    Newspaper,
    #[serde(rename = "tv")]
    TvChannel,
}

/// One entry of the completeness vector, addressable by its persisted key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Country,
    RawReadership,
    NormalizedReadership,
    NameA,
    NameB,
}

impl Flag {
    pub const ALL: [Flag; 5] = [Flag::Country, Flag::RawReadership, Flag::NormalizedReadership, Flag::NameA, Flag::NameB];

    pub fn key(&self) -> &'static str {
        match self {
            Flag::Country => "country",
            Flag::RawReadership => "tempreaders",
            Flag::NormalizedReadership => "readers",
            Flag::NameA => "ggl_name",
            Flag::NameB => "bng_name",
        }
    }

    pub fn for_engine(engine: Engine) -> Flag {
        match engine {
            Engine::Google => Flag::NameA,
            Engine::Bing => Flag::NameB,
        }
    }
}

impl FromStr for Flag {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flag::ALL
            .into_iter()
            .find(|flag| flag.key() == s)
            .ok_or_else(|| TaskError::invalid(format!("unknown completeness flag '{}', expected one of {:?}", s, Flag::ALL.map(|f| f.key()))))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completeness {
    pub country: bool,
    pub raw_readership: bool,
    pub normalized_readership: bool,
    pub name_a: bool,
    pub name_b: bool,
}

impl Completeness {
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Country => self.country,
            Flag::RawReadership => self.raw_readership,
            Flag::NormalizedReadership => self.normalized_readership,
            Flag::NameA => self.name_a,
            Flag::NameB => self.name_b,
        }
    }

    pub fn count(&self) -> usize {
        Flag::ALL.iter().filter(|flag| self.get(**flag)).count()
    }
}

#[derive(Debug, Clone)]
pub struct NewsOutlet {
    name: String,
    kind: OutletKind,
    wiki_url: Option<String>,
    country: Option<String>,
    raw_readership: Option<u64>,
    normalized_readership: Option<u64>,
    name_a: Option<String>,
    name_b: Option<String>,
    last_edited: Option<String>,
    document: Option<String>,
}

impl NewsOutlet {
    pub fn new(name: impl Into<String>, kind: OutletKind) -> Self {
        Self {
            name: name.into(),
            kind,
            wiki_url: None,
            country: None,
            raw_readership: None,
            normalized_readership: None,
            name_a: None,
            name_b: None,
            last_edited: None,
            document: None,
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn kind(&self) -> OutletKind { self.kind }
    pub fn wiki_url(&self) -> Option<&str> { self.wiki_url.as_deref() }
    pub fn country(&self) -> Option<&str> { self.country.as_deref() }
    pub fn raw_readership(&self) -> Option<u64> { self.raw_readership }
    pub fn normalized_readership(&self) -> Option<u64> { self.normalized_readership }
    pub fn last_edited(&self) -> Option<&str> { self.last_edited.as_deref() }
    pub fn document(&self) -> Option<&str> { self.document.as_deref() }

    pub fn engine_name(&self, engine: Engine) -> Option<&str> {
        match engine {
            Engine::Google => self.name_a.as_deref(),
            Engine::Bing => self.name_b.as_deref(),
        }
    }

    pub fn set_wiki_url(&mut self, url: impl Into<String>) {
        self.wiki_url = Some(url.into());
    }

    pub fn set_country(&mut self, country: impl Into<String>) {
        self.country = Some(country.into());
    }

    pub fn set_raw_readership(&mut self, readers: u64) {
        self.raw_readership = Some(readers);
    }

    pub fn set_normalized_readership(&mut self, readers: u64) {
        self.normalized_readership = Some(readers);
    }

    /// An empty `name` is the "searched, nothing confident" sentinel and still
    /// counts as populated.
    pub fn set_engine_name(&mut self, engine: Engine, name: impl Into<String>) {
        match engine {
            Engine::Google => self.name_a = Some(name.into()),
            Engine::Bing => self.name_b = Some(name.into()),
        }
    }

    pub fn set_last_edited(&mut self, date: impl Into<String>) {
        self.last_edited = Some(date.into());
    }

    pub fn set_document(&mut self, document: String) {
        self.document = Some(document);
    }

    pub fn clear_document(&mut self) {
        self.document = None;
    }

    /// Sets the last-edited date from the cached document's footer, or today when
    /// there is no document or no footer.
    pub fn acquire_last_edited(&mut self) {
        let date = self
            .document
            .as_deref()
            .and_then(last_edited_from_document)
            .unwrap_or_else(|| Local::now().format(WIKI_DATE_FORMAT).to_string());
        self.last_edited = Some(date);
    }

    pub fn completeness(&self) -> Completeness {
        Completeness {
            country: self.country.is_some(),
            raw_readership: self.raw_readership.is_some(),
            normalized_readership: self.normalized_readership.is_some(),
            name_a: self.name_a.is_some(),
            name_b: self.name_b.is_some(),
        }
    }

    pub fn has(&self, flag: Flag) -> bool {
        self.completeness().get(flag)
    }

    fn last_edited_date(&self) -> Option<NaiveDate> {
        self.last_edited
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, WIKI_DATE_FORMAT).ok())
    }
}

/// Persisted-field equality; the transient document does not take part.
impl PartialEq for NewsOutlet {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.wiki_url == other.wiki_url
            && self.country == other.country
            && self.raw_readership == other.raw_readership
            && self.normalized_readership == other.normalized_readership
            && self.name_a == other.name_a
            && self.name_b == other.name_b
            && self.last_edited == other.last_edited
    }
}

impl fmt::Display for NewsOutlet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.normalized_readership {
            Some(readers) => write!(f, "{}: {} readers", self.name, readers),
            None => write!(f, "{}: unknown readers", self.name),
        }
    }
}

/// Priority of `a` over `b` when both carry the same name: more completeness
/// flags first, then the more recent edit date, then the larger normalized
/// readership. Missing dates and readerships rank lowest.
pub fn compare(a: &NewsOutlet, b: &NewsOutlet) -> Ordering {
    a.completeness()
        .count()
        .cmp(&b.completeness().count())
        .then_with(|| a.last_edited_date().cmp(&b.last_edited_date()))
        .then_with(|| a.normalized_readership.cmp(&b.normalized_readership))
}

/// Last "This page was last edited on" date of a document, zero-padded to
/// [`WIKI_DATE_FORMAT`]. `None` when absent or not a real date.
pub fn last_edited_from_document(document: &str) -> Option<String> {
    let caps = LAST_EDITED_RE.captures_iter(document).last()?;
    let date = if caps[2].len() == 1 { format!("0{}", &caps[1]) } else { caps[1].to_string() };
    NaiveDate::parse_from_str(&date, WIKI_DATE_FORMAT).ok().map(|_| date)
}

/// Snapshot shape of an outlet. Fields are declared in alphabetical order so the
/// serialized keys come out sorted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletRecord {
    #[serde(default)]
    pub bng_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub ggl_name: Option<String>,
    pub name: String,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub readers: Option<u64>,
    #[serde(default)]
    pub tempreaders: Option<u64>,
    pub tpe: OutletKind,
    #[serde(default)]
    pub wiki_date: Option<String>,
    #[serde(default)]
    pub wiki_url: Option<String>,
}

impl From<&NewsOutlet> for OutletRecord {
    fn from(outlet: &NewsOutlet) -> Self {
        Self {
            bng_name: outlet.name_b.clone(),
            country: outlet.country.clone(),
            ggl_name: outlet.name_a.clone(),
            name: outlet.name.clone(),
            page: None,
            readers: outlet.normalized_readership,
            tempreaders: outlet.raw_readership,
            tpe: outlet.kind,
            wiki_date: outlet.last_edited.clone(),
            wiki_url: outlet.wiki_url.clone(),
        }
    }
}

impl From<OutletRecord> for NewsOutlet {
    fn from(record: OutletRecord) -> Self {
        Self {
            name: record.name,
            kind: record.tpe,
            wiki_url: record.wiki_url,
            country: record.country,
            raw_readership: record.tempreaders,
            normalized_readership: record.readers,
            name_a: record.ggl_name,
            name_b: record.bng_name,
            last_edited: record.wiki_date,
            document: None,
        }
    }
}
