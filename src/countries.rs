use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use dashmap::DashMap;
use log::{debug, info};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountryStats {
    pub internet_users: u64,
    pub tv_households: u64,
    pub population: u64,
}

#[derive(Deserialize, Debug)]
struct CountryRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "TV Name")]
    tv_name: String,
    #[serde(rename = "Users")]
    users: u64,
    #[serde(rename = "TV")]
    tv: u64,
    #[serde(rename = "Population")]
    population: u64,
}

/// Read-only country reference table, keyed by both the country name and its
/// TV-listing alias.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    countries: HashMap<String, CountryStats>,
}

impl CountryTable {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading country reference table from: {}", path.display());
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open country reference file: {}", path.display()))?;

        let mut countries = HashMap::new();
        for (line, row) in reader.deserialize::<CountryRow>().enumerate() {
            let row = row.with_context(|| format!("Malformed country row {} in {}", line + 2, path.display()))?;
            let stats = CountryStats { internet_users: row.users, tv_households: row.tv, population: row.population };
            for name in [&row.name, &row.tv_name] {
                if !name.is_empty() {
                    countries.insert(name.replace('~', ","), stats);
                }
            }
        }
        debug!("Country table holds {} names", countries.len());
        Ok(Self { countries })
    }

    pub fn get(&self, country: &str) -> Option<&CountryStats> {
        self.countries.get(country)
    }

    pub fn contains(&self, country: &str) -> bool {
        self.countries.contains_key(country)
    }

    /// All keys in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.countries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}

/// Per-country sums of raw newspaper readership. Safe to add to from many
/// workers at once.
#[derive(Debug, Default)]
pub struct CountryTotals {
    totals: DashMap<String, AtomicU64>,
}

impl CountryTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, country: &str, readers: u64) {
        if let Some(total) = self.totals.get(country) {
            total.fetch_add(readers, Ordering::Relaxed);
            return;
        }
        self.totals
            .entry(country.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(readers, Ordering::Relaxed);
    }

    pub fn get(&self, country: &str) -> Option<u64> {
        self.totals.get(country).map(|total| total.load(Ordering::Relaxed))
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, u64> {
        self.totals
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect()
    }
}

impl FromIterator<(String, u64)> for CountryTotals {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        let totals = CountryTotals::new();
        for (country, readers) in iter {
            totals.add(&country, readers);
        }
        totals
    }
}
