//! Files the pipeline leaves in its data directory: one JSON snapshot per
//! stage, the per-country newspaper totals and the final reach lookup table.

use crate::countries::CountryTotals;
use crate::outlet::{NewsOutlet, OutletRecord};
use crate::source::Engine;
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use glob::glob;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_PREFIX: &str = "NewsSiteDump";
pub const LAST_SNAPSHOT: usize = 5;
pub const TOTALS_FILE: &str = "readers_dict.csv";
pub const LOOKUP_FILE: &str = "News_reach.csv";

/// Written in place of a missing engine name in the lookup table.
const NO_NAME: &str = "#";

pub fn snapshot_path(dir: &Path, stage: usize) -> PathBuf {
    dir.join(format!("{}{}.json", SNAPSHOT_PREFIX, stage))
}

/// Writes the queue as a 4-space indented JSON array sorted by name. Documents
/// are never written.
pub fn write_snapshot(dir: &Path, stage: usize, queue: &[NewsOutlet]) -> Result<PathBuf> {
    let path = snapshot_path(dir, stage);
    let mut records: Vec<OutletRecord> = queue.iter().map(OutletRecord::from).collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));

    let file = File::create(&path).with_context(|| format!("Failed to create snapshot file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    records
        .serialize(&mut serializer)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    writer.flush().with_context(|| format!("Failed to flush snapshot {}", path.display()))?;
    info!("Snapshot {} written: {} outlets -> {}", stage, records.len(), path.display());
    Ok(path)
}

pub fn read_snapshot(path: &Path) -> Result<Vec<NewsOutlet>> {
    let file = File::open(path).with_context(|| format!("Failed to open snapshot file: {}", path.display()))?;
    let records: Vec<OutletRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Malformed snapshot {}", path.display()))?;
    debug!("Read {} outlets from {}", records.len(), path.display());
    Ok(records.into_iter().map(NewsOutlet::from).collect())
}

/// Highest-numbered snapshot present in `dir`, if any.
pub fn latest_snapshot(dir: &Path) -> Result<Option<(usize, PathBuf)>> {
    let pattern = dir.join(format!("{}*.json", SNAPSHOT_PREFIX));
    let pattern_str = pattern.to_string_lossy();
    let mut latest: Option<(usize, PathBuf)> = None;
    for path in glob(&pattern_str)?.filter_map(Result::ok) {
        let stage = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.strip_prefix(SNAPSHOT_PREFIX))
            .and_then(|n| n.parse::<usize>().ok());
        match stage {
            Some(stage) if (1..=LAST_SNAPSHOT).contains(&stage) => {
                if latest.as_ref().map_or(true, |(best, _)| stage > *best) {
                    latest = Some((stage, path));
                }
            }
            _ => debug!("Ignoring {}", path.display()),
        }
    }
    Ok(latest)
}

/// Removes every stage snapshot and both CSV outputs from `dir`. The country
/// table and unrelated files stay. Returns how many files were removed.
pub fn clear_run_files(dir: &Path) -> Result<usize> {
    let mut paths: Vec<PathBuf> = (1..=LAST_SNAPSHOT).map(|stage| snapshot_path(dir, stage)).collect();
    paths.push(dir.join(TOTALS_FILE));
    paths.push(dir.join(LOOKUP_FILE));

    let mut removed = 0;
    for path in paths.iter().filter(|path| path.exists()) {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
        debug!("Removed {}", path.display());
        removed += 1;
    }
    Ok(removed)
}

#[derive(Serialize, Deserialize, Debug)]
struct TotalsRow {
    country: String,
    number: u64,
}

pub fn write_totals(dir: &Path, totals: &CountryTotals) -> Result<PathBuf> {
    let path = dir.join(TOTALS_FILE);
    let mut writer = WriterBuilder::new()
        .from_path(&path)
        .with_context(|| format!("Failed to create totals file: {}", path.display()))?;
    for (country, number) in totals.to_map() {
        writer.serialize(TotalsRow { country: country.replace(',', "~"), number })?;
    }
    writer.flush().with_context(|| format!("Failed to flush totals file: {}", path.display()))?;
    info!("Newspaper totals for {} countries -> {}", totals.len(), path.display());
    Ok(path)
}

pub fn read_totals(dir: &Path) -> Result<CountryTotals> {
    let path = dir.join(TOTALS_FILE);
    let mut reader = ReaderBuilder::new()
        .from_path(&path)
        .with_context(|| format!("Failed to open totals file: {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<TotalsRow>() {
        let row = row.with_context(|| format!("Malformed row in {}", path.display()))?;
        rows.push((row.country.replace('~', ","), row.number));
    }
    Ok(rows.into_iter().collect())
}

#[derive(Serialize, Deserialize, Debug)]
struct LookupRow {
    ggl_name: String,
    bng_name: String,
    reach: u64,
}

fn lookup_name(name: Option<&str>) -> Option<String> {
    name.filter(|n| !n.is_empty()).map(|n| n.replace(',', "~"))
}

/// One row per outlet with at least one non-empty engine name.
pub fn write_lookup(dir: &Path, queue: &[NewsOutlet]) -> Result<usize> {
    let path = dir.join(LOOKUP_FILE);
    let mut writer = WriterBuilder::new()
        .from_path(&path)
        .with_context(|| format!("Failed to create lookup file: {}", path.display()))?;
    let mut rows = 0;
    for outlet in queue {
        let google = lookup_name(outlet.engine_name(Engine::Google));
        let bing = lookup_name(outlet.engine_name(Engine::Bing));
        if google.is_none() && bing.is_none() {
            continue;
        }
        let Some(reach) = outlet.normalized_readership() else {
            warn!("{} has a publisher name but no readership, not written", outlet.name());
            continue;
        };
        writer.serialize(LookupRow {
            ggl_name: google.unwrap_or_else(|| NO_NAME.to_string()),
            bng_name: bing.unwrap_or_else(|| NO_NAME.to_string()),
            reach,
        })?;
        rows += 1;
    }
    writer.flush().with_context(|| format!("Failed to flush lookup file: {}", path.display()))?;
    info!("Lookup table written: {} rows -> {}", rows, path.display());
    Ok(rows)
}

/// Reach per publisher name, one map per search engine.
#[derive(Debug, Default)]
pub struct ReachTable {
    google: HashMap<String, u64>,
    bing: HashMap<String, u64>,
}

impl ReachTable {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!(
                "The lookup file {} was not created yet. Run `outlet-reach create` first; it needs a stable internet connection and may take a while.",
                path.display()
            ));
        }
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read lookup file: {}", path.display()))?;
        let mut reader = ReaderBuilder::new().from_reader(content.as_bytes());
        let mut table = ReachTable::default();
        for row in reader.deserialize::<LookupRow>() {
            let row = row.with_context(|| format!("Malformed row in {}", path.display()))?;
            Self::keep_max(&mut table.google, &row.ggl_name, row.reach);
            Self::keep_max(&mut table.bing, &row.bng_name, row.reach);
        }
        debug!("Lookup table holds {} Google and {} Bing names", table.google.len(), table.bing.len());
        Ok(table)
    }

    fn keep_max(map: &mut HashMap<String, u64>, name: &str, reach: u64) {
        if name == NO_NAME {
            return;
        }
        let entry = map.entry(name.replace('~', ",")).or_insert(reach);
        *entry = (*entry).max(reach);
    }

    pub fn reach(&self, name: &str, engine: Engine) -> Option<u64> {
        match engine {
            Engine::Google => self.google.get(name).copied(),
            Engine::Bing => self.bing.get(name).copied(),
        }
    }

    pub fn len(&self, engine: Engine) -> usize {
        match engine {
            Engine::Google => self.google.len(),
            Engine::Bing => self.bing.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlet::OutletKind;
    use tempfile::tempdir;

    fn outlet(name: &str, readers: u64, google: &str, bing: &str) -> NewsOutlet {
        let mut o = NewsOutlet::new(name, OutletKind::Newspaper);
        o.set_country("Peru");
        o.set_raw_readership(readers / 10);
        o.set_normalized_readership(readers);
        o.set_engine_name(Engine::Google, google);
        o.set_engine_name(Engine::Bing, bing);
        o
    }

    #[test]
    fn snapshot_round_trip_drops_document() {
        let dir = tempdir().unwrap();
        let mut first = outlet("Zeta", 100, "Zeta News", "");
        first.set_document("<html>large</html>".to_string());
        first.set_wiki_url("https://en.wikipedia.org/wiki/Zeta");
        first.set_last_edited("01 February 2021");
        let second = NewsOutlet::new("Alpha", OutletKind::TvChannel);

        let path = write_snapshot(dir.path(), 2, &[first.clone(), second.clone()]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n    {\n        \"bng_name\""));
        assert!(text.contains("\"page\": null"));
        assert!(!text.contains("large"));

        let back = read_snapshot(&path).unwrap();
        assert_eq!(back, vec![second, first]);
        assert!(back.iter().all(|o| o.document().is_none()));
    }

    #[test]
    fn malformed_snapshot_is_fatal() {
        let dir = tempdir().unwrap();
        let path = snapshot_path(dir.path(), 1);
        fs::write(&path, "[{\"name\": \"x\"").unwrap();
        let err = read_snapshot(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("NewsSiteDump1.json"));
    }

    #[test]
    fn latest_snapshot_picks_highest_stage() {
        let dir = tempdir().unwrap();
        assert!(latest_snapshot(dir.path()).unwrap().is_none());
        for stage in [1, 3, 2] {
            write_snapshot(dir.path(), stage, &[]).unwrap();
        }
        fs::write(dir.path().join("NewsSiteDump9.json"), "[]").unwrap();
        fs::write(dir.path().join("NewsSiteDumpX.json"), "[]").unwrap();
        let (stage, path) = latest_snapshot(dir.path()).unwrap().unwrap();
        assert_eq!(stage, 3);
        assert_eq!(path, snapshot_path(dir.path(), 3));
    }

    #[test]
    fn clearing_run_files_keeps_the_country_table() {
        let dir = tempdir().unwrap();
        for stage in [2, 5] {
            write_snapshot(dir.path(), stage, &[]).unwrap();
        }
        write_totals(dir.path(), &CountryTotals::new()).unwrap();
        fs::write(dir.path().join("Internet_TV_per_country.csv"), "Name,TV Name,Users,TV,Population\n").unwrap();

        assert_eq!(clear_run_files(dir.path()).unwrap(), 3);
        assert!(latest_snapshot(dir.path()).unwrap().is_none());
        assert!(!dir.path().join(TOTALS_FILE).exists());
        assert!(dir.path().join("Internet_TV_per_country.csv").exists());
        assert_eq!(clear_run_files(dir.path()).unwrap(), 0);
    }

    #[test]
    fn totals_round_trip_escapes_commas() {
        let dir = tempdir().unwrap();
        let totals: CountryTotals = vec![("Korea, South".to_string(), 40), ("Peru".to_string(), 7)].into_iter().collect();
        write_totals(dir.path(), &totals).unwrap();
        let text = fs::read_to_string(dir.path().join(TOTALS_FILE)).unwrap();
        assert_eq!(text, "country,number\nKorea~ South,40\nPeru,7\n");
        let back = read_totals(dir.path()).unwrap();
        assert_eq!(back.to_map(), totals.to_map());
    }

    #[test]
    fn lookup_rows_and_reach_table() {
        let dir = tempdir().unwrap();
        let queue = vec![
            outlet("a", 500, "Daily, Times", "Daily Times"),
            outlet("b", 900, "Daily, Times", ""),
            outlet("c", 300, "", "Other Post"),
            outlet("d", 100, "", ""),
        ];
        assert_eq!(write_lookup(dir.path(), &queue).unwrap(), 3);
        let text = fs::read_to_string(dir.path().join(LOOKUP_FILE)).unwrap();
        assert_eq!(
            text,
            "ggl_name,bng_name,reach\nDaily~ Times,Daily Times,500\nDaily~ Times,#,900\n#,Other Post,300\n"
        );

        let table = ReachTable::load(&dir.path().join(LOOKUP_FILE)).unwrap();
        assert_eq!(table.reach("Daily, Times", Engine::Google), Some(900));
        assert_eq!(table.reach("Daily Times", Engine::Bing), Some(500));
        assert_eq!(table.reach("Other Post", Engine::Bing), Some(300));
        assert_eq!(table.reach("#", Engine::Google), None);
        assert_eq!(table.reach("Other Post", Engine::Google), None);
        assert_eq!(table.len(Engine::Google), 1);
    }

    #[test]
    fn missing_lookup_file_explains_itself() {
        let dir = tempdir().unwrap();
        let err = ReachTable::load(&dir.path().join(LOOKUP_FILE)).unwrap_err();
        assert!(err.to_string().contains("create"));
    }
}
