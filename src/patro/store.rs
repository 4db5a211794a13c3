use crate::error::PatroErrorCode;
use crate::patro::record::DayRecord;
use crate::patro::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

const FILE_PREFIX: &str = "calendar_";
const FILE_SUFFIX: &str = ".jsonl";

/// Records of one BS year keyed by Gregorian date.
pub type YearRecords = BTreeMap<String, DayRecord>;

#[derive(Debug, Clone, Default)]
pub struct LoadedYear {
    pub records: YearRecords,
    pub skipped_lines: usize,
}

/// One `calendar_{year}.jsonl` per BS year; every line is a standalone
/// `{"<gregorian_date>": <record>}` object.
#[derive(Debug, Clone)]
pub struct YearStore {
    root: PathBuf,
}

fn year_from_file_name(name: &str) -> Option<i32> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse::<i32>()
        .ok()
}

fn parse_line(line: &str) -> Result<Vec<(String, DayRecord)>> {
    let object: Map<String, Value> = serde_json::from_str(line)?;
    let mut out = Vec::with_capacity(object.len());
    for (key, value) in object {
        let record: DayRecord = serde_json::from_value(value)?;
        out.push((key, record));
    }
    Ok(out)
}

impl YearStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, year: i32) -> PathBuf {
        self.root.join(format!("{FILE_PREFIX}{year}{FILE_SUFFIX}"))
    }

    pub fn exists(&self, year: i32) -> bool {
        self.path_for(year).is_file()
    }

    /// BS years with a file on disk, ascending.
    pub fn years(&self) -> Result<Vec<i32>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut years = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("failed to read {}", self.root.display()))?
        {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(year) = entry.file_name().to_str().and_then(year_from_file_name) {
                years.push(year);
            }
        }
        years.sort_unstable();
        Ok(years)
    }

    /// Unreadable lines are reported and skipped; only a missing or
    /// unopenable file is an error.
    pub fn load(&self, year: i32) -> Result<LoadedYear> {
        let path = self.path_for(year);
        let file =
            fs::File::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
        let mut loaded = LoadedYear::default();
        let year_str = year.to_string();

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let parsed = line
                .map_err(anyhow::Error::from)
                .and_then(|line| {
                    if line.trim().is_empty() {
                        Ok(Vec::new())
                    } else {
                        parse_line(line.trim())
                    }
                });
            match parsed {
                Ok(entries) => loaded.records.extend(entries),
                Err(err) => {
                    loaded.skipped_lines += 1;
                    warn::emit(WarnEvent {
                        code: PatroErrorCode::E004StoreLine.as_str(),
                        stage: "store-load",
                        year: &year_str,
                        month: "",
                        retry: "skip-line",
                        reason: &format!("{}:{}", path.display(), line_no + 1),
                        err: &err.to_string(),
                    });
                }
            }
        }
        debug!(
            year,
            days = loaded.records.len(),
            skipped = loaded.skipped_lines,
            "loaded year file"
        );
        Ok(loaded)
    }

    /// Replaces the year file. Records go out one line each in date order,
    /// so an interrupted save leaves a readable prefix.
    pub fn save(&self, year: i32, records: &YearRecords) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.path_for(year);
        let file = fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (date, record) in records {
            let mut line = Map::new();
            line.insert(date.clone(), serde_json::to_value(record)?);
            serde_json::to_writer(&mut writer, &line)?;
            writer.write_all(b"\n")?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
