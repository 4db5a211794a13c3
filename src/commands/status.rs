use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::patro::config::{load_config, resolve_config_path};
use crate::patro::paths::resolve_paths;
use crate::patro::store::YearStore;
use crate::patro::util::file_hash;

include!(concat!(env!("OUT_DIR"), "/patro_env_allowlist.rs"));

/// `PATRO_*` variables referenced by this build that are set right now.
fn active_env_overrides() -> Vec<&'static str> {
    GENERATED_PATRO_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some())
        .collect()
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("patro_home={}", paths.patro_home.display()));
    report.detail(format!("data_dir={}", paths.data_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    if let Some(path) = resolve_config_path() {
        report.detail(format!(
            "config_path={} exists={}",
            path.display(),
            path.exists()
        ));
    }
    let overrides = active_env_overrides();
    if !overrides.is_empty() {
        report.detail(format!("env_overrides={}", overrides.join(",")));
    }

    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            report.issue(format!("config invalid: {err:#}"));
            return Ok(report);
        }
    };
    report.detail(format!(
        "sync.range={}..={} force={}",
        cfg.sync.start_year, cfg.sync.end_year, cfg.sync.force
    ));
    report.detail(format!("source.url={}", cfg.source.base_url));
    report.detail(format!("extra_events={}", cfg.extra_events.len()));

    let store = YearStore::new(&paths.data_dir);
    let years = store.years()?;
    for year in &years {
        let loaded = store.load(*year)?;
        let hash = file_hash(&store.path_for(*year))?;
        report.detail(format!(
            "year={year} days={} skipped_lines={} sha256={hash}",
            loaded.records.len(),
            loaded.skipped_lines
        ));
        if loaded.skipped_lines > 0 {
            report.issue(format!(
                "year {year} has {} unreadable lines; re-sync with --force",
                loaded.skipped_lines
            ));
        }
    }

    let missing = (cfg.sync.start_year..=cfg.sync.end_year)
        .filter(|y| !years.contains(y))
        .map(|y| y.to_string())
        .collect::<Vec<_>>();
    if missing.is_empty() {
        report.detail("missing_years=none");
    } else {
        report.detail(format!("missing_years={}", missing.join(",")));
    }

    Ok(report)
}
