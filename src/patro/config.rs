use crate::error::PatroError;
use crate::patro::rules::ExtraEventRule;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_SOURCE_URL: &str = "https://www.ashesh.com.np/nepali-calendar/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub force: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_year: 2070,
            end_year: 2090,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Sleep before every request.
    pub pacing_ms: u64,
    /// Sleep after every month, whatever its outcome.
    pub month_gap_ms: u64,
    pub retry_cooldown_ms: u64,
    pub max_attempts: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SOURCE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 15,
            pacing_ms: 2_000,
            month_gap_ms: 1_000,
            retry_cooldown_ms: 5_000,
            max_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatroConfig {
    pub sync: SyncConfig,
    pub source: SourceConfig,
    pub extra_events: Vec<ExtraEventRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialPatroConfig {
    sync: Option<SyncConfig>,
    source: Option<SourceConfig>,
    extra_events: Option<Vec<ExtraEventRule>>,
}

fn env_or_i32(var: &str, fallback: i32) -> i32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<i32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => {
            let trimmed = v.trim();
            match trimmed {
                "1" | "true" | "TRUE" | "yes" | "on" => true,
                "0" | "false" | "FALSE" | "no" | "off" => false,
                _ => fallback,
            }
        }
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

pub fn validate(cfg: &PatroConfig) -> Result<()> {
    if cfg.sync.start_year > cfg.sync.end_year {
        return Err(anyhow!(
            "invalid sync range: start year {} is after end year {}",
            cfg.sync.start_year,
            cfg.sync.end_year
        ));
    }
    if cfg.source.base_url.trim().is_empty() {
        return Err(anyhow!("invalid source url: cannot be empty"));
    }
    if cfg.source.timeout_secs == 0 {
        return Err(anyhow!("invalid source timeout: must be >= 1 second"));
    }
    if cfg.source.max_attempts == 0 {
        return Err(anyhow!("invalid max attempts: must be >= 1"));
    }
    for rule in &cfg.extra_events {
        if rule.lunar_month_index >= 12 {
            return Err(anyhow!(
                "invalid extra event `{}`: month index must be 0..=11",
                rule.label
            ));
        }
        if !(1..=32).contains(&rule.lunar_day) {
            return Err(anyhow!(
                "invalid extra event `{}`: day must be 1..=32",
                rule.label
            ));
        }
        if rule.label.trim().is_empty() {
            return Err(anyhow!("invalid extra event: label cannot be empty"));
        }
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("PATRO_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let base = dirs::config_dir().or_else(|| dirs::home_dir().map(|h| h.join(".config")))?;
    Some(base.join("patro").join("patro.toml"))
}

fn merge_file_config(base: &mut PatroConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: PartialPatroConfig = toml::from_str(&raw).map_err(|err| {
        PatroError::InvalidConfig(format!("failed to parse {}: {err}", path.display()))
    })?;
    if let Some(sync) = parsed.sync {
        base.sync = sync;
    }
    if let Some(source) = parsed.source {
        base.source = source;
    }
    if let Some(extra_events) = parsed.extra_events {
        base.extra_events = extra_events;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut PatroConfig) {
    cfg.sync.start_year = env_or_i32("PATRO_SYNC_START_YEAR", cfg.sync.start_year);
    cfg.sync.end_year = env_or_i32("PATRO_SYNC_END_YEAR", cfg.sync.end_year);
    cfg.sync.force = env_or_bool("PATRO_SYNC_FORCE", cfg.sync.force);
    cfg.source.base_url = env_or_string("PATRO_SOURCE_URL", &cfg.source.base_url);
    cfg.source.user_agent = env_or_string("PATRO_USER_AGENT", &cfg.source.user_agent);
    cfg.source.timeout_secs = env_or_u64("PATRO_TIMEOUT_SECS", cfg.source.timeout_secs);
    cfg.source.pacing_ms = env_or_u64("PATRO_PACING_MS", cfg.source.pacing_ms);
    cfg.source.month_gap_ms = env_or_u64("PATRO_MONTH_GAP_MS", cfg.source.month_gap_ms);
    cfg.source.retry_cooldown_ms =
        env_or_u64("PATRO_RETRY_COOLDOWN_MS", cfg.source.retry_cooldown_ms);
    cfg.source.max_attempts = env_or_u32("PATRO_MAX_ATTEMPTS", cfg.source.max_attempts);
}

pub fn load_config() -> Result<PatroConfig> {
    let mut cfg = PatroConfig::default();
    merge_file_config(&mut cfg)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PatroConfig::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.sync.start_year, 2070);
        assert_eq!(cfg.sync.end_year, 2090);
        assert!(cfg.source.retry_cooldown_ms > cfg.source.pacing_ms);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut cfg = PatroConfig::default();
        cfg.sync.start_year = 2085;
        cfg.sync.end_year = 2080;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn out_of_range_rule_is_rejected() {
        let mut cfg = PatroConfig::default();
        cfg.extra_events.push(ExtraEventRule {
            lunar_year: None,
            lunar_month_index: 12,
            lunar_day: 1,
            label: "x".into(),
        });
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let raw = r#"
            [source]
            pacing_ms = 0

            [[extra_events]]
            lunar_month_index = 2
            lunar_day = 11
            label = "Birthday"
        "#;
        let parsed: PartialPatroConfig = toml::from_str(raw).expect("toml");
        let mut cfg = PatroConfig::default();
        if let Some(source) = parsed.source {
            cfg.source = source;
        }
        if let Some(rules) = parsed.extra_events {
            cfg.extra_events = rules;
        }
        assert!(parsed.sync.is_none());
        assert_eq!(cfg.source.pacing_ms, 0);
        assert_eq!(cfg.source.timeout_secs, 15);
        assert_eq!(cfg.extra_events[0].lunar_year, None);
        assert!(validate(&cfg).is_ok());
    }
}
