use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PatroPaths {
    pub patro_home: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl PatroPaths {
    pub fn sync_lock_file(&self) -> PathBuf {
        self.data_dir.join(".sync.lock")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.logs_dir.join("audit.log")
    }
}

fn default_home() -> Result<PathBuf> {
    if let Some(data) = dirs::data_dir() {
        return Ok(data.join("patro"));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".patro"));
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}

pub fn resolve_paths() -> Result<PatroPaths> {
    let patro_home = match env_path("PATRO_HOME") {
        Some(home) => home,
        None => default_home()?,
    };
    let data_dir = env_path("PATRO_DATA_DIR").unwrap_or_else(|| patro_home.join("data"));
    let logs_dir = env_path("PATRO_LOGS_DIR").unwrap_or_else(|| patro_home.join("logs"));

    Ok(PatroPaths {
        patro_home,
        data_dir,
        logs_dir,
    })
}
