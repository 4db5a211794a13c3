use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(patro_home: Option<PathBuf>, data_dir: Option<PathBuf>) -> Option<PathBuf> {
    let base = patro_home.or_else(|| data_dir.map(|d| d.join("patro")))?;
    Some(base.join(".env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("PATRO_HOME").map(PathBuf::from),
        dirs::data_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
