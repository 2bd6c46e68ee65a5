use std::env;
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "BIBSYNC_HOME";

/// Fallback `.env` locations, most specific first.
fn dotenv_candidates(bibsync_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(base) = bibsync_home {
        candidates.push(base.join(".env"));
    }
    if let Some(home) = home_dir {
        candidates.push(home.join(".bibsync").join(".env"));
    }
    candidates
}

fn load_first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .filter(|path| path.is_file())
        .find(|path| dotenvy::from_path(path).is_ok())
        .cloned()
}

/// Load one `.env` file: the working directory (or a parent) wins, then
/// `$BIBSYNC_HOME/.env`, then `~/.bibsync/.env`. Variables already present in
/// the process are never overwritten. Returns the file that was read.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        return Some(path);
    }
    let candidates = dotenv_candidates(
        env::var_os(HOME_ENV).map(PathBuf::from),
        dirs::home_dir(),
    );
    load_first_existing(&candidates)
}

pub fn describe(source: Option<&Path>) -> String {
    match source {
        Some(path) => path.display().to_string(),
        None => "none".to_string(),
    }
}
