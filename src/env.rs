use std::path::Path;

use tracing::{debug, info};

const SECRETS_FILE: &str = ".secrets.env";

/// Loads the env files for the current profile so figment sees them as
/// `COACHFIT_*` variables. Missing files are skipped.
pub fn load_environment() -> Result<Vec<&'static str>, dotenvy::Error> {
    let profile = dotenvy::var("COACHFIT_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let env_files = if profile == "production" {
        ["config/common.env", "config/prod.env", SECRETS_FILE]
    } else {
        ["config/common.env", "config/dev.env", SECRETS_FILE]
    };

    let mut loaded = Vec::new();
    for env_file in env_files {
        if load_env_file(env_file)? {
            loaded.push(env_file);
        }
    }

    Ok(loaded)
}

fn load_env_file(path: &str) -> Result<bool, dotenvy::Error> {
    if !Path::new(path).exists() {
        debug!(path, "Environment file not found, skipping");
        return Ok(false);
    }

    dotenvy::from_filename_override(path)?;
    info!(path, "Loaded environment file");
    Ok(true)
}
