use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Errors raised while resolving the ShopKit home directory
#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("HOME environment variable is not set")]
    HomeMissing,
    #[error("APPDATA environment variable is not set")]
    AppDataMissing,
    #[error("home_dir must be an absolute path (after ~ expansion): {0}")]
    AbsoluteRequired(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Base directory used when no explicit home_dir is configured.
///
/// `%APPDATA%` on Windows, `$HOME` elsewhere.
fn platform_base() -> Result<PathBuf, HomeDirError> {
    if cfg!(target_os = "windows") {
        env::var("APPDATA")
            .map(PathBuf::from)
            .map_err(|_| HomeDirError::AppDataMissing)
    } else {
        env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| HomeDirError::HomeMissing)
    }
}

/// The user's home, used for `~` expansion.
fn user_home() -> Result<PathBuf, HomeDirError> {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| HomeDirError::HomeMissing)
}

fn expand_tilde(raw: &str) -> Result<PathBuf, HomeDirError> {
    if raw == "~" {
        return user_home();
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        return Ok(user_home()?.join(rest));
    }
    Ok(PathBuf::from(raw))
}

/// Resolve the home directory.
///
/// - `config_home` given: `~` is expanded, the result must be absolute.
/// - `config_home` absent: `<platform base>/<default_subdir>`.
///
/// With `create` the directory is created when missing.
pub fn resolve_home_dir(
    config_home: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = match config_home {
        Some(raw) => {
            let expanded = expand_tilde(&raw)?;
            if !expanded.is_absolute() {
                return Err(HomeDirError::AbsoluteRequired(
                    expanded.to_string_lossy().into(),
                ));
            }
            expanded
        }
        None => Path::new(&platform_base()?).join(default_subdir),
    };

    if create {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}
