//! Path resolution for microdeploy
//!
//! # Environment Variables
//!
//! - `MICRODEPLOY_CONFIG_DIR` - Override config directory (holds `config.json`)
//! - `MICRODEPLOY_DATA_DIR` - Override data directory (holds extracted releases)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `MICRODEPLOY_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/microdeploy` (if set)
//! 3. `~/.config/microdeploy`
//!
//! For data_dir():
//! 1. `MICRODEPLOY_DATA_DIR` environment variable
//! 2. `XDG_DATA_HOME/microdeploy` (if set)
//! 3. `~/.local/share/microdeploy`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "MICRODEPLOY_CONFIG_DIR";

/// Environment variable for data directory override
pub const ENV_DATA_DIR: &str = "MICRODEPLOY_DATA_DIR";

const APP_DIR: &str = "microdeploy";

/// Where one of our directories comes from
struct DirSource<'a> {
    env_override: &'a str,
    xdg_var: &'a str,
    home_relative: &'a [&'a str],
}

const CONFIG_SOURCE: DirSource<'static> = DirSource {
    env_override: ENV_CONFIG_DIR,
    xdg_var: "XDG_CONFIG_HOME",
    home_relative: &[".config"],
};

const DATA_SOURCE: DirSource<'static> = DirSource {
    env_override: ENV_DATA_DIR,
    xdg_var: "XDG_DATA_HOME",
    home_relative: &[".local", "share"],
};

/// Get the microdeploy config directory path
pub fn config_dir() -> Result<PathBuf> {
    resolve_from_env(&CONFIG_SOURCE)
}

/// Get the microdeploy data directory path
pub fn data_dir() -> Result<PathBuf> {
    resolve_from_env(&DATA_SOURCE)
}

/// User config file (`config.json` in the config dir)
pub fn user_config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Directory that extracted CPI releases are cached in
pub fn releases_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("releases"))
}

fn resolve_from_env(source: &DirSource<'_>) -> Result<PathBuf> {
    let path = resolve(
        source,
        std::env::var(source.env_override).ok(),
        std::env::var(source.xdg_var).ok(),
        dirs::home_dir(),
    )
    .context("Could not determine home directory")?;
    log::debug!("Resolved {} to {}", source.env_override, path.display());
    Ok(path)
}

fn resolve(
    source: &DirSource<'_>,
    env_override: Option<String>,
    xdg: Option<String>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(dir) = env_override.filter(|d| !d.is_empty()) {
        return Some(expand_path(&dir));
    }

    if let Some(xdg) = xdg.filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(xdg).join(APP_DIR));
    }

    let mut path = home?;
    for segment in source.home_relative {
        path.push(segment);
    }
    path.push(APP_DIR);
    Some(path)
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).into_owned()),
    }
}

/// Make a user-supplied path absolute relative to the current directory
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    let expanded = expand_path(&path.to_string_lossy());
    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(expanded))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let path = resolve(
            &CONFIG_SOURCE,
            Some("/custom/config".to_string()),
            Some("/xdg".to_string()),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(path, Some(PathBuf::from("/custom/config")));
    }

    #[test]
    fn test_xdg_before_home() {
        let path = resolve(
            &DATA_SOURCE,
            None,
            Some("/xdg/data".to_string()),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(path, Some(PathBuf::from("/xdg/data/microdeploy")));
    }

    #[test]
    fn test_home_defaults() {
        let home = Some(PathBuf::from("/home/u"));
        assert_eq!(
            resolve(&CONFIG_SOURCE, None, None, home.clone()),
            Some(PathBuf::from("/home/u/.config/microdeploy"))
        );
        assert_eq!(
            resolve(&DATA_SOURCE, None, None, home),
            Some(PathBuf::from("/home/u/.local/share/microdeploy"))
        );
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let path = resolve(
            &CONFIG_SOURCE,
            Some(String::new()),
            Some(String::new()),
            Some(PathBuf::from("/home/u")),
        );
        assert_eq!(path, Some(PathBuf::from("/home/u/.config/microdeploy")));
    }

    #[test]
    fn test_no_home() {
        assert_eq!(resolve(&CONFIG_SOURCE, None, None, None), None);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_path("~/deployments");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("deployments"));
        }
    }

    #[test]
    fn test_absolutize_keeps_absolute() {
        assert_eq!(
            absolutize(Path::new("/tmp/manifest.yml")).unwrap(),
            PathBuf::from("/tmp/manifest.yml")
        );
    }

    #[test]
    fn test_absolutize_relative() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            absolutize(Path::new("manifest.yml")).unwrap(),
            cwd.join("manifest.yml")
        );
    }
}
