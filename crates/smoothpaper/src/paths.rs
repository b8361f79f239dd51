//! Config-file discovery and installation: `~` expansion, the XDG search
//! order, and the `--install-config` template writer.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories_next::BaseDirs;
use paperconfig::{candidate_paths, Settings, DEFAULT_CONFIG};

/// Expands a leading `~` or `~/` against the user's home directory.
pub fn expand_tilde(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    if path == Path::new("~") {
        return home.to_path_buf();
    }
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

pub fn home_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

fn xdg_config_home() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from)
}

/// Loads settings from the explicit override or the first config file in
/// the search order.
pub fn load_settings(overridden: Option<&Path>) -> Result<(Settings, PathBuf)> {
    if let Some(path) = overridden {
        let settings = Settings::load(path)
            .with_context(|| format!("failed to load config at {}", path.display()))?;
        return Ok((settings, path.to_path_buf()));
    }

    let home = home_dir();
    let candidates = candidate_paths(xdg_config_home().as_deref(), home.as_deref());
    for candidate in &candidates {
        if candidate.is_file() {
            let settings = Settings::load(candidate)
                .with_context(|| format!("failed to load config at {}", candidate.display()))?;
            return Ok((settings, candidate.clone()));
        }
    }

    bail!(
        "no config file found (searched {}); run `smoothpaper --install-config` to create one",
        candidates
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

/// Writes the default config template, refusing to overwrite an existing
/// file.
pub fn install_default_config() -> Result<PathBuf> {
    let base = xdg_config_home()
        .or_else(|| home_dir().map(|home| home.join(".config")))
        .ok_or_else(|| anyhow!("unable to determine a config directory"))?;
    let path = base.join("smoothpaper").join("smoothpaper.toml");

    if path.exists() {
        bail!("config file already exists at {}", path.display());
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("config path has no parent directory"))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    std::fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_against_home() {
        let home = Path::new("/home/user");
        assert_eq!(
            expand_tilde(Path::new("~/Pictures/walls"), Some(home)),
            PathBuf::from("/home/user/Pictures/walls")
        );
        assert_eq!(expand_tilde(Path::new("~"), Some(home)), PathBuf::from("/home/user"));
        assert_eq!(
            expand_tilde(Path::new("/absolute/path"), Some(home)),
            PathBuf::from("/absolute/path")
        );
    }

    #[test]
    fn tilde_without_home_is_left_alone() {
        assert_eq!(
            expand_tilde(Path::new("~/Pictures"), None),
            PathBuf::from("~/Pictures")
        );
    }

    #[test]
    fn explicit_config_override_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "delay = 42\n").unwrap();
        let (settings, used) = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.delay, std::time::Duration::from_secs(42));
        assert_eq!(used, path);
    }
}
