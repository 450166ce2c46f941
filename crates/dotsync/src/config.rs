use std::path::{Component, Path, PathBuf};

/// Resolved locations for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory mirrored by the root tag
    pub home: PathBuf,
    /// JSON document backing the item store
    pub store_path: PathBuf,
}

impl Config {
    /// Resolve configuration from optional overrides (CLI flags or
    /// `DOTSYNC_HOME` / `DOTSYNC_STORE`), falling back to platform defaults.
    ///
    /// Both values support `~` for the user's home directory. Relative values
    /// are taken against `cwd`.
    pub fn resolve(home: Option<&str>, store: Option<&str>, cwd: &Path) -> Result<Self, ConfigError> {
        let home = match home {
            Some(home) if !home.is_empty() => absolute_path(home, cwd),
            _ => dirs::home_dir().ok_or(ConfigError::MissingHome)?,
        };
        if !home.is_dir() {
            return Err(ConfigError::HomeNotDirectory(home));
        }

        let store_path = match store {
            Some(store) if !store.is_empty() => absolute_path(store, cwd),
            _ => default_store_path()?,
        };

        Ok(Self { home, store_path })
    }
}

/// `<data dir>/dotsync/items.json`
pub fn default_store_path() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join("dotsync").join("items.json"))
        .ok_or(ConfigError::MissingDataDir)
}

/// Expand ~ or ~/ prefix to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

/// Make a command-line path absolute against `cwd`, folding `.` and `..`.
pub fn absolute_path(path: &str, cwd: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("home directory required: pass --home or set DOTSYNC_HOME")]
    MissingHome,

    #[error("home {} is not a directory", .0.display())]
    HomeNotDirectory(PathBuf),

    #[error("no data directory found: pass --store or set DOTSYNC_STORE")]
    MissingDataDir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_explicit_values() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path().to_str().unwrap();

        let config = Config::resolve(Some(home), Some("/tmp/items.json"), Path::new("/")).unwrap();
        assert_eq!(config.home, temp_dir.path());
        assert_eq!(config.store_path, PathBuf::from("/tmp/items.json"));
    }

    #[test]
    fn test_resolve_rejects_missing_home() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = Config::resolve(missing.to_str(), Some("/tmp/items.json"), temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::HomeNotDirectory(_)));
    }

    #[test]
    fn test_resolve_relative_values_against_cwd() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("h")).unwrap();

        let config = Config::resolve(Some("./h/"), Some("state/items.json"), temp_dir.path()).unwrap();
        assert!(config.home.is_absolute());
        assert_eq!(config.home, temp_dir.path().join("h"));
        assert_eq!(config.store_path, temp_dir.path().join("state/items.json"));
    }

    #[test]
    fn test_absolute_path() {
        let cwd = Path::new("/home/jo/.config");
        assert_eq!(absolute_path("fish", cwd), PathBuf::from("/home/jo/.config/fish"));
        assert_eq!(absolute_path("../.bashrc", cwd), PathBuf::from("/home/jo/.bashrc"));
        assert_eq!(absolute_path("./kitty/", cwd), PathBuf::from("/home/jo/.config/kitty"));
        assert_eq!(absolute_path("/etc/hosts", cwd), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_expand_tilde_leaves_other_paths() {
        assert_eq!(expand_tilde("/opt/dots"), PathBuf::from("/opt/dots"));
        assert_eq!(expand_tilde("~user/x"), PathBuf::from("~user/x"));
    }
}
