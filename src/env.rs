use std::env;
use std::fs;
use std::path::PathBuf;

const SETTINGS_FILE: &str = "settings.json";

/// Returns the root directory used by the updater for its settings and installs.
pub fn default_app_dir() -> PathBuf {
    let base = match env::consts::OS {
        "windows" => env::var_os("LOCALAPPDATA")
            .or_else(|| env::var_os("APPDATA"))
            .map(PathBuf::from),
        "macos" => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join("Library").join("Application Support")),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".local").join("share")),
    }
    .unwrap_or_else(|| PathBuf::from("."));

    base.join("addon-updater")
}

pub fn settings_path() -> PathBuf {
    default_app_dir().join(SETTINGS_FILE)
}

/// Default parent folder for add-ons that do not pin their own destination.
pub fn plugins_dir() -> PathBuf {
    default_app_dir().join("plugins")
}

/// Create the on-disk folder layout expected by the updater.
pub fn ensure_base_dirs() -> std::io::Result<()> {
    for dir in [default_app_dir(), plugins_dir()] {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_everything_under_app_dir() {
        let root = default_app_dir();
        assert!(root.ends_with("addon-updater"));
        assert!(settings_path().starts_with(&root));
        assert!(plugins_dir().starts_with(&root));
    }
}
