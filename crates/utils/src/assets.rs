use std::path::PathBuf;

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Directory for local state (config file, log files).
///
/// `WD_ASSET_DIR` overrides the location. Debug builds keep everything inside
/// the workspace so development never touches the real data dir.
pub fn asset_dir() -> PathBuf {
    let path = if let Ok(dir) = std::env::var("WD_ASSET_DIR") {
        PathBuf::from(dir)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("dev", "workdesk", "workdesk")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".workdesk"))
    };

    if !path.exists()
        && let Err(e) = std::fs::create_dir_all(&path)
    {
        tracing::warn!(path = ?path, error = %e, "Failed to create asset directory");
    }

    path
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}

pub fn log_dir() -> PathBuf {
    asset_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_inside_asset_dir() {
        let config = config_path();
        assert_eq!(config.file_name().unwrap(), "config.json");
        assert_eq!(config.parent().unwrap(), asset_dir());
    }
}
