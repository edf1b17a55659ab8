//! Platform-specific data directory paths.
//!
//!   Windows: %APPDATA%/clapper
//!   macOS:   ~/Library/Application Support/clapper
//!   Linux:   $XDG_CONFIG_HOME/clapper (default ~/.config)

use std::path::PathBuf;

/// Get the clapper data directory (cross-platform).
pub fn get_data_dir() -> PathBuf {
    get_config_base().join("clapper")
}

/// Directory for rolling log files.
pub fn get_log_dir() -> PathBuf {
    get_data_dir().join("logs")
}

/// Get the platform-appropriate base config directory.
fn get_config_base() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata);
        }
        dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("AppData")
                .join("Roaming")
        })
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_is_under_data_dir() {
        let data = get_data_dir();
        assert!(data.ends_with("clapper"));
        assert!(get_log_dir().starts_with(&data));
    }
}
