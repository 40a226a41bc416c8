use std::{fs::create_dir_all, path::PathBuf};

use crate::failure::Failure;

/// Path to the config directory, created if missing.
pub fn config_dir() -> PathBuf {
    let dir = dirs::config_dir()
        .report_and_panic("The config directory could not be retrieved")
        .join("Capture Viewer");

    create_dir_all(&dir).report("Could not create the config directory");

    dir
}

/// The default directory captures are saved to, `Captures` under the pictures directory.
pub fn default_capture_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Captures")
}
