use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Frames run when neither the command line nor the config file says.
pub const DEFAULT_FRAMES: usize = 600;

/// Defaults for a headless run, read from a TOML file. Command line flags
/// take precedence over every field here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    pub bootrom: Option<PathBuf>,
    pub frames: Option<usize>,
    pub save_dir: Option<PathBuf>,
    pub serial: bool,
}

impl RunConfig {
    pub fn frames_or_default(&self) -> usize {
        self.frames.unwrap_or(DEFAULT_FRAMES)
    }
}

pub fn load_from_file(path: &Path) -> RunConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!(
                "Failed to read run config {}: {e}; using defaults",
                path.display()
            );
            return RunConfig::default();
        }
    };

    match toml::from_str::<RunConfig>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(
                "Failed to parse run config {}: {e}; using defaults",
                path.display()
            );
            RunConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frames = 30\nserial = true").unwrap();
        let cfg = load_from_file(file.path());
        assert_eq!(cfg.frames, Some(30));
        assert!(cfg.serial);
        assert_eq!(cfg.bootrom, None);
        assert_eq!(cfg.save_dir, None);
    }

    #[test]
    fn paths_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bootrom = \"dmg_boot.bin\"\nsave_dir = \"saves\"").unwrap();
        let cfg = load_from_file(file.path());
        assert_eq!(cfg.bootrom, Some(PathBuf::from("dmg_boot.bin")));
        assert_eq!(cfg.save_dir, Some(PathBuf::from("saves")));
        assert_eq!(cfg.frames_or_default(), DEFAULT_FRAMES);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_from_file(&dir.path().join("absent.toml"));
        assert_eq!(cfg, RunConfig::default());
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frames = \"lots\"").unwrap();
        assert_eq!(load_from_file(file.path()), RunConfig::default());
    }
}
