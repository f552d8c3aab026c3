use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_FRAMES: u32 = 60;

/// Settings read from the optional `--config` TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    pub frames: u32,
    pub screenshot: Option<PathBuf>,
    pub save_ram: bool,
    pub log_filter: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            screenshot: None,
            save_ram: true,
            log_filter: None,
        }
    }
}

pub fn parse(text: &str) -> Result<RunConfig, toml::de::Error> {
    toml::from_str(text)
}

/// A missing or unreadable file yields the defaults; a malformed one is an error.
pub fn load_from_file(path: &Path) -> Result<RunConfig, toml::de::Error> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse(&text),
        Err(_) => Ok(RunConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse("").unwrap(), RunConfig::default());
    }

    #[test]
    fn keys_are_kebab_case() {
        let cfg = parse(
            r#"
            frames = 3
            screenshot = "out.png"
            save-ram = false
            log-filter = "tickboy_core=trace"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.frames, 3);
        assert_eq!(cfg.screenshot, Some(PathBuf::from("out.png")));
        assert!(!cfg.save_ram);
        assert_eq!(cfg.log_filter.as_deref(), Some("tickboy_core=trace"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = parse("frames = 10").unwrap();
        assert_eq!(cfg.frames, 10);
        assert!(cfg.save_ram);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(parse("frames = \"many\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, RunConfig::default());
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "frames = 7\nsave-ram = false\n").unwrap();
        let cfg = load_from_file(&path).unwrap();
        assert_eq!(cfg.frames, 7);
        assert!(!cfg.save_ram);
    }
}
