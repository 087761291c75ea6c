use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub render: RenderConfig,
    pub external: ExternalConfig,
    pub captions: CaptionsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Public base URL that relative storage paths hang off
    pub base_url: String,
    /// Local directory backing `<base_url>/storage/`
    pub storage_path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Native,
    External,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderConfig {
    pub backend: BackendKind,
    pub resolution: String, // "1920x1080"
    pub fps: u32,
    pub output_dir: PathBuf,
    /// Frame workers; 0 means one per CPU
    pub threads: usize,
    pub keep_frames: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExternalConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptionsConfig {
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                base_url: "http://localhost:3001".to_string(),
                storage_path: PathBuf::from("storage"),
            },
            render: RenderConfig {
                backend: BackendKind::Native,
                resolution: "1920x1080".to_string(),
                fps: 30,
                output_dir: PathBuf::from("storage/renders"),
                threads: 0,
                keep_frames: false,
            },
            external: ExternalConfig {
                program: "node".to_string(),
                args: vec!["renderer/render.js".to_string()],
                timeout_secs: 30 * 60,
            },
            captions: CaptionsConfig {
                fetch_timeout_secs: 10,
            },
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl RenderConfig {
    /// Parse `WIDTHxHEIGHT`, defaulting to 1080p
    pub fn dimensions(&self) -> (u32, u32) {
        parse_resolution(&self.resolution).unwrap_or((1920, 1080))
    }

    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.threads
        }
    }
}

pub fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Defaults, then `storyreel.*` (or `file`), then `STORYREEL_*` env vars
    pub fn load_from(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("storage.base_url", defaults.storage.base_url)?
            .set_default("storage.storage_path", "storage")?
            .set_default("render.backend", "native")?
            .set_default("render.resolution", defaults.render.resolution)?
            .set_default("render.fps", defaults.render.fps as i64)?
            .set_default("render.output_dir", "storage/renders")?
            .set_default("render.threads", 0i64)?
            .set_default("render.keep_frames", false)?
            .set_default("external.program", defaults.external.program)?
            .set_default("external.args", defaults.external.args)?
            .set_default("external.timeout_secs", defaults.external.timeout_secs as i64)?
            .set_default(
                "captions.fetch_timeout_secs",
                defaults.captions.fetch_timeout_secs as i64,
            )?
            .set_default("log.level", defaults.log.level)?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("storyreel").required(false)),
        };

        // e.g. STORYREEL_RENDER__FPS=60
        builder
            .add_source(
                config::Environment::with_prefix("STORYREEL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.render.dimensions(), (1920, 1080));
        assert_eq!(cfg.render.fps, 30);
        assert!(cfg.render.worker_threads() >= 1);
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1280x720"), Some((1280, 720)));
        assert_eq!(parse_resolution(" 640 X 480 "), Some((640, 480)));
        assert_eq!(parse_resolution("0x720"), None);
        assert_eq!(parse_resolution("wide"), None);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[render]\nfps = 24\nresolution = \"1280x720\"\nbackend = \"external\"\n\n[storage]\nbase_url = \"https://api.example.com\""
        )
        .unwrap();

        let cfg = AppConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(cfg.render.fps, 24);
        assert_eq!(cfg.render.dimensions(), (1280, 720));
        assert_eq!(cfg.render.backend, BackendKind::External);
        assert_eq!(cfg.storage.base_url, "https://api.example.com");
        // untouched sections keep their defaults
        assert_eq!(cfg.external.program, "node");
        assert_eq!(cfg.captions.fetch_timeout_secs, 10);
    }

    #[test]
    fn test_to_toml() {
        let text = AppConfig::default().to_toml().unwrap();
        assert!(text.contains("[render]"));
        assert!(text.contains("fps = 30"));
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.render.fps, 30);
    }
}
