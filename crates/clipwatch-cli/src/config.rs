use clipwatch_core::detect::ClipDetectorConfig;
use clipwatch_core::detect::scoring::{ScoringConfig, ScoringWeights};
use clipwatch_core::matcher::default_categories;
use clipwatch_core::source::irc::{DEFAULT_HOST, DEFAULT_PORT};
use clipwatch_core::source::vod::DEFAULT_CLIENT_ID;
use clipwatch_core::types::KeywordCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HOME is unset; cannot locate ~/.clipwatch")]
    NoHome,

    #[error("could not read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("could not write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("{} is not a valid clipwatch config: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("config could not be rendered as TOML: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("could not run the editor: {0}")]
    Editor(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ConfigPaths {
    pub fn from_home() -> Result<Self, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
        Ok(Self::from_base(PathBuf::from(home).join(".clipwatch")))
    }

    pub fn from_base(base_dir: PathBuf) -> Self {
        let config_path = base_dir.join("config.toml");
        Self {
            base_dir,
            config_path,
        }
    }

    /// Explicit config file location (`--config`).
    pub fn from_file(config_path: PathBuf) -> Self {
        let base_dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            base_dir,
            config_path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub detector: DetectorSection,
    pub scoring: ScoringSection,
    pub matcher: MatcherSection,
    pub keywords: Vec<KeywordCategory>,
    pub irc: IrcSection,
    pub vod: VodSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            detector: DetectorSection::default(),
            scoring: ScoringSection::default(),
            matcher: MatcherSection::default(),
            keywords: default_categories(),
            irc: IrcSection::default(),
            vod: VodSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSection {
    pub clip_duration_s: u64,
    pub lookback_s: u64,
    pub cooldown_s: u64,
    pub min_score: f64,
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            clip_duration_s: 60,
            lookback_s: 30,
            cooldown_s: 30,
            min_score: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub spike_weight: f64,
    pub keyword_weight: f64,
    pub uniqueness_weight: f64,
    pub min_clip_score: f64,
    /// Reserved for keyword-density gating; carried but not consulted.
    pub keyword_threshold: f64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            spike_weight: 0.4,
            keyword_weight: 0.5,
            uniqueness_weight: 0.1,
            min_clip_score: 0.7,
            keyword_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSection {
    pub similarity_threshold: f64,
}

impl Default for MatcherSection {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IrcSection {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub oauth: String,
}

impl Default for IrcSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: String::new(),
            oauth: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VodSection {
    pub client_id: String,
}

impl Default for VodSection {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
        }
    }
}

impl Config {
    /// Load the config, creating it with defaults on first run.
    pub fn load_or_create(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        if !paths.config_path.exists() {
            let config = Self::default();
            config.store(paths)?;
            return Ok(config);
        }
        Self::load(paths)
    }

    pub fn load(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        let path = &paths.config_path;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::Malformed {
                path: path.clone(),
                source,
            })?;

        warn_if_token_exposed(path, &config);

        if config.version < CONFIG_VERSION {
            // Older files gain any new sections as defaults; persist the
            // upgraded form so the on-disk file stays complete.
            config.version = CONFIG_VERSION;
            config.store(paths)?;
        } else if config.version > CONFIG_VERSION {
            tracing::warn!(
                file_version = config.version,
                supported = CONFIG_VERSION,
                "config was written by a newer clipwatch; unknown settings are ignored"
            );
        }

        Ok(config)
    }

    /// Render and atomically replace the on-disk file. The file can hold
    /// the IRC oauth token, so it is created owner-only.
    pub fn store(&self, paths: &ConfigPaths) -> Result<(), ConfigError> {
        fs::create_dir_all(&paths.base_dir).map_err(|source| ConfigError::Write {
            path: paths.base_dir.clone(),
            source,
        })?;

        let rendered = toml::to_string_pretty(self)?;
        let path = &paths.config_path;
        let staging = path.with_extension("toml.new");

        fs::write(&staging, rendered).map_err(|source| ConfigError::Write {
            path: staging.clone(),
            source,
        })?;
        restrict_to_owner(&staging).map_err(|source| ConfigError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, path).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Copy safe for printing: the oauth token is masked.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        if !masked.irc.oauth.is_empty() {
            masked.irc.oauth = "*****".to_string();
        }
        masked
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("detector.clip_duration_s", self.detector.clip_duration_s),
            ("detector.lookback_s", self.detector.lookback_s),
            ("detector.cooldown_s", self.detector.cooldown_s),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be greater than 0"
                )));
            }
        }
        if self.detector.lookback_s > self.detector.clip_duration_s {
            return Err(ConfigError::Invalid(
                "detector.lookback_s must not exceed detector.clip_duration_s".into(),
            ));
        }
        for (key, value) in [
            ("detector.min_score", self.detector.min_score),
            ("scoring.min_clip_score", self.scoring.min_clip_score),
            ("scoring.keyword_threshold", self.scoring.keyword_threshold),
            (
                "matcher.similarity_threshold",
                self.matcher.similarity_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be between 0 and 1"
                )));
            }
        }
        for (key, value) in [
            ("scoring.spike_weight", self.scoring.spike_weight),
            ("scoring.keyword_weight", self.scoring.keyword_weight),
            ("scoring.uniqueness_weight", self.scoring.uniqueness_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be non-negative"
                )));
            }
        }

        let mut names = HashSet::new();
        for category in &self.keywords {
            if category.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "keywords entries must have a name".into(),
                ));
            }
            if !names.insert(category.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate keyword category: {}",
                    category.name
                )));
            }
            if category.keywords.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "keyword category {} has no keywords",
                    category.name
                )));
            }
            if !category.weight.is_finite() || category.weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "keyword category {} weight must be non-negative",
                    category.name
                )));
            }
        }

        if self.irc.host.trim().is_empty() {
            return Err(ConfigError::Invalid("irc.host must not be empty".into()));
        }
        if self.irc.port == 0 {
            return Err(ConfigError::Invalid(
                "irc.port must be greater than 0".into(),
            ));
        }
        if self.vod.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "vod.client_id must not be empty".into(),
            ));
        }

        Ok(())
    }

    pub fn detector_config(&self) -> ClipDetectorConfig {
        ClipDetectorConfig {
            clip_duration_secs: self.detector.clip_duration_s,
            lookback_secs: self.detector.lookback_s,
            cooldown_secs: self.detector.cooldown_s,
            min_score: self.detector.min_score,
        }
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            weights: ScoringWeights {
                spike_weight: self.scoring.spike_weight,
                keyword_weight: self.scoring.keyword_weight,
                uniqueness_weight: self.scoring.uniqueness_weight,
            },
            min_clip_score: self.scoring.min_clip_score,
            keyword_threshold: self.scoring.keyword_threshold,
        }
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// A stored oauth token deserves an owner-only file; anything looser gets
/// flagged on every load.
#[cfg(unix)]
fn warn_if_token_exposed(path: &Path, config: &Config) {
    use std::os::unix::fs::PermissionsExt;

    if config.irc.oauth.trim().is_empty() {
        return;
    }
    let Ok(metadata) = fs::metadata(path) else {
        return;
    };
    if metadata.permissions().mode() & 0o077 != 0 {
        tracing::warn!(
            path = %path.display(),
            "config holds an oauth token but is readable by other users; chmod 600 it"
        );
    }
}

#[cfg(not(unix))]
fn warn_if_token_exposed(_path: &Path, _config: &Config) {}
