//! Configuration management for smixer
//!
//! This module provides:
//! - The control table as a TOML `[[controls]]` list
//! - Application settings (device, normalized volume ranges)
//! - A factory default covering common codec control names
//! - A config manager with fallback and corrupt-file backup

use crate::domain::control::{Direction, Interface};
use crate::domain::element::ElementClass;
use crate::domain::mixer::{ControlKey, ControlTable, ElementDescriptor, Mixer};
use crate::domain::range::ValueRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "SMIXER_CONFIG";

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Normalized volume ranges applied to every element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback: Option<ValueRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<ValueRange>,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Control device identifier
    pub device: String,

    /// Range overrides; hardware ranges are used when absent
    #[serde(default)]
    pub range: RangeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            range: RangeConfig::default(),
        }
    }
}

/// One control table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMapping {
    /// Raw control name
    pub control: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default = "default_interface")]
    pub interface: Interface,
    /// Logical element name
    pub element: String,
    #[serde(default)]
    pub element_index: u32,
    pub weight: u32,
    pub class: ElementClass,
}

fn default_interface() -> Interface {
    Interface::Mixer
}

impl ControlMapping {
    pub fn new(control: &str, element: &str, weight: u32, class: ElementClass) -> Self {
        Self {
            control: control.to_string(),
            index: 0,
            interface: Interface::Mixer,
            element: element.to_string(),
            element_index: 0,
            weight,
            class,
        }
    }

    pub fn key(&self) -> ControlKey {
        ControlKey::new(self.control.clone(), self.index, self.interface)
    }

    pub fn descriptor(&self) -> ElementDescriptor {
        ElementDescriptor::new(self.element.clone(), self.element_index, self.weight, self.class)
    }
}

/// Complete smixer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmixerConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub controls: Vec<ControlMapping>,
}

impl SmixerConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!(controls = config.controls.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Reject duplicate keys and inverted ranges
    pub fn validate(&self) -> Result<()> {
        self.control_table().map(|_| ())?;
        for (dir, range) in [
            (Direction::Playback, self.app.range.playback),
            (Direction::Capture, self.app.range.capture),
        ] {
            if let Some(range) = range {
                if range.min > range.max {
                    return Err(ConfigError::Invalid(format!(
                        "{} range min {} > max {}",
                        dir, range.min, range.max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build the dispatcher lookup table
    pub fn control_table(&self) -> Result<ControlTable> {
        let mut table = ControlTable::new();
        for mapping in &self.controls {
            let key = mapping.key();
            if table.insert(key.clone(), mapping.descriptor()).is_some() {
                return Err(ConfigError::Invalid(format!("duplicate control '{}'", key)));
            }
        }
        Ok(table)
    }

    /// Build a mixer with this configuration's table and ranges
    pub fn build_mixer(&self) -> Result<Mixer> {
        let mut mixer = Mixer::new(self.control_table()?);
        if let Some(range) = self.app.range.playback {
            mixer = mixer.with_default_range(Direction::Playback, range);
        }
        if let Some(range) = self.app.range.capture {
            mixer = mixer.with_default_range(Direction::Capture, range);
        }
        Ok(mixer)
    }

    /// Factory default: common codec controls
    pub fn factory_default() -> Self {
        use ElementClass::{EnumCapture, EnumPlayback, Standard};

        let standard = [
            ("Master", 1),
            ("Headphone", 2),
            ("Master Mono", 3),
            ("Front", 10),
            ("Surround", 11),
            ("Center", 12),
            ("LFE", 13),
            ("PCM", 20),
            ("Line", 30),
            ("CD", 31),
            ("Mic", 32),
            ("Video", 33),
            ("Phone", 34),
            ("Aux", 35),
            ("PC Speaker", 36),
        ];

        let mut controls = Vec::new();
        for (name, weight) in standard {
            for suffix in ["Playback Volume", "Playback Switch"] {
                controls.push(ControlMapping::new(
                    &format!("{} {}", name, suffix),
                    name,
                    weight,
                    Standard,
                ));
            }
        }
        for control in ["Capture Volume", "Capture Switch"] {
            controls.push(ControlMapping::new(control, "Capture", 100, Standard));
        }
        controls.push(ControlMapping::new("Mic Capture Volume", "Mic", 32, Standard));
        controls.push(ControlMapping::new("Mic Capture Switch", "Mic", 32, Standard));
        controls.push(ControlMapping::new("Capture Source", "Capture Source", 110, EnumCapture));
        controls.push(ControlMapping::new(
            "Mono Output Select",
            "Mono Output Select",
            120,
            EnumPlayback,
        ));

        Self {
            app: AppConfig::default(),
            controls,
        }
    }
}

/// Manages the main config file at `~/.config/smixer/config.toml`
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Path from `SMIXER_CONFIG`, else the per-user default
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Ok(Self::new(PathBuf::from(path))),
            None => Ok(Self::new(Self::default_config_dir()?.join("config.toml"))),
        }
    }

    /// `~/.config/smixer` on Linux
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("smixer"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Load configuration from file
    ///
    /// A missing file yields the factory default. A corrupt file is backed
    /// up next to the original and also yields the factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> SmixerConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, using factory default"
            );
            return SmixerConfig::factory_default();
        }

        match SmixerConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                SmixerConfig::factory_default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &SmixerConfig) -> Result<()> {
        config.save_to_file(&self.config_path).await
    }
}
