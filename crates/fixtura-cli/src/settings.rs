use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fixtura_generate::{GenerateOptions, LocaleKey, RelatedMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings file looked up in the working directory when `--config` is not
/// given.
pub const DEFAULT_SETTINGS_FILE: &str = "fixtura.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Output format of `fixtura generate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Contents of `fixtura.toml`. Every key is optional; command-line flags win
/// over the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixturaSettings {
    pub default_count: Option<usize>,
    pub seed: Option<u64>,
    pub related: Option<RelatedMode>,
    pub locale: Option<LocaleKey>,
    pub format: Option<OutputFormat>,
    pub max_relation_passes: Option<usize>,
    pub log_level: Option<String>,
    /// Seed instances per entity name.
    pub counts: BTreeMap<String, usize>,
}

impl FixturaSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load `explicit` when given, else `fixtura.toml` if present, else the
    /// defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(DEFAULT_SETTINGS_FILE);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|source| SettingsError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn generate_options(&self) -> GenerateOptions {
        let mut options = GenerateOptions::default();
        if let Some(count) = self.default_count {
            options.default_count = count;
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if let Some(related) = self.related {
            options.related = related;
        }
        if let Some(locale) = self.locale {
            options.locale = locale;
        }
        if let Some(passes) = self.max_relation_passes {
            options.max_relation_passes = passes;
        }
        options.counts = self.counts.clone();
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let settings = FixturaSettings::parse(
            r#"
default_count = 10
seed = 7
related = "reference"
locale = "pt_BR"
format = "csv"

[counts]
company = 2
"#,
            Path::new("fixtura.toml"),
        )
        .unwrap();
        assert_eq!(settings.format, Some(OutputFormat::Csv));

        let options = settings.generate_options();
        assert_eq!(options.default_count, 10);
        assert_eq!(options.seed, 7);
        assert_eq!(options.related, RelatedMode::Reference);
        assert_eq!(options.locale, LocaleKey::PtBr);
        assert_eq!(options.count_for("company"), 2);
        assert_eq!(options.max_relation_passes, 100);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FixturaSettings::parse("colour = \"blue\"", Path::new("fixtura.toml"));
        assert!(matches!(err, Err(SettingsError::Toml { .. })));
    }
}
