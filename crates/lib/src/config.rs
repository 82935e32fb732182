use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FILE_NAME: &str = "trellis.yaml";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read config file ({path}): {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file ({path}): {source}")]
    Parse {
        path: Utf8PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Invalid config: {message}")]
    Validation { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub per_page: usize,
    pub feed_limit: usize,
    /// Best-page candidates scoring below this are never chosen.
    pub min_page_score: Option<i64>,
    pub types: HashMap<String, TypeConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            per_page: 10,
            feed_limit: 50,
            min_page_score: None,
            types: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypeConfig {
    /// Container page types that can host items of this type.
    pub pages: Vec<String>,
    #[serde(rename = "match")]
    pub matching: MatchRule,
    pub permalink: PermalinkStyle,
    pub facets: Vec<String>,
    pub schema: Vec<SchemaField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "lowercase")]
pub enum MatchRule {
    #[default]
    Tags,
    Property {
        property: String,
    },
    /// Pages list member ids under `property`; the item matches by its own id.
    Id {
        property: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum PermalinkStyle {
    #[default]
    Slug,
    Dated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Item type a join field points at.
    #[serde(default)]
    pub with_type: Option<String>,
    /// Field on the item holding the joined ids.
    #[serde(default)]
    pub ids_field: Option<String>,
}

impl Config {
    #[must_use]
    pub fn type_config(&self, kind: &str) -> Option<&TypeConfig> {
        self.types.get(kind)
    }

    #[must_use]
    pub fn page_types(&self, kind: &str) -> &[String] {
        self.type_config(kind).map_or(&[], |t| t.pages.as_slice())
    }

    #[must_use]
    pub fn schema(&self, kind: &str) -> &[SchemaField] {
        self.type_config(kind).map_or(&[], |t| t.schema.as_slice())
    }
}

pub fn load(path: &Utf8Path) -> Result<Config, Error> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_owned(),
        source,
    })?;

    let mut config: Config = serde_yaml::from_str(&raw).map_err(|source| Error::Parse {
        path: path.to_owned(),
        source,
    })?;

    normalize(&mut config);

    validate(&config)?;

    Ok(config)
}

/// Loads `trellis.yaml` from `dir`, falling back to defaults when the file is absent.
pub fn load_from_dir(dir: &Utf8Path) -> Result<Config, Error> {
    let path = dir.join(FILE_NAME);
    if !path.is_file() {
        debug!("No {FILE_NAME} in {dir}; using defaults");
        return Ok(Config::default());
    }
    load(&path)
}

fn normalize(config: &mut Config) {
    for type_config in config.types.values_mut() {
        type_config.pages.sort();
        type_config.pages.dedup();
        type_config.facets.sort();
        type_config.facets.dedup();
    }
}

pub fn validate(config: &Config) -> Result<(), Error> {
    if config.per_page == 0 {
        return Err(Error::Validation {
            message: "per_page must be greater than zero.".to_string(),
        });
    }
    if config.feed_limit == 0 {
        return Err(Error::Validation {
            message: "feed_limit must be greater than zero.".to_string(),
        });
    }

    for (kind, type_config) in &config.types {
        if kind.trim().is_empty() {
            return Err(Error::Validation {
                message: "types keys must be non-empty.".to_string(),
            });
        }
        match &type_config.matching {
            MatchRule::Property { property } | MatchRule::Id { property }
                if property.trim().is_empty() =>
            {
                return Err(Error::Validation {
                    message: format!("types.{kind}.match.property must be non-empty."),
                });
            }
            _ => {}
        }
        for field in &type_config.schema {
            if field.kind == "join" && (field.with_type.is_none() || field.ids_field.is_none()) {
                return Err(Error::Validation {
                    message: format!(
                        "types.{kind}.schema.{} is a join and needs withType and idsField.",
                        field.name
                    ),
                });
            }
        }
    }

    Ok(())
}
