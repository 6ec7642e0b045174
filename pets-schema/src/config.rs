use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::SchemaError;
use crate::schema::DATABASE_NAME;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "pets-schema.toml";

/// Configuration stored in `pets-schema.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mongodb: MongoSettings,
    #[serde(default)]
    pub migrations: MigrationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MongoSettings {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            app_name: default_app_name(),
        }
    }
}

fn default_uri() -> String {
    "${MONGODB_URI:-mongodb://localhost:27017}".to_string()
}

fn default_database() -> String {
    DATABASE_NAME.to_string()
}

fn default_app_name() -> String {
    "pets-schema".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSettings {
    #[serde(default = "default_history_collection")]
    pub history_collection: String,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            history_collection: default_history_collection(),
        }
    }
}

fn default_history_collection() -> String {
    "_migrations".to_string()
}

impl Settings {
    /// Load settings from `path`, or from `pets-schema.toml` in the current
    /// directory when it exists, and expand environment references.
    pub fn load(path: Option<&Path>) -> Result<Self, SchemaError> {
        let path: PathBuf = match path {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let settings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| SchemaError::config(format!("failed to read {}: {e}", path.display())))?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        settings.resolved()
    }

    pub fn from_toml(content: &str) -> Result<Self, SchemaError> {
        toml::from_str(content).map_err(|e| SchemaError::config(format!("failed to parse config: {e}")))
    }

    /// Apply command-line overrides on top of file settings.
    pub fn with_overrides(mut self, uri: Option<String>, database: Option<String>) -> Self {
        if let Some(uri) = uri {
            self.mongodb.uri = uri;
        }
        if let Some(database) = database {
            self.mongodb.database = database;
        }
        self
    }

    /// Copy with every `${VAR}` reference expanded.
    pub fn resolved(&self) -> Result<Self, SchemaError> {
        Ok(Self {
            mongodb: self.mongodb.resolved()?,
            migrations: MigrationSettings {
                history_collection: expand_env(&self.migrations.history_collection)?,
            },
        })
    }
}

impl MongoSettings {
    /// Copy with every `${VAR}` reference expanded.
    pub fn resolved(&self) -> Result<Self, SchemaError> {
        Ok(Self {
            uri: expand_env(&self.uri)?,
            database: expand_env(&self.database)?,
            app_name: expand_env(&self.app_name)?,
        })
    }
}

/// Expands a whole-value `${VAR}` or `${VAR:-default}` reference.
pub fn expand_env(value: &str) -> Result<String, SchemaError> {
    let Some(inner) = value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) else {
        return Ok(value.to_string());
    };

    let (name, fallback) = match inner.split_once(":-") {
        Some((name, fallback)) => (name, Some(fallback)),
        None => (inner, None),
    };

    match (std::env::var(name), fallback) {
        (Ok(found), _) if !found.is_empty() => Ok(found),
        (_, Some(fallback)) => Ok(fallback.to_string()),
        _ => Err(SchemaError::config(format!("environment variable {name} not set"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let settings = Settings::default();
        assert_eq!(settings.mongodb.database, "pets_search");
        assert_eq!(settings.mongodb.uri, "${MONGODB_URI:-mongodb://localhost:27017}");
        assert_eq!(settings.migrations.history_collection, "_migrations");
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string_pretty(&Settings::default()).unwrap();
        assert!(toml_str.contains("history_collection"));
        assert!(toml_str.contains("pets_search"));
    }

    #[test]
    fn literal_values_are_not_expanded() {
        assert_eq!(expand_env("mongodb://db:27017").unwrap(), "mongodb://db:27017");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let value = expand_env("${PETS_SCHEMA_TEST_SURELY_UNSET_VAR:-mongodb://fallback:27017}").unwrap();
        assert_eq!(value, "mongodb://fallback:27017");
    }

    #[test]
    fn missing_variable_without_default_is_an_error() {
        let err = expand_env("${PETS_SCHEMA_TEST_SURELY_UNSET_VAR}").unwrap_err();
        assert!(err.to_string().contains("PETS_SCHEMA_TEST_SURELY_UNSET_VAR"));
    }

    #[test]
    fn loads_partial_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mongodb]\nuri = \"mongodb://db.internal:27017\"").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.mongodb.uri, "mongodb://db.internal:27017");
        assert_eq!(settings.mongodb.database, "pets_search");
        assert_eq!(settings.migrations.history_collection, "_migrations");
    }

    #[test]
    fn default_uri_resolves_to_a_connection_string() {
        let expected = std::env::var("MONGODB_URI")
            .ok()
            .filter(|uri| !uri.is_empty())
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());

        let resolved = Settings::default().resolved().unwrap();
        assert_eq!(resolved.mongodb.uri, expected);
        assert_eq!(resolved.mongodb.database, "pets_search");
    }

    #[test]
    fn every_field_is_expanded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[mongodb]\napp_name = \"${{PETS_SCHEMA_TEST_SURELY_UNSET_APP:-pets-schema-ci}}\"\n\
             [migrations]\nhistory_collection = \"${{PETS_SCHEMA_TEST_SURELY_UNSET_HISTORY:-_schema_history}}\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.mongodb.app_name, "pets-schema-ci");
        assert_eq!(settings.migrations.history_collection, "_schema_history");
    }

    #[test]
    fn bundled_sample_matches_defaults() {
        let sample = Settings::from_toml(include_str!("../pets-schema.toml")).unwrap();
        assert_eq!(sample, Settings::default());
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = Settings::from_toml("[mongodb\nuri = 1").unwrap_err();
        assert!(matches!(err, SchemaError::Config { .. }));
    }

    #[test]
    fn overrides_replace_file_values() {
        let settings = Settings::default().with_overrides(None, Some("pets_search_test".to_string()));
        assert_eq!(settings.mongodb.database, "pets_search_test");
        assert_eq!(settings.mongodb.uri, default_uri());
    }
}
