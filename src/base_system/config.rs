//! YAML config loading with defaults merge and commented template generation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    fn fields() -> &'static [FieldMeta];
}

/// Result of [`load_or_create`]: the parsed config and where it came from.
#[derive(Debug)]
pub struct Loaded<T> {
    pub config: T,
    pub path: PathBuf,
    /// `true` when the file did not exist and a commented template was written.
    pub created: bool,
}

/// Load a config file, writing a commented default template if it is missing.
///
/// # Path resolution
/// - `config_path` given: used as-is (`base_dir` is ignored)
/// - otherwise `base_dir/FILE_NAME`, or `FILE_NAME` in the working directory
///
/// User values are merged over the serialized defaults, so keys left out of
/// the file keep their default values.
pub fn load_or_create<T: ConfigSpec>(
    config_path: Option<&Path>,
    base_dir: Option<&Path>,
) -> Result<Loaded<T>, ConfigError> {
    let path = resolve_path::<T>(config_path, base_dir);

    if !path.exists() {
        let config = T::default();
        write_with_comments(&config, &path)?;
        return Ok(Loaded {
            config,
            path,
            created: true,
        });
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = parse_merged::<T>(&raw).map_err(|err| match err {
        ParseFailure::Yaml(source) => ConfigError::Parse {
            path: path.clone(),
            source,
        },
        ParseFailure::Shape(msg) => ConfigError::Validation(msg),
    })?;

    Ok(Loaded {
        config,
        path,
        created: false,
    })
}

enum ParseFailure {
    Yaml(serde_yaml::Error),
    Shape(String),
}

fn parse_merged<T: ConfigSpec>(raw: &str) -> Result<T, ParseFailure> {
    let user_yaml: Value = serde_yaml::from_str(raw).map_err(ParseFailure::Yaml)?;
    // an empty file parses as null; treat it as "all defaults"
    if user_yaml.is_null() {
        return Ok(T::default());
    }

    let mut merged =
        serde_yaml::to_value(T::default()).map_err(|err| ParseFailure::Shape(err.to_string()))?;
    merge_values(&mut merged, user_yaml);
    serde_yaml::from_value(merged).map_err(|err| ParseFailure::Shape(err.to_string()))
}

pub fn write_with_comments<T: ConfigSpec>(config: &T, path: &Path) -> Result<(), ConfigError> {
    ensure_parent(path)?;
    let yaml = generate_yaml_with_comments(config)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let Value::Mapping(mapping) = value else {
        return Err(ConfigError::Validation(
            "config must serialize to a mapping".to_string(),
        ));
    };

    let mut blocks = Vec::new();
    for field in T::fields() {
        let mut block = String::new();
        for line in field.description.lines() {
            block.push_str("# ");
            block.push_str(line);
            block.push('\n');
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        block.push_str(yaml.trim_end());
        blocks.push(block);
    }

    let mut out = blocks.join("\n\n");
    out.push('\n');
    Ok(out)
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        // null in the user file means "keep the default"
        (_, Value::Null) => {}
        (dest, other) => {
            *dest = other;
        }
    }
}

fn resolve_path<T: ConfigSpec>(path: Option<&Path>, base_dir: Option<&Path>) -> PathBuf {
    if let Some(p) = path {
        p.to_path_buf()
    } else if let Some(base) = base_dir {
        base.join(T::FILE_NAME)
    } else {
        PathBuf::from(T::FILE_NAME)
    }
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        retries: u32,
        nested: Nested,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Nested {
        enabled: bool,
        label: String,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                name: "default".to_string(),
                retries: 3,
                nested: Nested {
                    enabled: false,
                    label: "x".to_string(),
                },
            }
        }
    }

    impl ConfigSpec for Sample {
        const FILE_NAME: &'static str = "sample.yml";

        fn fields() -> &'static [FieldMeta] {
            static FIELDS: [FieldMeta; 3] = [
                FieldMeta {
                    name: "name",
                    description: "Display name",
                },
                FieldMeta {
                    name: "retries",
                    description: "Retry count\nzero disables retries",
                },
                FieldMeta {
                    name: "nested",
                    description: "",
                },
            ];
            &FIELDS
        }
    }

    #[test]
    fn missing_file_writes_commented_template() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_or_create::<Sample>(None, Some(dir.path())).unwrap();
        assert!(loaded.created);
        assert_eq!(loaded.config, Sample::default());

        let written = fs::read_to_string(dir.path().join("sample.yml")).unwrap();
        assert!(written.contains("# Display name\nname: default"));
        assert!(written.contains("# Retry count\n# zero disables retries\nretries: 3"));

        let reloaded = load_or_create::<Sample>(None, Some(dir.path())).unwrap();
        assert!(!reloaded.created);
        assert_eq!(reloaded.config, Sample::default());
    }

    #[test]
    fn partial_file_is_merged_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yml");
        fs::write(&path, "retries: 7\nnested:\n  enabled: true\n").unwrap();

        let loaded = load_or_create::<Sample>(Some(&path), None).unwrap();
        assert_eq!(loaded.config.retries, 7);
        assert!(loaded.config.nested.enabled);
        assert_eq!(loaded.config.nested.label, "x");
        assert_eq!(loaded.config.name, "default");
    }

    #[test]
    fn invalid_yaml_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yml");
        fs::write(&path, "retries: [1, 2\n").unwrap();

        let err = load_or_create::<Sample>(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn wrong_type_reports_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typed.yml");
        fs::write(&path, "retries: many\n").unwrap();

        let err = load_or_create::<Sample>(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
