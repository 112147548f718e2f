pub mod error;
pub mod operator;

pub use error::*;
pub use operator::OperatorConfig;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Get the AccountFlow config directory, creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("accountflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Locate the operator config file
///
/// Search order:
/// 1. `ACCOUNTFLOW_CONFIG_PATH` (direct path)
/// 2. current directory: accountflow.local.yaml, accountflow.yaml
/// 3. ~/.config/accountflow/config.yaml (global)
pub fn find_config_file() -> Result<PathBuf> {
    // 1. explicit path
    if let Ok(config_path) = std::env::var("ACCOUNTFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    // 2. current directory
    let current_dir = std::env::current_dir()?;
    for filename in ["accountflow.local.yaml", "accountflow.yaml"] {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    // 3. global config
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("accountflow").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Read config map data from a YAML file.
///
/// Accepts either a full ConfigMap manifest (the `data` section is used) or
/// a bare mapping. Scalar values are stringified so `fedramp: true` and
/// `fedramp: "true"` are equivalent.
pub fn read_config_data(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&content)?;

    let data_section = doc.get("data").and_then(|v| v.as_mapping()).cloned();
    let mapping = match data_section {
        Some(m) => m,
        None => match doc {
            serde_yaml::Value::Mapping(m) => m,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            other => {
                return Err(ConfigError::InvalidValue {
                    key: path.display().to_string(),
                    value: format!("{:?}", other),
                    reason: "expected a mapping".to_string(),
                });
            }
        },
    };

    let mut data = BTreeMap::new();
    for (key, value) in mapping {
        let Some(key) = key.as_str().map(str::to_string) else {
            continue;
        };
        let value = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Null => String::new(),
            other => {
                tracing::warn!("Ignoring non-scalar config value for '{}'", key);
                tracing::debug!("value: {:?}", other);
                continue;
            }
        };
        data.insert(key, value);
    }
    Ok(data)
}

/// Locate, read and parse the operator configuration
pub fn load_operator_config() -> Result<OperatorConfig> {
    let path = find_config_file()?;
    tracing::debug!("Loading operator config from {}", path.display());
    let data = read_config_data(&path)?;
    OperatorConfig::from_data(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_get_config_dir() {
        let result = get_config_dir();
        assert!(result.is_ok());

        let config_dir = result.unwrap();
        assert!(config_dir.ends_with("accountflow"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("accountflow.yaml"), "root: r-1234").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("accountflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("accountflow.yaml"), "# shared").unwrap();
        fs::write(temp_dir.path().join("accountflow.local.yaml"), "# local").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        // accountflow.local.yaml wins
        assert!(result.unwrap().ends_with("accountflow.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("operator.yaml");
        fs::write(&config_path, "fedramp: false").unwrap();

        temp_env::with_var(
            "ACCOUNTFLOW_CONFIG_PATH",
            Some(config_path.to_str().unwrap()),
            || {
                let result = find_config_file().unwrap();
                assert_eq!(result, config_path);
            },
        );
    }

    #[test]
    fn test_read_config_map_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cm.yaml");
        fs::write(
            &path,
            r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: aws-account-operator-configmap
data:
  fedramp: "false"
  root: ou-abcd-12345678
  shard-name: hive-stage-01
  feature.validation_move_account: true
  MaxConcurrentReconciles.account: 3
"#,
        )
        .unwrap();

        let data = read_config_data(&path).unwrap();
        assert_eq!(data.get("root").map(String::as_str), Some("ou-abcd-12345678"));
        assert_eq!(
            data.get("feature.validation_move_account").map(String::as_str),
            Some("true")
        );

        let config = OperatorConfig::from_data(&data).unwrap();
        assert!(config.move_account_enabled);
        assert_eq!(config.max_reconciles("account").unwrap(), 3);
        assert_eq!(config.shard_name.as_deref(), Some("hive-stage-01"));
    }

    #[test]
    fn test_read_bare_mapping() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bare.yaml");
        fs::write(&path, "fedramp: true\naccount-creation-timeout: 120\n").unwrap();

        let config = OperatorConfig::from_data(&read_config_data(&path).unwrap()).unwrap();
        assert!(config.fedramp);
        assert_eq!(config.account_creation_timeout.as_secs(), 120);
    }

    #[test]
    fn test_read_rejects_scalar_document() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("scalar.yaml");
        fs::write(&path, "just a string").unwrap();

        assert!(matches!(
            read_config_data(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
