use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Operator config file not found. Looked in:\n\
        - ACCOUNTFLOW_CONFIG_PATH\n\
        - current directory: accountflow.local.yaml, accountflow.yaml\n\
        - ~/.config/accountflow/config.yaml"
    )]
    ConfigFileNotFound,

    #[error("Invalid value for '{key}': {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Missing max concurrent reconciles for controller {0}")]
    MissingMaxReconciles(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
