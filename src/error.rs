use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for a generation run.
///
/// Every variant is fatal: a run either produces a complete document or none.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {}: {message}", file.display())]
    Parse { file: PathBuf, message: String },

    /// Invalid configuration or plugin prerequisites, detected before traversal
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The required-plugin relation contains a cycle
    #[error("plugin ordering error: required plugins form a cycle among [{}]", .0.join(", "))]
    PluginOrdering(Vec<String>),

    /// A plugin hook failed for a node
    #[error("plugin `{plugin}` failed while {phase} `{entity}`: {source}")]
    Resolution {
        plugin: String,
        phase: &'static str,
        entity: String,
        #[source]
        source: Box<Error>,
    },

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("missing required field `{field}` on `{entity}`")]
    MissingRequiredField { entity: String, field: String },

    #[error("invalid value for annotation `{annotation}` on `{entity}`: {message}")]
    InvalidAnnotationValue {
        entity: String,
        annotation: String,
        message: String,
    },

    /// A cyclic reference that cannot be embedded by name
    #[error("cycle violation: `{0}` cannot be referenced by name")]
    CycleViolation(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Wrap an error raised by a plugin hook with the plugin and node identity.
    pub fn in_plugin(self, plugin: &str, phase: &'static str, entity: impl ToString) -> Self {
        Error::Resolution {
            plugin: plugin.to_string(),
            phase,
            entity: entity.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through plugin wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Resolution { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}

impl From<syn::Error> for Error {
    fn from(err: syn::Error) -> Self {
        Error::Parse {
            file: PathBuf::from("<unknown>"),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_names_plugin_and_entity() {
        let err = Error::UnknownType("com.example.Missing".to_string()).in_plugin(
            "backbone",
            "scanning",
            "type:entity:com.example.User.owner",
        );

        let message = err.to_string();
        assert!(message.contains("backbone"));
        assert!(message.contains("scanning"));
        assert!(message.contains("com.example.User.owner"));
        assert!(matches!(err.root_cause(), Error::UnknownType(name) if name == "com.example.Missing"));
    }

    #[test]
    fn test_plugin_ordering_message_lists_plugins() {
        let err = Error::PluginOrdering(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            err.to_string(),
            "plugin ordering error: required plugins form a cycle among [a, b]"
        );
    }
}
