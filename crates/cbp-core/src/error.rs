use thiserror::Error;

#[derive(Error, Debug)]
pub enum CbpError {
    // === Configuration Errors ===
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // === Shape Errors ===
    #[error("Shape mismatch in '{operation}': {message}")]
    ShapeMismatch { operation: String, message: String },

    // === I/O Errors ===
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl CbpError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn shape_mismatch<S1, S2>(operation: S1, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::ShapeMismatch {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            Self::Io { .. } => "IO_ERROR",
        }
    }

    /// True for errors raised before any layer state was built.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }
}

impl From<std::io::Error> for CbpError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for CbpError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source(format!("TOML parse error: {}", err), err)
    }
}
