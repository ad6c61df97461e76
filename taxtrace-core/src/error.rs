//! Error types for TaxTrace scanning

use thiserror::Error;

/// Result type alias using ScanError
pub type Result<T> = std::result::Result<T, ScanError>;

/// Main error type for scan sessions
#[derive(Debug, Error)]
pub enum ScanError {
    /// No capture device could be found or the selected one disappeared
    #[error("Capture device not found: {0}")]
    DeviceNotFound(String),

    /// The platform refused camera access
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    /// Neither the strict nor the relaxed constraint set could be satisfied
    #[error("Constraints could not be satisfied: {constraint}")]
    Overconstrained {
        /// Name of the constraint the platform rejected
        constraint: String,
    },

    /// Any other media access failure
    #[error("Media error: {0}")]
    Media(String),

    /// Decode engine failure (bind failure or fatal frame error)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Session was deactivated before startup finished
    #[error("Scan session cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Virtual backend scenario error
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScanError>,
    },
}

impl ScanError {
    /// Create a media error
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a scenario error
    pub fn scenario(msg: impl Into<String>) -> Self {
        Self::Scenario(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context wrappers
    pub fn root(&self) -> &ScanError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error means the session was cancelled rather than failed
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }

    /// A short hint the user can act on, if there is one
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::DeviceNotFound(_) => {
                Some("Connect a camera, or run 'taxtrace devices' to see what is available")
            }
            Self::PermissionDenied(_) => {
                Some("Allow camera access for this application and try again")
            }
            Self::Overconstrained { .. } => {
                Some("The camera does not support the requested facing mode or resolution; adjust [constraints] in scanner.toml")
            }
            Self::Config(_) => Some("Check scanner.toml, or regenerate it with 'taxtrace config init --force'"),
            Self::Scenario(_) => Some("Check the scenario file passed with --scenario"),
            _ => None,
        }
    }

    /// Whether the user can fix this without code changes
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::DeviceNotFound(_)
                | Self::PermissionDenied(_)
                | Self::Overconstrained { .. }
                | Self::Config(_)
                | Self::Scenario(_)
                | Self::Cancelled
        )
    }
}

// io::Error is not Clone; the copy keeps its kind and message.
impl Clone for ScanError {
    fn clone(&self) -> Self {
        match self {
            Self::DeviceNotFound(msg) => Self::DeviceNotFound(msg.clone()),
            Self::PermissionDenied(msg) => Self::PermissionDenied(msg.clone()),
            Self::Overconstrained { constraint } => Self::Overconstrained {
                constraint: constraint.clone(),
            },
            Self::Media(msg) => Self::Media(msg.clone()),
            Self::Decode(msg) => Self::Decode(msg.clone()),
            Self::Cancelled => Self::Cancelled,
            Self::Config(msg) => Self::Config(msg.clone()),
            Self::Scenario(msg) => Self::Scenario(msg.clone()),
            Self::Io(err) => Self::Io(std::io::Error::new(err.kind(), err.to_string())),
            Self::WithContext { context, source } => Self::WithContext {
                context: context.clone(),
                source: source.clone(),
            },
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

// Conversions from external error types

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<toml::ser::Error> for ScanError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(format!("Failed to serialize TOML: {}", err))
    }
}
