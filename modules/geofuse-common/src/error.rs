use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeofuseError {
    /// The geofence filter was asked for a region it does not know.
    #[error("Unknown region code: {0}")]
    UnknownRegion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid geofence {code}: {reason}")]
    InvalidGeofence { code: String, reason: String },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for fusion operations.
pub type FusionResult<T> = std::result::Result<T, GeofuseError>;
