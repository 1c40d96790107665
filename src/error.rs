use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixelscopeError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("{0} analysis already in flight")]
    Busy(&'static str),

    #[error("Analysis cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PixelscopeError>;

// Implement Serialize so errors can cross to a UI frontend as strings
impl serde::Serialize for PixelscopeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
