use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("{port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device closed the connection")]
    Disconnected,

    #[error("no DONE received within {0:?}")]
    AckTimeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

impl LinkError {
    /// Whether this error is the cooperative shutdown path rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LinkError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
