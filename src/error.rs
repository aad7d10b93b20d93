use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AltSendError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Error walking directory: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("Path has no file name: {}", .0.display())]
    NoFileName(PathBuf),

    #[error("No file selected")]
    NoFileSelected,

    #[error("Please enter a ticket")]
    EmptyTicket,

    #[error("Invalid ticket format")]
    InvalidTicket,

    #[error("Malformed ticket")]
    MalformedTicket,

    #[error("Invalid size in ticket: {0:?}")]
    InvalidSize(String),

    #[error("Session is still active")]
    SessionActive,

    #[error("Previous transfer has to be reset first")]
    NotIdle,

    #[error("Transfer was stopped before it started")]
    StoppedWhilePreparing,

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Service has been shut down")]
    ServiceShutdown,

    #[error("Error: could not get $HOME value")]
    NoHomeDir,

    #[error("Could not serialize config")]
    ConfigSerializationFail(#[from] toml::ser::Error),

    #[error("Could not parse config file")]
    ConfigParseError(#[from] Box<figment::Error>),
}

impl AltSendError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AltSendError::PathNotFound(_)
                | AltSendError::NoFileName(_)
                | AltSendError::NoFileSelected
                | AltSendError::EmptyTicket
                | AltSendError::InvalidTicket
                | AltSendError::MalformedTicket
                | AltSendError::InvalidSize(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AltSendError>;
