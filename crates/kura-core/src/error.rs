use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("File does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported file type: {0} (only PDF and text files are allowed)")]
    UnsupportedFileType(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Remote(e.to_string())
    }
}

impl Error {
    /// ネットワーク呼び出し前のローカル検証エラーかどうか
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::FileNotFound(_) | Error::UnsupportedFileType(_) | Error::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
