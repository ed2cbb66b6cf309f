pub mod anthropic;
pub mod client;
pub mod config;
pub mod error;
pub mod mime;
pub mod record;
pub mod reporter;
pub mod table;
pub mod utils;
pub mod workspace;

pub use client::WorkspaceClient;
pub use error::{Error, Result};
pub use mime::MimeType;
pub use record::{FileRecord, UploadRequest};
pub use reporter::{Event, FailureCount, Recorder, Reporter, TracingReporter};
