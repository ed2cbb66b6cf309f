use std::cell::{Cell, RefCell};
use std::fmt;

use crate::record::FileRecord;

/// ワークスペース操作が報告するイベント
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConnectionOk { reply: String },
    ConnectionFailed { error: String },
    Uploaded { record: FileRecord },
    UploadFailed { filename: String, error: String },
    FilesListed { records: Vec<FileRecord> },
    NoFiles,
    ListFailed { error: String },
    Deleted { file_id: String },
    /// `error` が None の場合は API が削除を認めなかった
    DeleteFailed { file_id: String, error: Option<String> },
    DeleteAllSummary { deleted: usize, total: usize },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::ConnectionOk { reply } => write!(f, "API test successful: {}", reply),
            Event::ConnectionFailed { error } => write!(f, "API test failed: {}", error),
            Event::Uploaded { record } => write!(
                f,
                "File uploaded successfully: {} (ID: {}, {})",
                record.filename,
                record.id,
                record.formatted_size()
            ),
            Event::UploadFailed { filename, error } => {
                write!(f, "File upload failed: {}: {}", filename, error)
            }
            Event::FilesListed { records } => write!(f, "{} file(s) in workspace", records.len()),
            Event::NoFiles => f.write_str("No files in workspace"),
            Event::ListFailed { error } => write!(f, "Failed to list files: {}", error),
            Event::Deleted { file_id } => write!(f, "File with ID {} deleted successfully", file_id),
            Event::DeleteFailed {
                file_id,
                error: Some(error),
            } => write!(f, "Failed to delete file {}: {}", file_id, error),
            Event::DeleteFailed {
                file_id,
                error: None,
            } => write!(f, "Failed to delete file {}: not confirmed by API", file_id),
            Event::DeleteAllSummary { deleted, total } => {
                write!(f, "Deleted {} of {} files", deleted, total)
            }
        }
    }
}

impl Event {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ConnectionFailed { .. }
                | Event::UploadFailed { .. }
                | Event::ListFailed { .. }
                | Event::DeleteFailed { .. }
        )
    }
}

/// 操作結果の出力先
pub trait Reporter {
    fn report(&self, event: Event);
}

/// イベントをメモリに溜める Reporter
#[derive(Debug, Default)]
pub struct Recorder {
    events: RefCell<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// 条件に合うイベントの数
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(*e)).count()
    }
}

impl Reporter for Recorder {
    fn report(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

/// イベントを tracing に流す Reporter
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: Event) {
        if event.is_failure() {
            tracing::warn!("{}", event);
        } else {
            tracing::info!("{}", event);
        }
    }
}

/// 失敗イベントを数えつつ内側の Reporter に転送する
#[derive(Debug, Default)]
pub struct FailureCount<R> {
    inner: R,
    failures: Cell<usize>,
}

impl<R: Reporter> FailureCount<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            failures: Cell::new(0),
        }
    }

    pub fn failures(&self) -> usize {
        self.failures.get()
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: Reporter> Reporter for FailureCount<R> {
    fn report(&self, event: Event) {
        if event.is_failure() {
            self.failures.set(self.failures.get() + 1);
        }
        self.inner.report(event);
    }
}
