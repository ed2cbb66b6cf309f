//! ワークスペース操作
//!
//! どの操作もクライアントと Reporter を引数で受け取り、内部状態は持たない。
//! ローカル検証エラーは API を呼ぶ前に `Err` で返し、API 側の失敗は
//! Reporter に報告したうえで `None` / `false` / 空 / 0 に変換する。

use std::path::Path;

use tracing::{debug, info};

use crate::client::WorkspaceClient;
use crate::record::{FileRecord, UploadRequest};
use crate::reporter::{Event, Reporter};
use crate::Result;

/// API への疎通確認
pub fn test_connection<C, R>(client: &C, reporter: &R, file_id: Option<&str>) -> bool
where
    C: WorkspaceClient + ?Sized,
    R: Reporter + ?Sized,
{
    let file_id = file_id.map(str::trim).filter(|id| !id.is_empty());

    match client.test_connection(file_id) {
        Ok(reply) => {
            reporter.report(Event::ConnectionOk { reply });
            true
        }
        Err(e) => {
            reporter.report(Event::ConnectionFailed {
                error: e.to_string(),
            });
            false
        }
    }
}

/// ファイルをワークスペースにアップロードし、ファイル ID を返す
///
/// API 側で失敗した場合は `Ok(None)`。同じ内容でも毎回新しいファイルになる。
pub fn upload_file_to_workspace<C, R>(client: &C, reporter: &R, path: &Path) -> Result<Option<String>>
where
    C: WorkspaceClient + ?Sized,
    R: Reporter + ?Sized,
{
    let request = UploadRequest::from_path(path)?;
    info!(
        path = %request.path.display(),
        mime = request.mime.as_str(),
        size = request.size(),
        "uploading file"
    );

    match client.create_file(&request.filename, &request.content, request.mime) {
        Ok(record) => {
            let id = record.id.clone();
            reporter.report(Event::Uploaded { record });
            Ok(Some(id))
        }
        Err(e) => {
            reporter.report(Event::UploadFailed {
                filename: request.filename,
                error: e.to_string(),
            });
            Ok(None)
        }
    }
}

/// ワークスペースのファイル一覧
pub fn list_files_in_workspace<C, R>(client: &C, reporter: &R) -> Vec<FileRecord>
where
    C: WorkspaceClient + ?Sized,
    R: Reporter + ?Sized,
{
    match client.list_files() {
        Ok(records) if records.is_empty() => {
            reporter.report(Event::NoFiles);
            records
        }
        Ok(records) => {
            reporter.report(Event::FilesListed {
                records: records.clone(),
            });
            records
        }
        Err(e) => {
            reporter.report(Event::ListFailed {
                error: e.to_string(),
            });
            Vec::new()
        }
    }
}

/// ファイルを 1 件削除
pub fn delete_file_from_workspace<C, R>(client: &C, reporter: &R, file_id: &str) -> Result<bool>
where
    C: WorkspaceClient + ?Sized,
    R: Reporter + ?Sized,
{
    validate_file_id(file_id)?;
    Ok(delete_one(client, reporter, file_id))
}

/// ワークスペースのファイルをすべて削除し、削除できた件数を返す
///
/// 1 件ずつ削除し、途中で失敗しても残りを続行する。
pub fn delete_all_files_from_workspace<C, R>(client: &C, reporter: &R) -> usize
where
    C: WorkspaceClient + ?Sized,
    R: Reporter + ?Sized,
{
    let records = match client.list_files() {
        Ok(records) => records,
        Err(e) => {
            reporter.report(Event::ListFailed {
                error: e.to_string(),
            });
            return 0;
        }
    };

    delete_files_from_workspace(client, reporter, &records)
}

/// 一覧済みのファイルを 1 件ずつ削除し、削除できた件数を返す
///
/// 確認済みの一覧をそのまま削除したい場合に使う。失敗しても残りを続行する。
pub fn delete_files_from_workspace<C, R>(client: &C, reporter: &R, records: &[FileRecord]) -> usize
where
    C: WorkspaceClient + ?Sized,
    R: Reporter + ?Sized,
{
    let total = records.len();
    let mut deleted = 0;
    for record in records {
        if delete_one(client, reporter, &record.id) {
            deleted += 1;
        }
    }

    reporter.report(Event::DeleteAllSummary { deleted, total });
    deleted
}

fn delete_one<C, R>(client: &C, reporter: &R, file_id: &str) -> bool
where
    C: WorkspaceClient + ?Sized,
    R: Reporter + ?Sized,
{
    debug!(file_id, "deleting file");

    match client.delete_file(file_id) {
        Ok(true) => {
            reporter.report(Event::Deleted {
                file_id: file_id.to_string(),
            });
            true
        }
        Ok(false) => {
            reporter.report(Event::DeleteFailed {
                file_id: file_id.to_string(),
                error: None,
            });
            false
        }
        Err(e) => {
            reporter.report(Event::DeleteFailed {
                file_id: file_id.to_string(),
                error: Some(e.to_string()),
            });
            false
        }
    }
}

fn validate_file_id(file_id: &str) -> Result<()> {
    if file_id.trim().is_empty() {
        return Err(crate::Error::InvalidArgument("file ID is empty".into()));
    }
    // URL パスに埋め込むため。`.` / `..` や `%2e%2e` はドットセグメントとして解釈される
    if file_id == "."
        || file_id == ".."
        || file_id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '?' | '#' | '%'))
    {
        return Err(crate::Error::InvalidArgument(format!(
            "malformed file ID: {:?}",
            file_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::MimeType;
    use crate::reporter::{FailureCount, Recorder};
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create {
            filename: String,
            mime: MimeType,
            content: Vec<u8>,
        },
        List,
        Delete(String),
        Probe(Option<String>),
    }

    #[derive(Default)]
    struct MockClient {
        files: Vec<FileRecord>,
        created: Option<FileRecord>,
        fail_list: bool,
        fail_probe: bool,
        /// delete がエラーになる ID
        failing_deletes: Vec<String>,
        /// delete が false を返す ID
        refused_deletes: Vec<String>,
        calls: RefCell<Vec<Call>>,
    }

    impl MockClient {
        fn with_files(ids: &[&str]) -> Self {
            Self {
                files: ids.iter().map(|id| record(id, "doc.txt", 10, "text/plain")).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn delete_calls(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Delete(id) => Some(id),
                    _ => None,
                })
                .collect()
        }
    }

    impl WorkspaceClient for MockClient {
        fn create_file(&self, filename: &str, content: &[u8], mime: MimeType) -> Result<FileRecord> {
            self.calls.borrow_mut().push(Call::Create {
                filename: filename.to_string(),
                mime,
                content: content.to_vec(),
            });
            self.created
                .clone()
                .ok_or_else(|| crate::Error::Remote("429 Too Many Requests: quota exceeded".into()))
        }

        fn list_files(&self) -> Result<Vec<FileRecord>> {
            self.calls.borrow_mut().push(Call::List);
            if self.fail_list {
                return Err(crate::Error::Remote("connection refused".into()));
            }
            Ok(self.files.clone())
        }

        fn delete_file(&self, file_id: &str) -> Result<bool> {
            self.calls.borrow_mut().push(Call::Delete(file_id.to_string()));
            if self.failing_deletes.iter().any(|id| id == file_id) {
                return Err(crate::Error::Remote("404 Not Found".into()));
            }
            Ok(!self.refused_deletes.iter().any(|id| id == file_id))
        }

        fn test_connection(&self, file_id: Option<&str>) -> Result<String> {
            self.calls
                .borrow_mut()
                .push(Call::Probe(file_id.map(str::to_string)));
            if self.fail_probe {
                return Err(crate::Error::Remote("401 Unauthorized: invalid x-api-key".into()));
            }
            Ok("API test successful".to_string())
        }
    }

    fn record(id: &str, filename: &str, size: u64, mime: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            filename: filename.to_string(),
            size_bytes: size,
            mime_type: mime.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 4, 14, 0, 0, 0).unwrap(),
            downloadable: false,
        }
    }

    fn uploadable() -> MockClient {
        MockClient {
            created: Some(record("file_new", "x", 0, "text/plain")),
            ..Default::default()
        }
    }

    #[test]
    fn test_connection_success() {
        let client = MockClient::default();
        let recorder = Recorder::new();

        assert!(test_connection(&client, &recorder, None));
        assert_eq!(client.calls(), vec![Call::Probe(None)]);
        assert_eq!(
            recorder.events(),
            vec![Event::ConnectionOk {
                reply: "API test successful".into()
            }]
        );
    }

    #[test]
    fn test_connection_failure_returns_false() {
        let client = MockClient {
            fail_probe: true,
            ..Default::default()
        };
        let recorder = Recorder::new();

        assert!(!test_connection(&client, &recorder, None));
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert!(
            matches!(&events[0], Event::ConnectionFailed { error } if error.contains("invalid x-api-key"))
        );
    }

    #[test]
    fn test_connection_with_file_id() {
        let client = MockClient::default();
        let recorder = Recorder::new();

        assert!(test_connection(&client, &recorder, Some(" file_123 ")));
        assert!(test_connection(&client, &recorder, Some("")));
        assert_eq!(
            client.calls(),
            vec![Call::Probe(Some("file_123".into())), Call::Probe(None)]
        );
    }

    #[test]
    fn test_upload_selects_mime_per_extension() {
        let temp = TempDir::new().unwrap();
        let cases = [
            ("a.pdf", MimeType::Pdf),
            ("b.txt", MimeType::PlainText),
            ("c.md", MimeType::PlainText),
            ("d.json", MimeType::PlainText),
        ];

        for (name, expected) in cases {
            let path = temp.path().join(name);
            fs::write(&path, "content").unwrap();

            let client = uploadable();
            let recorder = Recorder::new();
            upload_file_to_workspace(&client, &recorder, &path).unwrap();

            match &client.calls()[..] {
                [Call::Create { filename, mime, .. }] => {
                    assert_eq!(filename, name);
                    assert_eq!(*mime, expected, "{}", name);
                }
                other => panic!("unexpected calls for {}: {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_upload_unsupported_makes_no_calls() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("image.png");
        fs::write(&path, b"\x89PNG").unwrap();

        let client = uploadable();
        let recorder = Recorder::new();
        let err = upload_file_to_workspace(&client, &recorder, &path).unwrap_err();

        assert!(matches!(err, crate::Error::UnsupportedFileType(_)));
        assert!(err.is_local());
        assert!(client.calls().is_empty());
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_upload_missing_file_makes_no_calls() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nope.pdf");

        let client = uploadable();
        let recorder = Recorder::new();
        let err = upload_file_to_workspace(&client, &recorder, &path).unwrap_err();

        assert!(matches!(err, crate::Error::FileNotFound(_)));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_upload_remote_failure_returns_none() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.txt");
        fs::write(&path, "hello").unwrap();

        let client = MockClient::default();
        let recorder = Recorder::new();
        let result = upload_file_to_workspace(&client, &recorder, &path).unwrap();

        assert_eq!(result, None);
        assert_eq!(client.calls().len(), 1);
        assert!(matches!(
            &recorder.events()[..],
            [Event::UploadFailed { filename, error }] if filename == "report.txt" && error.contains("quota")
        ));
    }

    #[test]
    fn test_upload_identical_content_twice_creates_twice() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("same.txt");
        fs::write(&path, "same").unwrap();

        let client = uploadable();
        let recorder = Recorder::new();
        upload_file_to_workspace(&client, &recorder, &path).unwrap();
        upload_file_to_workspace(&client, &recorder, &path).unwrap();

        assert_eq!(client.calls().len(), 2);
    }

    #[test]
    fn test_upload_then_delete_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.pdf");
        fs::write(&path, vec![0u8; 1024]).unwrap();

        let client = MockClient {
            created: Some(record("file_123", "test.pdf", 1024, "application/pdf")),
            ..Default::default()
        };
        let recorder = Recorder::new();

        let id = upload_file_to_workspace(&client, &recorder, &path).unwrap();
        assert_eq!(id.as_deref(), Some("file_123"));
        assert!(matches!(
            &recorder.events()[..],
            [Event::Uploaded { record }] if record.filename == "test.pdf" && record.size_bytes == 1024
        ));

        assert!(delete_file_from_workspace(&client, &recorder, "file_123").unwrap());
        assert_eq!(client.delete_calls(), vec!["file_123".to_string()]);
    }

    #[test]
    fn test_list_empty_reports_no_files_once() {
        let client = MockClient::default();
        let recorder = Recorder::new();

        let records = list_files_in_workspace(&client, &recorder);

        assert!(records.is_empty());
        assert_eq!(recorder.count(|e| *e == Event::NoFiles), 1);
        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn test_list_returns_records() {
        let client = MockClient::with_files(&["file_a", "file_b"]);
        let recorder = Recorder::new();

        let records = list_files_in_workspace(&client, &recorder);

        assert_eq!(records.len(), 2);
        assert!(matches!(
            &recorder.events()[..],
            [Event::FilesListed { records }] if records.len() == 2
        ));
    }

    #[test]
    fn test_list_failure_returns_empty() {
        let client = MockClient {
            fail_list: true,
            ..Default::default()
        };
        let recorder = Recorder::new();

        assert!(list_files_in_workspace(&client, &recorder).is_empty());
        assert!(matches!(&recorder.events()[..], [Event::ListFailed { .. }]));
    }

    #[test]
    fn test_list_failure_is_counted_as_failure() {
        let client = MockClient {
            fail_list: true,
            ..Default::default()
        };
        let reporter = FailureCount::new(Recorder::new());

        assert!(list_files_in_workspace(&client, &reporter).is_empty());
        assert_eq!(reporter.failures(), 1);

        let empty = MockClient::default();
        let reporter = FailureCount::new(Recorder::new());
        assert!(list_files_in_workspace(&empty, &reporter).is_empty());
        assert_eq!(reporter.failures(), 0);
    }

    #[test]
    fn test_delete_rejects_empty_or_malformed_id() {
        let client = MockClient::default();
        let recorder = Recorder::new();

        for id in ["", "   ", "file 1", "../file_1", ".", "..", "%2e%2e", "file%2F1", "..\\x"] {
            let err = delete_file_from_workspace(&client, &recorder, id).unwrap_err();
            assert!(matches!(err, crate::Error::InvalidArgument(_)), "{:?}", id);
        }
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_delete_failures_return_false() {
        let client = MockClient {
            failing_deletes: vec!["file_err".into()],
            refused_deletes: vec!["file_no".into()],
            ..Default::default()
        };
        let recorder = Recorder::new();

        assert!(!delete_file_from_workspace(&client, &recorder, "file_err").unwrap());
        assert!(!delete_file_from_workspace(&client, &recorder, "file_no").unwrap());
        assert_eq!(
            recorder.events(),
            vec![
                Event::DeleteFailed {
                    file_id: "file_err".into(),
                    error: Some("Remote operation failed: 404 Not Found".into()),
                },
                Event::DeleteFailed {
                    file_id: "file_no".into(),
                    error: None,
                },
            ]
        );
    }

    #[test]
    fn test_delete_all_continues_past_failures() {
        let mut client = MockClient::with_files(&["file_1", "file_2", "file_3", "file_4", "file_5"]);
        client.failing_deletes = vec!["file_2".into()];
        client.refused_deletes = vec!["file_4".into()];
        let recorder = Recorder::new();

        let deleted = delete_all_files_from_workspace(&client, &recorder);

        assert_eq!(deleted, 3);
        assert_eq!(
            client.delete_calls(),
            vec!["file_1", "file_2", "file_3", "file_4", "file_5"]
        );
        assert_eq!(recorder.count(|e| matches!(e, Event::DeleteFailed { .. })), 2);
        assert_eq!(recorder.count(|e| matches!(e, Event::Deleted { .. })), 3);
        assert_eq!(
            recorder.events().last(),
            Some(&Event::DeleteAllSummary {
                deleted: 3,
                total: 5
            })
        );
    }

    #[test]
    fn test_delete_files_uses_given_records_only() {
        let client = MockClient::with_files(&["file_1", "file_2", "file_3"]);
        let recorder = Recorder::new();
        let confirmed = vec![
            record("file_1", "a.txt", 1, "text/plain"),
            record("file_3", "c.txt", 1, "text/plain"),
        ];

        let deleted = delete_files_from_workspace(&client, &recorder, &confirmed);

        assert_eq!(deleted, 2);
        assert_eq!(client.calls(), vec![
            Call::Delete("file_1".into()),
            Call::Delete("file_3".into()),
        ]);
        assert_eq!(
            recorder.events().last(),
            Some(&Event::DeleteAllSummary {
                deleted: 2,
                total: 2
            })
        );
    }

    #[test]
    fn test_delete_all_empty_workspace() {
        let client = MockClient::default();
        let recorder = Recorder::new();

        assert_eq!(delete_all_files_from_workspace(&client, &recorder), 0);
        assert_eq!(client.calls(), vec![Call::List]);
        assert_eq!(
            recorder.events(),
            vec![Event::DeleteAllSummary {
                deleted: 0,
                total: 0
            }]
        );
    }

    #[test]
    fn test_delete_all_list_failure() {
        let client = MockClient {
            fail_list: true,
            ..Default::default()
        };
        let recorder = Recorder::new();

        assert_eq!(delete_all_files_from_workspace(&client, &recorder), 0);
        assert!(client.delete_calls().is_empty());
        assert!(matches!(&recorder.events()[..], [Event::ListFailed { .. }]));
    }

    #[test]
    fn test_works_through_trait_object() {
        let client: Box<dyn WorkspaceClient> = Box::new(MockClient::with_files(&["file_1"]));
        let recorder = Recorder::new();

        assert_eq!(list_files_in_workspace(client.as_ref(), &recorder).len(), 1);
    }
}
