use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::record::FileRecord;

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Filename")]
    filename: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "MIME type")]
    mime_type: String,
    #[tabled(rename = "Created at")]
    created_at: String,
}

impl From<&FileRecord> for FileRow {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.clone(),
            filename: record.filename.clone(),
            size: record.formatted_size(),
            mime_type: record.mime_type.clone(),
            created_at: record.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// ファイル一覧を表形式の文字列にする
pub fn render_files(records: &[FileRecord]) -> String {
    let rows: Vec<FileRow> = records.iter().map(FileRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
