use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mime::{self, MimeType};
use crate::{utils, Result};

/// ワークスペース上のファイルのメタデータ（ベンダーが返すもの）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// ファイル ID（ベンダー採番）
    pub id: String,
    /// ファイル名
    pub filename: String,
    /// サイズ（バイト）
    pub size_bytes: u64,
    /// MIME タイプ
    pub mime_type: String,
    /// 作成日時
    pub created_at: DateTime<Utc>,
    /// ダウンロード可能かどうか
    #[serde(default)]
    pub downloadable: bool,
}

impl FileRecord {
    /// サイズを人間が読みやすい形式で取得
    pub fn formatted_size(&self) -> String {
        utils::format_size(self.size_bytes)
    }
}

/// アップロード要求
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// ローカルパス
    pub path: PathBuf,
    /// 送信するファイル名
    pub filename: String,
    /// 送信する MIME タイプ
    pub mime: MimeType,
    /// 送信する内容
    pub content: Vec<u8>,
}

const UTF8_BOM: &str = "\u{feff}";

impl UploadRequest {
    /// ローカルファイルからアップロード要求を作成
    ///
    /// ファイルの存在と拡張子はここで検証され、ネットワークには一切触れない。
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(crate::Error::FileNotFound(path.to_path_buf()));
        }

        let mime = MimeType::from_path(path)?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| crate::Error::FileNotFound(path.to_path_buf()))?;

        let content = if mime::needs_text_normalization(path)? {
            let text = fs::read_to_string(path).map_err(|e| read_error(path, e))?;
            text.strip_prefix(UTF8_BOM).unwrap_or(&text).as_bytes().to_vec()
        } else {
            fs::read(path).map_err(|e| read_error(path, e))?
        };

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            mime,
            content,
        })
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

fn read_error(path: &Path, e: io::Error) -> crate::Error {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            crate::Error::FileNotFound(path.to_path_buf())
        }
        io::ErrorKind::InvalidData => crate::Error::InvalidArgument(format!(
            "{} is not valid UTF-8 text",
            path.display()
        )),
        _ => crate::Error::Io(e),
    }
}
