use std::fmt;
use std::path::Path;

use crate::Result;

/// Files API が受け付ける MIME タイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeType {
    Pdf,
    PlainText,
}

/// 拡張子 → (MIME, テキストとして読み直すか)
const EXTENSION_TABLE: &[(&str, MimeType, bool)] = &[
    ("pdf", MimeType::Pdf, false),
    ("txt", MimeType::PlainText, false),
    ("md", MimeType::PlainText, true),
    ("json", MimeType::PlainText, true),
];

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Pdf => "application/pdf",
            MimeType::PlainText => "text/plain",
        }
    }

    /// 拡張子から MIME タイプを判定（大文字小文字は区別しない）
    pub fn from_path(path: &Path) -> Result<Self> {
        lookup(path).map(|(mime, _)| mime)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `.md` / `.json` はテキストとして読み込み、text/plain で送り直す
pub(crate) fn needs_text_normalization(path: &Path) -> Result<bool> {
    lookup(path).map(|(_, normalize)| normalize)
}

fn lookup(path: &Path) -> Result<(MimeType, bool)> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    EXTENSION_TABLE
        .iter()
        .find(|(candidate, _, _)| *candidate == ext)
        .map(|(_, mime, normalize)| (*mime, *normalize))
        .ok_or_else(|| {
            let shown = if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", ext)
            };
            crate::Error::UnsupportedFileType(shown)
        })
}
