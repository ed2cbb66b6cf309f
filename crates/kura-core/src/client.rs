use crate::mime::MimeType;
use crate::record::FileRecord;
use crate::Result;

/// ファイルワークスペース API クライアントの共通インターフェース
///
/// 認証や通信はすべて実装側の責務。`workspace` の各操作はこの trait だけに依存する。
pub trait WorkspaceClient {
    /// ファイルを作成（アップロード）
    fn create_file(&self, filename: &str, content: &[u8], mime: MimeType) -> Result<FileRecord>;

    /// ファイル一覧を取得
    fn list_files(&self) -> Result<Vec<FileRecord>>;

    /// ファイルを削除
    fn delete_file(&self, file_id: &str) -> Result<bool>;

    /// 疎通確認。`file_id` を渡すとそのファイルを添付して問い合わせる
    fn test_connection(&self, file_id: Option<&str>) -> Result<String>;
}
