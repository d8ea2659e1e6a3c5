use thiserror::Error;

/// 1回のGETの失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("ネットワークエラー: {0}")]
    Network(String),

    #[error("HTTPステータス: {0}")]
    HttpStatus(u16),

    #[error("タイムアウト: {0}")]
    Timeout(String),
}

impl FetchError {
    /// リトライで回復しうるか（429と5xxを含む）
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::HttpStatus(code) => *code == 429 || (500..600).contains(code),
        }
    }
}

/// 検索結果ページの解析失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    /// 求人リンクも「該当なし」マーカーもないページ（キャプチャ、ブロック、レイアウト変更）
    #[error("検索結果ページを認識できません")]
    UnrecognizedPage,
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV書き込みエラー: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX書き込みエラー: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("エクスポートタスク異常終了: {0}")]
    Worker(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("不正なリクエスト: {0}")]
    InvalidRequest(String),

    #[error("セッションは処理中です: {0}")]
    SessionBusy(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error(transparent)]
    Export(#[from] ExportError),
}
