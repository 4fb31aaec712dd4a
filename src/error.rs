use pe_scan_common::Failure;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルを読み込めません: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("バックエンドに接続できません: {0}")]
    Network(#[source] reqwest::Error),

    #[error("サーバーエラー (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("ポーリング中断 (job {job_id}): {source}")]
    PollingAbort {
        job_id: String,
        #[source]
        source: Box<ScanError>,
    },

    #[error("ポーリング上限に到達しました (job {job_id}, {attempts}回)")]
    PollTimeout { job_id: String, attempts: u32 },

    #[error("要求は取り消されました")]
    Cancelled,

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] pe_scan_common::Error),
}

impl ScanError {
    /// 画面に出す失敗へ変換
    ///
    /// 応答なし（Network）とサーバーエラーは必ず区別して表示する。
    pub fn failure(&self) -> Failure {
        match self {
            ScanError::Network(_) => Failure::Network,
            ScanError::Server { message, .. } => Failure::Server(message.clone()),
            ScanError::PollingAbort { source, .. } => source.failure(),
            ScanError::PollTimeout { .. } => Failure::Timeout,
            ScanError::FileRead { .. } | ScanError::Io(_) => Failure::Read,
            other => Failure::Server(other.to_string()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            ScanError::Cancelled => true,
            ScanError::PollingAbort { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
