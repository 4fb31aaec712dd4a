//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing detection stat: {0}")]
    MissingStat(&'static str),

    #[error("Invalid count for {field}: {value}")]
    InvalidCount { field: &'static str, value: String },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
