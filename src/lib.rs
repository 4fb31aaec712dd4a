//! pe-scan
//!
//! 実行ファイルかどうかを先頭2バイトで判定し、分類バックエンドと
//! レピュテーション解析（非同期ジョブはポーリング）に問い合わせるクライアント。

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod scanner;
pub mod session;
pub mod terminal;
