//! バックエンド通信
//!
//! 分類（/upload）、レピュテーション（/virusTotal）、ジョブ状態（/status/{id}）の3エンドポイント。
//! テストでは `ScanBackend` を差し替える。

mod http;

pub use http::{server_error, HttpBackend};

use crate::error::Result;
use async_trait::async_trait;
use pe_scan_common::{FileHandle, JobStatus, ReputationResponse, ScanVerdict};

#[async_trait]
pub trait ScanBackend: Send + Sync {
    /// 分類バックエンドへ送信して判定を得る
    async fn upload(&self, file: &FileHandle) -> Result<ScanVerdict>;

    /// レピュテーション確認を依頼（即時結果かジョブID）
    async fn submit_reputation(&self, file: &FileHandle) -> Result<ReputationResponse>;

    /// ジョブ状態を1回問い合わせる
    async fn job_status(&self, job_id: &str) -> Result<JobStatus>;
}
