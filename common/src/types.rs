//! スキャン関連の型定義
//!
//! CLIと将来のフロントエンドで共有される型:
//! - FileHandle: 選択中ファイルのバイト列と名前
//! - ScanVerdict: 分類バックエンドの判定
//! - ReputationReport: レピュテーション結果（即時/ポーリング完了の両方から正規化）
//! - PollTicket: 非同期ジョブ1件分の管理情報
//! - Failure: 画面に表示する失敗の種類

use crate::view::{NETWORK_ERROR_MESSAGE, POLL_TIMEOUT_MESSAGE, READ_ERROR_MESSAGE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 選択中のファイル
///
/// 選択のたびに丸ごと置き換えられ、内容は変更されない。
#[derive(Debug, Clone)]
pub struct FileHandle {
    name: String,
    bytes: Arc<[u8]>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// 分類バックエンドの判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanVerdict {
    Malicious,
    Benign,
}

impl ScanVerdict {
    /// `result` フィールドの値から判定を作る（1のみ悪性）
    pub fn from_result_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => ScanVerdict::Malicious,
            _ => ScanVerdict::Benign,
        }
    }
}

/// レポート欄の数（表示順は固定）
pub const REPORT_FIELD_COUNT: usize = 6;

/// 正規化済みレピュテーション結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationReport {
    pub malicious: u64,
    pub suspicious: u64,
    pub harmless: u64,
    pub undetected: u64,
    pub file_size: Option<u64>,
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

impl ReputationReport {
    /// 4種の件数の合計（直接組み立てた値でも溢れない）
    pub fn total_checks(&self) -> u64 {
        self.malicious
            .saturating_add(self.suspicious)
            .saturating_add(self.undetected)
            .saturating_add(self.harmless)
    }

    /// "<malicious>/<total>" 形式
    pub fn detection_rate(&self) -> String {
        format!("{}/{}", self.malicious, self.total_checks())
    }

    /// 表示用の6行
    ///
    /// 順序: Detection Rate, Suspicious, File Size, MD5, SHA-1, SHA-256
    pub fn fields(&self) -> [String; REPORT_FIELD_COUNT] {
        let size = self
            .file_size
            .map(|s| format!("{} bytes", s))
            .unwrap_or_else(|| "unknown".into());
        [
            format!("Detection Rate: {}", self.detection_rate()),
            format!("Suspicious: {}", self.suspicious),
            format!("File Size: {}", size),
            format!("MD5: {}", or_unknown(&self.md5)),
            format!("SHA-1: {}", or_unknown(&self.sha1)),
            format!("SHA-256: {}", or_unknown(&self.sha256)),
        ]
    }
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("unknown")
}

/// 非同期ジョブのポーリング管理
///
/// 1回のレピュテーション要求につき最大1枚。終端ステータスかエラーで無効化される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTicket {
    pub job_id: String,
    pub interval_ms: u64,
    active: bool,
}

impl PollTicket {
    pub fn new(job_id: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            job_id: job_id.into(),
            interval_ms,
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// 画面に出す失敗
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// 応答なし（接続不可など）
    Network,
    /// サーバーが返したエラーメッセージ（そのまま表示）
    Server(String),
    /// ポーリングが上限に達した
    Timeout,
    /// ファイル読み込み失敗
    Read,
}

impl Failure {
    pub fn message(&self) -> String {
        match self {
            Failure::Network => NETWORK_ERROR_MESSAGE.to_string(),
            Failure::Server(message) => message.clone(),
            Failure::Timeout => POLL_TIMEOUT_MESSAGE.to_string(),
            Failure::Read => READ_ERROR_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ReputationReport {
        ReputationReport {
            malicious: 3,
            suspicious: 1,
            harmless: 10,
            undetected: 50,
            file_size: Some(4096),
            md5: Some("d41d8cd98f00b204e9800998ecf8427e".into()),
            sha1: Some("da39a3ee5e6b4b0d3255bfef95601890afd80709".into()),
            sha256: Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".into()),
        }
    }

    #[test]
    fn test_verdict_from_result_code() {
        assert_eq!(ScanVerdict::from_result_code(Some(1)), ScanVerdict::Malicious);
        assert_eq!(ScanVerdict::from_result_code(Some(0)), ScanVerdict::Benign);
        assert_eq!(ScanVerdict::from_result_code(Some(2)), ScanVerdict::Benign);
        assert_eq!(ScanVerdict::from_result_code(None), ScanVerdict::Benign);
    }

    #[test]
    fn test_detection_rate_uses_all_four_counts() {
        let report = sample_report();
        assert_eq!(report.total_checks(), 64);
        assert_eq!(report.detection_rate(), "3/64");
    }

    #[test]
    fn test_total_checks_saturates() {
        let report = ReputationReport {
            malicious: u64::MAX,
            harmless: 5,
            ..Default::default()
        };
        assert_eq!(report.total_checks(), u64::MAX);
    }

    #[test]
    fn test_fields_fixed_order() {
        let fields = sample_report().fields();
        assert_eq!(fields.len(), REPORT_FIELD_COUNT);
        assert_eq!(fields[0], "Detection Rate: 3/64");
        assert_eq!(fields[1], "Suspicious: 1");
        assert_eq!(fields[2], "File Size: 4096 bytes");
        assert!(fields[3].starts_with("MD5: d41d8"));
        assert!(fields[4].starts_with("SHA-1: da39"));
        assert!(fields[5].starts_with("SHA-256: e3b0"));
    }

    #[test]
    fn test_fields_missing_metadata() {
        let report = ReputationReport {
            malicious: 0,
            suspicious: 0,
            harmless: 1,
            undetected: 0,
            ..Default::default()
        };
        let fields = report.fields();
        assert_eq!(fields[0], "Detection Rate: 0/1");
        assert_eq!(fields[2], "File Size: unknown");
        assert_eq!(fields[3], "MD5: unknown");
    }

    #[test]
    fn test_poll_ticket_lifecycle() {
        let mut ticket = PollTicket::new("job-1", 15_000);
        assert!(ticket.is_active());
        assert_eq!(ticket.interval_ms, 15_000);
        ticket.deactivate();
        assert!(!ticket.is_active());
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(Failure::Network.message(), NETWORK_ERROR_MESSAGE);
        assert_eq!(Failure::Server("No file part".into()).message(), "No file part");
        assert_eq!(Failure::Read.message(), READ_ERROR_MESSAGE);
    }

    #[test]
    fn test_file_handle_accessors() {
        let handle = FileHandle::new("a.exe", b"MZ\x90\x00".to_vec());
        assert_eq!(handle.name(), "a.exe");
        assert_eq!(handle.len(), 4);
        assert_eq!(&handle.bytes()[..2], b"MZ");
        assert!(!handle.is_empty());
    }
}
