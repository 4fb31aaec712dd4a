//! バックエンドレスポンスパーサー
//!
//! 3種類のワイヤ形式をここで一度だけ判別し、以降は正規化済みの型だけを扱う:
//! 1. `/virusTotal` 即時応答 `{hash: {attributes: {last_analysis_stats, size, md5, ...}}}`
//! 2. `/virusTotal` 非同期応答 `{file_id}`
//! 3. `/status/{id}` 応答 `{data: {attributes: {status, stats}}, meta: {file_info}}`

use crate::error::{Error, Result};
use crate::types::{ReputationReport, ScanVerdict};
use serde::Deserialize;
use serde_json::Value;

/// ジョブ完了を示すステータス
pub const STATUS_COMPLETED: &str = "completed";

/// `/virusTotal` の判別結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReputationResponse {
    /// ハッシュ照合で即時に得られた結果
    Immediate(ReputationReport),
    /// 解析ジョブ投入済み（ポーリングが必要）
    Queued { job_id: String },
}

/// `/status/{id}` の判別結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed(ReputationReport),
    /// 未完了（queued / in-progress など）
    Running(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed(_))
    }
}

// =============================================
// ワイヤ形式
// =============================================

/// 検出統計（数値または数値文字列を許容）
#[derive(Debug, Default, Deserialize)]
struct WireStats {
    malicious: Option<Value>,
    suspicious: Option<Value>,
    harmless: Option<Value>,
    undetected: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct WireFileInfo {
    size: Option<Value>,
    md5: Option<String>,
    sha1: Option<String>,
    sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HashAttributes {
    last_analysis_stats: Option<WireStats>,
    #[serde(flatten)]
    file_info: WireFileInfo,
}

#[derive(Debug, Deserialize)]
struct HashResult {
    attributes: HashAttributes,
}

#[derive(Debug, Deserialize)]
struct ReputationWire {
    hash: Option<HashResult>,
    file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusAttributes {
    status: String,
    stats: Option<WireStats>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    attributes: StatusAttributes,
}

#[derive(Debug, Deserialize)]
struct StatusMeta {
    file_info: Option<WireFileInfo>,
}

#[derive(Debug, Deserialize)]
struct StatusWire {
    data: StatusData,
    meta: Option<StatusMeta>,
}

#[derive(Debug, Deserialize)]
struct UploadWire {
    result: Option<Value>,
}

// =============================================
// 正規化
// =============================================

/// 件数を整数に変換
///
/// 数値・数値文字列を受け付ける。負数や数値でない文字列はエラー。
fn coerce_count(field: &'static str, value: Option<&Value>) -> Result<u64> {
    let value = value.ok_or(Error::MissingStat(field))?;
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.trunc() as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::InvalidCount {
        field,
        value: value.to_string(),
    })
}

fn normalize(stats: &WireStats, info: Option<&WireFileInfo>) -> Result<ReputationReport> {
    let mut report = ReputationReport {
        malicious: coerce_count("malicious", stats.malicious.as_ref())?,
        suspicious: coerce_count("suspicious", stats.suspicious.as_ref())?,
        harmless: coerce_count("harmless", stats.harmless.as_ref())?,
        undetected: coerce_count("undetected", stats.undetected.as_ref())?,
        ..Default::default()
    };

    // 合計が u64 に収まらない統計は受け付けない
    let total = [report.suspicious, report.harmless, report.undetected]
        .into_iter()
        .try_fold(report.malicious, u64::checked_add);
    if total.is_none() {
        return Err(Error::InvalidCount {
            field: "total",
            value: format!(
                "{}+{}+{}+{}",
                report.malicious, report.suspicious, report.harmless, report.undetected
            ),
        });
    }

    if let Some(info) = info {
        report.file_size = match &info.size {
            Some(v) => Some(coerce_count("size", Some(v))?),
            None => None,
        };
        report.md5 = info.md5.clone();
        report.sha1 = info.sha1.clone();
        report.sha256 = info.sha256.clone();
    }

    Ok(report)
}

// =============================================
// 公開API
// =============================================

/// `/upload` 成功レスポンスをパース
pub fn parse_upload_response(body: &str) -> Result<ScanVerdict> {
    let wire: UploadWire = serde_json::from_str(body)?;
    Ok(ScanVerdict::from_result_code(
        wire.result.as_ref().and_then(result_code),
    ))
}

/// 数値の判定コード（`1.0` のような整数値の浮動小数も整数とみなす）
fn result_code(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// `/virusTotal` 成功レスポンスをパース
///
/// `hash` があれば即時結果、なければ `file_id` のジョブとして扱う。
pub fn parse_reputation_response(body: &str) -> Result<ReputationResponse> {
    let wire: ReputationWire = serde_json::from_str(body)?;

    match (wire.hash, wire.file_id) {
        (Some(hash), _) => {
            let attrs = hash.attributes;
            let stats = attrs
                .last_analysis_stats
                .ok_or(Error::MissingStat("last_analysis_stats"))?;
            normalize(&stats, Some(&attrs.file_info)).map(ReputationResponse::Immediate)
        }
        (None, Some(job_id)) if !job_id.trim().is_empty() => {
            Ok(ReputationResponse::Queued { job_id })
        }
        (None, _) => Err(Error::Parse(
            "レスポンスに hash も file_id もありません".into(),
        )),
    }
}

/// `/status/{id}` 成功レスポンスをパース
pub fn parse_status_response(body: &str) -> Result<JobStatus> {
    let wire: StatusWire = serde_json::from_str(body)?;
    let attrs = wire.data.attributes;

    if attrs.status != STATUS_COMPLETED {
        return Ok(JobStatus::Running(attrs.status));
    }

    let stats = attrs.stats.ok_or(Error::MissingStat("stats"))?;
    let info = wire.meta.and_then(|m| m.file_info);
    normalize(&stats, info.as_ref()).map(JobStatus::Completed)
}

/// エラーレスポンス `{error: ...}` からメッセージを取り出す
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
