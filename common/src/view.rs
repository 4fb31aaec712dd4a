//! 表示モデルと描画関数
//!
//! 画面要素を直接書き換えず、状態から `View` を毎回組み立てる。
//! フロントエンド（CLI等）は `View` をそのまま出力するだけ。

use crate::controller::{ReputationState, ScanState, SelectionState, SessionState};
use crate::signature::Signature;
use crate::types::{ScanVerdict, REPORT_FIELD_COUNT};
use serde::Serialize;

pub const LOADING_TEXT: &str = "Loading...";
pub const MALWARE_TEXT: &str = "MALWARE DETECTED!";
pub const BENIGN_TEXT: &str = "FILE IS BENIGN!";
pub const INVALID_TYPE_TEXT: &str = "Invalid file type!";
pub const REPUTATION_PENDING_TEXT: &str = "Just a moment...";
pub const REPUTATION_PROCESSING_TEXT: &str =
    "Actively scanning with multiple anti-malware engines. this may take a few minutes...";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error, Could not complete the request.";
pub const READ_ERROR_MESSAGE: &str = "Error: Failed to read file.";
pub const POLL_TIMEOUT_MESSAGE: &str =
    "Reputation analysis did not finish in time. Please try again.";

/// 判定テキストの色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextColor {
    Default,
    Danger,
    Safe,
}

impl TextColor {
    /// CSSカラー値
    pub fn css(&self) -> &'static str {
        match self {
            TextColor::Default => "white",
            TextColor::Danger => "red",
            TextColor::Safe => "#0ADD08",
        }
    }
}

/// ボタン1つ分の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Control {
    pub visible: bool,
    pub enabled: bool,
}

impl Control {
    fn new(visible: bool, enabled: bool) -> Self {
        Self {
            visible,
            enabled: visible && enabled,
        }
    }

    /// 表示されていて押せる
    pub fn is_ready(&self) -> bool {
        self.visible && self.enabled
    }
}

/// 1回分の描画結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// ファイル選択（Upload）
    pub upload: Control,
    /// Check Reputation
    pub reputation: Control,
    pub verdict_text: String,
    pub verdict_color: TextColor,
    pub status_text: String,
    pub status_visible: bool,
    /// レポート6欄（None は空欄）
    pub report_fields: Option<[String; REPORT_FIELD_COUNT]>,
}

/// 状態から表示を組み立てる（副作用なし）
pub fn render(state: &SessionState) -> View {
    let uploading = matches!(state.scan, ScanState::ScanningUpload);
    let reputation_busy = state.reputation.is_in_flight();
    let has_file = matches!(state.selection, SelectionState::Loaded(_));

    let upload = Control::new(true, !uploading && !reputation_busy);

    let reputation_done = matches!(state.reputation, ReputationState::ReputationSuccess(_));
    let reputation = Control::new(
        has_file && !uploading,
        !reputation_busy && !reputation_done,
    );

    let (verdict_text, verdict_color) = verdict(state);

    let (status_text, status_visible) = match &state.reputation {
        ReputationState::Idle => (String::new(), false),
        ReputationState::ReputationPending => (REPUTATION_PENDING_TEXT.to_string(), true),
        ReputationState::ReputationAsyncPending { .. } => {
            (REPUTATION_PROCESSING_TEXT.to_string(), true)
        }
        ReputationState::ReputationSuccess(_) => (String::new(), false),
        ReputationState::ReputationFailure(failure) => (failure.message(), true),
    };

    let report_fields = match &state.reputation {
        ReputationState::ReputationSuccess(report) => Some(report.fields()),
        _ => None,
    };

    View {
        upload,
        reputation,
        verdict_text,
        verdict_color,
        status_text,
        status_visible,
        report_fields,
    }
}

fn verdict(state: &SessionState) -> (String, TextColor) {
    match &state.scan {
        ScanState::Idle => match state.selection {
            SelectionState::ReadFailed => (READ_ERROR_MESSAGE.to_string(), TextColor::Default),
            SelectionState::Empty | SelectionState::Loaded(Signature::Recognized) => {
                (String::new(), TextColor::Default)
            }
            // InvalidType を経由せずここへ来ることはない
            SelectionState::Loaded(Signature::Unrecognized) => {
                (INVALID_TYPE_TEXT.to_string(), TextColor::Default)
            }
        },
        ScanState::InvalidType => (INVALID_TYPE_TEXT.to_string(), TextColor::Default),
        ScanState::ScanningUpload => (LOADING_TEXT.to_string(), TextColor::Default),
        ScanState::ScanSuccess(ScanVerdict::Malicious) => {
            (MALWARE_TEXT.to_string(), TextColor::Danger)
        }
        ScanState::ScanSuccess(ScanVerdict::Benign) => (BENIGN_TEXT.to_string(), TextColor::Safe),
        ScanState::ScanFailure(failure) => (failure.message(), TextColor::Default),
    }
}
