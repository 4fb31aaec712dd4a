//! 画面状態の状態機械
//!
//! スキャン系とレピュテーション系の2トラックを独立に持ち、同じ表示領域へ描画する。
//! 非同期処理の結果は必ず `FlowTicket` 付きで `apply` に渡す。
//! 発行後にファイルが選び直された、または新しい要求が始まったチケットは古いものとして捨てる。

use crate::signature::Signature;
use crate::types::{Failure, ReputationReport, ScanVerdict};
use crate::view::{render, View};
use serde::Serialize;

/// 状態名（両トラック共通の名前空間）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UiState {
    Idle,
    InvalidType,
    ScanningUpload,
    ScanSuccess,
    ScanFailure,
    ReputationPending,
    ReputationAsyncPending,
    ReputationSuccess,
    ReputationFailure,
}

/// 現在の選択
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Empty,
    ReadFailed,
    Loaded(Signature),
}

/// スキャン（分類バックエンド）トラック
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    InvalidType,
    ScanningUpload,
    ScanSuccess(ScanVerdict),
    ScanFailure(Failure),
}

impl ScanState {
    pub fn ui_state(&self) -> UiState {
        match self {
            ScanState::Idle => UiState::Idle,
            ScanState::InvalidType => UiState::InvalidType,
            ScanState::ScanningUpload => UiState::ScanningUpload,
            ScanState::ScanSuccess(_) => UiState::ScanSuccess,
            ScanState::ScanFailure(_) => UiState::ScanFailure,
        }
    }
}

/// レピュテーショントラック
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReputationState {
    #[default]
    Idle,
    ReputationPending,
    ReputationAsyncPending { job_id: String },
    ReputationSuccess(ReputationReport),
    ReputationFailure(Failure),
}

impl ReputationState {
    pub fn ui_state(&self) -> UiState {
        match self {
            ReputationState::Idle => UiState::Idle,
            ReputationState::ReputationPending => UiState::ReputationPending,
            ReputationState::ReputationAsyncPending { .. } => UiState::ReputationAsyncPending,
            ReputationState::ReputationSuccess(_) => UiState::ReputationSuccess,
            ReputationState::ReputationFailure(_) => UiState::ReputationFailure,
        }
    }

    /// 応答待ち（即時・非同期どちらも）
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            ReputationState::ReputationPending | ReputationState::ReputationAsyncPending { .. }
        )
    }
}

/// 状態全体（描画の唯一の入力）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub selection: SelectionState,
    pub scan: ScanState,
    pub reputation: ReputationState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Scan,
    Reputation,
}

/// 非同期処理1件の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTicket {
    pub track: Track,
    pub selection: u64,
    pub request: u64,
}

/// 非同期処理から届くイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    UploadCompleted(ScanVerdict),
    UploadFailed(Failure),
    /// サーバーが非同期処理に切り替えた
    ReputationQueued { job_id: String },
    ReputationCompleted(ReputationReport),
    ReputationFailed(Failure),
}

impl Event {
    pub fn track(&self) -> Track {
        match self {
            Event::UploadCompleted(_) | Event::UploadFailed(_) => Track::Scan,
            Event::ReputationQueued { .. }
            | Event::ReputationCompleted(_)
            | Event::ReputationFailed(_) => Track::Reputation,
        }
    }
}

/// `apply` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// 状態が遷移した
    Changed,
    /// チケットが古い（選び直し・再要求済み）ので破棄
    Stale,
    /// 現在の状態では受け付けない遷移
    Rejected,
}

/// 画面状態コントローラ
#[derive(Debug, Clone, Default)]
pub struct UiController {
    state: SessionState,
    selection_epoch: u64,
    upload_request: u64,
    reputation_request: u64,
}

impl UiController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn view(&self) -> View {
        render(&self.state)
    }

    /// ファイル選択。両トラックをリセットし、新しい選択番号を返す
    pub fn select(&mut self, signature: Signature) -> u64 {
        self.selection_epoch += 1;
        self.state = SessionState {
            selection: SelectionState::Loaded(signature),
            scan: match signature {
                Signature::Recognized => ScanState::Idle,
                Signature::Unrecognized => ScanState::InvalidType,
            },
            reputation: ReputationState::Idle,
        };
        self.selection_epoch
    }

    /// ファイル読み込みに失敗した選択
    pub fn selection_failed(&mut self) -> u64 {
        self.selection_epoch += 1;
        self.state = SessionState {
            selection: SelectionState::ReadFailed,
            ..Default::default()
        };
        self.selection_epoch
    }

    /// アップロード開始（押せない状態なら None）
    pub fn begin_upload(&mut self) -> Option<FlowTicket> {
        if self.state.selection != SelectionState::Loaded(Signature::Recognized)
            || !self.view().upload.is_ready()
        {
            return None;
        }

        self.upload_request += 1;
        // アップロード開始でレピュテーション表示もクリアされる
        self.reputation_request += 1;
        self.state.scan = ScanState::ScanningUpload;
        self.state.reputation = ReputationState::Idle;

        Some(FlowTicket {
            track: Track::Scan,
            selection: self.selection_epoch,
            request: self.upload_request,
        })
    }

    /// レピュテーション確認開始（押せない状態なら None）
    pub fn begin_reputation(&mut self) -> Option<FlowTicket> {
        if !self.view().reputation.is_ready() {
            return None;
        }

        self.reputation_request += 1;
        self.state.reputation = ReputationState::ReputationPending;

        Some(FlowTicket {
            track: Track::Reputation,
            selection: self.selection_epoch,
            request: self.reputation_request,
        })
    }

    /// チケットがまだ有効か
    pub fn is_current(&self, ticket: &FlowTicket) -> bool {
        if ticket.selection != self.selection_epoch {
            return false;
        }
        match ticket.track {
            Track::Scan => ticket.request == self.upload_request,
            Track::Reputation => ticket.request == self.reputation_request,
        }
    }

    /// 非同期処理の結果を反映
    pub fn apply(&mut self, ticket: &FlowTicket, event: Event) -> Applied {
        if event.track() != ticket.track {
            return Applied::Rejected;
        }
        if !self.is_current(ticket) {
            return Applied::Stale;
        }

        match event {
            Event::UploadCompleted(verdict) => self.finish_scan(ScanState::ScanSuccess(verdict)),
            Event::UploadFailed(failure) => self.finish_scan(ScanState::ScanFailure(failure)),
            Event::ReputationQueued { job_id } => {
                if self.state.reputation != ReputationState::ReputationPending {
                    return Applied::Rejected;
                }
                self.state.reputation = ReputationState::ReputationAsyncPending { job_id };
                Applied::Changed
            }
            Event::ReputationCompleted(report) => {
                self.finish_reputation(ReputationState::ReputationSuccess(report))
            }
            Event::ReputationFailed(failure) => {
                self.finish_reputation(ReputationState::ReputationFailure(failure))
            }
        }
    }

    fn finish_scan(&mut self, next: ScanState) -> Applied {
        if self.state.scan != ScanState::ScanningUpload {
            return Applied::Rejected;
        }
        self.state.scan = next;
        Applied::Changed
    }

    fn finish_reputation(&mut self, next: ReputationState) -> Applied {
        if !self.state.reputation.is_in_flight() {
            return Applied::Rejected;
        }
        self.state.reputation = next;
        Applied::Changed
    }
}
