//! pe-scan Common Library
//!
//! I/Oを持たないコア部分（CLIや他のフロントエンドで共有）:
//! シグネチャ判定、ワイヤ形式の正規化、画面状態機械と描画

pub mod types;
pub mod error;
pub mod signature;
pub mod parser;
pub mod controller;
pub mod view;

pub use types::{Failure, FileHandle, PollTicket, ReputationReport, ScanVerdict, REPORT_FIELD_COUNT};
pub use error::{Error, Result};
pub use signature::{classify_prefix, sniff, Signature, EXECUTABLE_MAGIC, SIGNATURE_LEN};
pub use parser::{
    extract_error_message, parse_reputation_response, parse_status_response,
    parse_upload_response, JobStatus, ReputationResponse, STATUS_COMPLETED,
};
pub use controller::{
    Applied, Event, FlowTicket, ReputationState, ScanState, SelectionState, SessionState,
    Track, UiController, UiState,
};
pub use view::{render, Control, TextColor, View};
