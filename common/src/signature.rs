//! ファイル先頭シグネチャ判定
//!
//! 拡張子やMIMEタイプは偽装・欠落しうるため、先頭2バイトで判定する。

use crate::types::FileHandle;
use serde::Serialize;

/// 実行ファイル（PE/DOS）のマジックナンバー "MZ"（ビッグエンディアン）
pub const EXECUTABLE_MAGIC: u16 = 0x4D5A;

/// 判定に読むバイト数
pub const SIGNATURE_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signature {
    Recognized,
    Unrecognized,
}

impl Signature {
    pub fn is_recognized(&self) -> bool {
        matches!(self, Signature::Recognized)
    }
}

/// 先頭バイト列を判定（2バイト未満は Unrecognized）
pub fn classify_prefix(prefix: &[u8]) -> Signature {
    match prefix {
        [hi, lo, ..] if u16::from_be_bytes([*hi, *lo]) == EXECUTABLE_MAGIC => Signature::Recognized,
        _ => Signature::Unrecognized,
    }
}

/// 選択済みファイルを判定
pub fn sniff(file: &FileHandle) -> Signature {
    classify_prefix(file.bytes())
}
