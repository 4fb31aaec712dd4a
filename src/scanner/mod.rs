mod digest;

pub use digest::{matches_digest, sha256_hex};

use crate::error::{Result, ScanError};
use pe_scan_common::{classify_prefix, FileHandle, Signature, SIGNATURE_LEN};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// ファイルを選択（全体を読み込んで FileHandle にする）
pub async fn load_file(path: &Path) -> Result<FileHandle> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ScanError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    log::debug!("選択: {} ({} bytes, sha256={})", name, bytes.len(), sha256_hex(&bytes));

    Ok(FileHandle::new(name, bytes))
}

/// 先頭2バイトだけ読んで判定
///
/// 読み込みエラーは Unrecognized にせず FileRead として返す。
pub async fn sniff_path(path: &Path) -> Result<Signature> {
    let read_error = |source| ScanError::FileRead {
        path: path.to_path_buf(),
        source,
    };

    let file = tokio::fs::File::open(path).await.map_err(read_error)?;
    let mut prefix = Vec::with_capacity(SIGNATURE_LEN);
    file.take(SIGNATURE_LEN as u64)
        .read_to_end(&mut prefix)
        .await
        .map_err(read_error)?;

    Ok(classify_prefix(&prefix))
}
