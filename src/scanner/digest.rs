use sha2::{Digest, Sha256};

/// SHA-256（小文字16進）
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// レポートのハッシュが手元のファイルと一致するか（大文字小文字は無視）
pub fn matches_digest(local: &str, reported: Option<&str>) -> bool {
    match reported {
        Some(remote) => remote.trim().eq_ignore_ascii_case(local),
        None => true,
    }
}
