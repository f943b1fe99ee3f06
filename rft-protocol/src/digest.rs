//! Whole-file digest exchanged in the `HASH:` packet

use md5::{Digest, Md5};

/// Hex-encoded MD5 digest of the complete file content
pub fn file_digest(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

/// Compare two hex digests, ignoring case
pub fn digests_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
