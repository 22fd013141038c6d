//! # Content Hashing

use sha2::{Digest, Sha256};

/// Git-style blob hash: SHA-256 over `blob {len}\0` followed by the content
pub fn calculate_git_file_sha(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
