/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::checksum
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Parse sha256sum-style checksum manifests and verify
    downloaded artifacts against them.

  Security / Safety Notes:
    A mismatching artifact is deleted before the error is
    returned so it can never be installed by a later step.
    Verification is skipped (with a warning by the caller) when
    no manifest exists; this is not a security guarantee.

  Dependencies:
    sha2 for SHA-256 digests.

  Operational Scope:
    Used by deb mode between download and installation.

  Revision History:
    2026-10-19 COD  Added artifact verification.
  ------------------------------------------------------------
  SSE Principles Observed:
    - No silent failure paths
    - Deterministic, byte-for-byte digest comparison
============================================================*/

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{DistError, Result};

/// Find the expected digest for `filename` in a sha256sum manifest.
///
/// Accepts both text (`<hex>  name`) and binary (`<hex> *name`) entries and
/// ignores blank lines and comments. Digests are returned lower-case.
pub fn expected_digest(manifest: &str, filename: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (digest, name) = line.split_once(char::is_whitespace)?;
        let name = name.trim_start().trim_start_matches('*');
        let name = name.rsplit('/').next().unwrap_or(name);
        if name == filename && is_sha256_hex(digest) {
            Some(digest.to_ascii_lowercase())
        } else {
            None
        }
    })
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Compute the lower-case hex SHA-256 digest of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|err| {
        DistError::Filesystem(format!("Failed to open {} for hashing: {err}", path.display()))
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify `path` against `expected`; delete the file on mismatch.
pub fn verify_file(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    let expected = expected.trim().to_ascii_lowercase();
    if actual == expected {
        return Ok(());
    }
    std::fs::remove_file(path).map_err(|err| {
        DistError::Filesystem(format!(
            "Checksum mismatch and failed to remove {}: {err}",
            path.display()
        ))
    })?;
    Err(DistError::ChecksumMismatch {
        file: path.display().to_string(),
        expected,
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"cardshell\n";

    fn digest_of(bytes: &[u8]) -> String {
        format!("{:x}", Sha256::digest(bytes))
    }

    #[test]
    fn correct_digest_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardshell_1.0.3_ubuntu-22.04_amd64.deb");
        std::fs::write(&path, BODY).unwrap();

        verify_file(&path, &digest_of(BODY).to_uppercase()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn wrong_digest_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cardshell.deb");
        std::fs::write(&path, BODY).unwrap();

        let err = verify_file(&path, &"0".repeat(64)).unwrap_err();
        match err {
            DistError::ChecksumMismatch { actual, .. } => assert_eq!(actual, digest_of(BODY)),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn manifest_lookup_handles_both_modes() {
        let a = "a".repeat(64);
        let b = "B".repeat(64);
        let manifest = format!(
            "# release sums\n{a}  cardshell_2.0.0_ubuntu-22.04_amd64.deb\n\n{b} *dist/cardshell_2.0.0_ubuntu-24.04_arm64.deb\n"
        );
        assert_eq!(
            expected_digest(&manifest, "cardshell_2.0.0_ubuntu-22.04_amd64.deb"),
            Some(a)
        );
        assert_eq!(
            expected_digest(&manifest, "cardshell_2.0.0_ubuntu-24.04_arm64.deb"),
            Some("b".repeat(64))
        );
        assert_eq!(expected_digest(&manifest, "other.deb"), None);
    }

    #[test]
    fn malformed_digest_is_ignored() {
        assert_eq!(expected_digest("xyz  cardshell.deb\n", "cardshell.deb"), None);
    }
}
