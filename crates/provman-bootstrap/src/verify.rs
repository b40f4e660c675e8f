// SPDX-FileCopyrightText: 2026 Provman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content hash verification for downloaded provider files.

use std::path::Path;

use async_trait::async_trait;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use tracing::warn;

use provman_core::{HashAlgorithm, HashVerifier, ProvmanError, Result};

use crate::catalog::ContentHash;

/// Hashes files with the RustCrypto digests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha2Verifier;

fn digest_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Sha256 => Sha256::digest(bytes).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(bytes).to_vec(),
        HashAlgorithm::Sha1 => Sha1::digest(bytes).to_vec(),
    }
}

#[async_trait]
impl HashVerifier for Sha2Verifier {
    async fn compute_hash(&self, algorithm: HashAlgorithm, path: &Path) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(path).await?;
        Ok(digest_bytes(algorithm, &bytes))
    }
}

/// Checks `path` against the expected hash.
///
/// Returns `Ok(false)` on a mismatch and `Err` only when the file cannot be
/// read or the expected value is not hex.
pub async fn verify_file(
    verifier: &dyn HashVerifier,
    path: &Path,
    expected: &ContentHash,
) -> Result<bool> {
    let wanted = hex::decode(expected.value.trim()).map_err(|e| ProvmanError::Verification {
        path: path.to_path_buf(),
        message: format!("expected {} value is not hex: {e}", expected.algorithm),
    })?;

    if expected.algorithm.is_legacy() {
        warn!(
            path = %path.display(),
            algorithm = %expected.algorithm,
            "verifying with a legacy hash algorithm"
        );
    }

    let actual = verifier.compute_hash(expected.algorithm, path).await?;
    Ok(actual == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

    fn write_abc() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn sha256_matches_known_digest() {
        let (_dir, path) = write_abc();
        let hash = Sha2Verifier
            .compute_hash(HashAlgorithm::Sha256, &path)
            .await
            .unwrap();
        assert_eq!(hex::encode(hash), ABC_SHA256);
    }

    #[tokio::test]
    async fn verify_accepts_uppercase_hex() {
        let (_dir, path) = write_abc();
        let expected = ContentHash {
            algorithm: HashAlgorithm::Sha256,
            value: ABC_SHA256.to_uppercase(),
        };
        assert!(verify_file(&Sha2Verifier, &path, &expected).await.unwrap());
    }

    #[tokio::test]
    async fn verify_sha1_legacy() {
        let (_dir, path) = write_abc();
        let expected = ContentHash {
            algorithm: HashAlgorithm::Sha1,
            value: ABC_SHA1.to_string(),
        };
        assert!(verify_file(&Sha2Verifier, &path, &expected).await.unwrap());
    }

    #[tokio::test]
    async fn verify_reports_mismatch() {
        let (_dir, path) = write_abc();
        let expected = ContentHash {
            algorithm: HashAlgorithm::Sha512,
            value: "00".repeat(64),
        };
        assert!(!verify_file(&Sha2Verifier, &path, &expected).await.unwrap());
    }

    #[tokio::test]
    async fn non_hex_expected_value_is_an_error() {
        let (_dir, path) = write_abc();
        let expected = ContentHash {
            algorithm: HashAlgorithm::Sha256,
            value: "not-hex".to_string(),
        };
        assert!(matches!(
            verify_file(&Sha2Verifier, &path, &expected).await,
            Err(ProvmanError::Verification { .. })
        ));
    }
}
