//! Certificate uploads

use crate::error::ApiError;
use landchain_core::sha256_hex;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// A certificate stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Hex SHA-256 of the contents
    pub file_hash: String,
    /// Download path served by the node
    pub file_url: String,
}

/// Length of the content-hash prefix on stored file names
const HASH_PREFIX_LEN: usize = 16;

/// Reduce a client-supplied file name to a single safe path component
///
/// Directory parts are dropped and anything outside ASCII letters,
/// digits, `-`, `_` and `.` becomes `_`. Names that end up empty,
/// hidden or `.`/`..` are rejected.
#[must_use]
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name: String = raw
        .rsplit(['/', '\\'])
        .next()?
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.starts_with('.') {
        return None;
    }
    Some(name)
}

/// Write an uploaded certificate and fingerprint it
///
/// The stored name is prefixed with the start of the content hash, so
/// two certificates uploaded under the same name never replace each
/// other. Re-uploading identical bytes reuses the existing file.
///
/// # Errors
/// Returns error if the name is unusable or the write fails
pub async fn store(dir: &Path, raw_name: &str, bytes: &[u8]) -> Result<StoredFile, ApiError> {
    let name = sanitize_file_name(raw_name)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid file name: {raw_name:?}")))?;
    let file_hash = sha256_hex(bytes);
    let stored_name = format!("{}-{name}", &file_hash[..HASH_PREFIX_LEN]);
    let path = dir.join(&stored_name);

    tokio::fs::create_dir_all(dir).await?;
    let opened = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await;
    match opened {
        Ok(mut file) => {
            let written = async {
                file.write_all(bytes).await?;
                file.sync_all().await
            }
            .await;
            if let Err(e) = written {
                // a partial file would fail the fingerprint check forever
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e.into());
            }
            tracing::info!(file = %stored_name, hash = %file_hash, size = bytes.len(), "certificate stored");
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let existing = tokio::fs::read(&path).await?;
            if sha256_hex(&existing) != file_hash {
                return Err(ApiError::Internal(format!(
                    "stored file {stored_name} does not match its fingerprint"
                )));
            }
            tracing::debug!(file = %stored_name, "certificate already stored");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(StoredFile {
        file_hash,
        file_url: format!("/uploads/{stored_name}"),
    })
}

/// Read a stored certificate
///
/// # Errors
/// Returns `BadRequest` for unsafe names and `NotFound` for missing files
pub async fn load(dir: &Path, raw_name: &str) -> Result<Vec<u8>, ApiError> {
    let name = sanitize_file_name(raw_name)
        .filter(|n| n == raw_name)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid file name: {raw_name:?}")))?;
    match tokio::fs::read(dir.join(&name)).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound(format!("no such file: {name}")))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("cert.pdf").as_deref(), Some("cert.pdf"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("C:\\docs\\sertifikat.pdf").as_deref(), Some("sertifikat.pdf"));
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(".env"), None);
        assert_eq!(sanitize_file_name(""), None);
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(
            sanitize_file_name("shm 12\nfake\u{7}.pdf").as_deref(),
            Some("shm_12_fake_.pdf")
        );
        assert_eq!(sanitize_file_name("a%2Fb?.pdf").as_deref(), Some("a_2Fb_.pdf"));
        assert_eq!(sanitize_file_name("sertifikat-ü.pdf").as_deref(), Some("sertifikat-_.pdf"));
    }

    #[tokio::test]
    async fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let stored = store(dir.path(), "sertifikat.pdf", b"%PDF-1.4").await.unwrap();
        let hash = sha256_hex(b"%PDF-1.4");
        assert_eq!(stored.file_hash, hash);
        let name = format!("{}-sertifikat.pdf", &hash[..HASH_PREFIX_LEN]);
        assert_eq!(stored.file_url, format!("/uploads/{name}"));
        assert_eq!(load(dir.path(), &name).await.unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn same_name_different_contents_are_both_kept() {
        let dir = tempfile::tempdir().unwrap();
        let first = store(dir.path(), "cert.pdf", b"first").await.unwrap();
        let second = store(dir.path(), "cert.pdf", b"second").await.unwrap();
        assert_ne!(first.file_url, second.file_url);

        for (stored, bytes) in [(&first, &b"first"[..]), (&second, &b"second"[..])] {
            let name = stored.file_url.trim_start_matches("/uploads/");
            let served = load(dir.path(), name).await.unwrap();
            assert_eq!(served, bytes);
            assert_eq!(sha256_hex(&served), stored.file_hash);
        }

        let again = store(dir.path(), "cert.pdf", b"first").await.unwrap();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn load_rejects_traversal_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(dir.path(), "../secret").await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            load(dir.path(), "missing.pdf").await,
            Err(ApiError::NotFound(_))
        ));
    }
}
