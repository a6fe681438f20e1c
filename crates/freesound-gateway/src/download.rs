//! Streaming downloads to disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::error::{GatewayError, GatewayResult};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Stream a GET response to `output_path` chunk by chunk, creating parent
/// directories as needed. Nothing is written until a successful response
/// status has been seen.
pub async fn download_file(
    url: &str,
    output_path: &Path,
    access_token: Option<&str>,
) -> GatewayResult<PathBuf> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                GatewayError::Environment(format!(
                    "failed to create directory {}: {error}",
                    parent.display()
                ))
            })?;
        }
    }

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|error| {
            GatewayError::Environment(format!("failed to build HTTP client: {error}"))
        })?;
    let mut request = client.get(url);
    if let Some(token) = access_token {
        request = request.bearer_auth(token);
    }

    let mut response = request
        .send()
        .await
        .map_err(|error| GatewayError::Network(format!("download failed: {error}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::Api {
            status: Some(status.as_u16()),
            message: format!("download failed with status {}", status.as_u16()),
        });
    }

    let mut file = tokio::fs::File::create(output_path).await.map_err(|error| {
        GatewayError::Environment(format!(
            "failed to create {}: {error}",
            output_path.display()
        ))
    })?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|error| GatewayError::Network(format!("download interrupted: {error}")))?
    {
        file.write_all(&chunk).await.map_err(|error| {
            GatewayError::Environment(format!(
                "failed to write {}: {error}",
                output_path.display()
            ))
        })?;
    }
    file.flush().await.map_err(|error| {
        GatewayError::Environment(format!("failed to flush {}: {error}", output_path.display()))
    })?;

    Ok(output_path.to_path_buf())
}

/// Restrict a filename to alphanumerics plus `._-`, trimming trailing
/// whitespace. Applied to names coming back from the API before they touch
/// the filesystem.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || "._-".contains(*c))
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_keeps_safe_subset() {
        assert_eq!(sanitize_filename("My Sound! (v2).wav"), "MySoundv2.wav");
        assert_eq!(sanitize_filename("kick_01-final.flac"), "kick_01-final.flac");
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
    }

    #[tokio::test]
    async fn unreachable_url_reports_error_and_writes_nothing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out.wav");

        let result = download_file("http://127.0.0.1:1/file.wav", &path, None).await;
        let error = result.expect_err("unreachable");
        assert!(!error.to_string().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested/deeper/out.wav");

        // The connection fails, but the directories are prepared first, as
        // the original tool did.
        let _ = download_file("http://127.0.0.1:1/file.wav", &path, None).await;
        assert!(path.parent().unwrap().exists());
    }
}
