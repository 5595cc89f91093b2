use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::telemetry::metrics::REPORT_DOWNLOAD_BYTES;

/// Fetches remote inputs into a work directory. Uses the client's own
/// timeouts; there is no retry.
#[derive(Clone, Default)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    #[tracing::instrument(name = "download", skip(self), fields(download.bytes))]
    pub async fn fetch_to(&self, url: &str, path: &Path) -> AppResult<u64> {
        tracing::info!("Downloading file from {url} to {}", path.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Download(e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Download(e.to_string()))?;

        tokio::fs::write(path, &body).await?;

        let len = body.len() as u64;
        REPORT_DOWNLOAD_BYTES.add(len, &[]);
        tracing::Span::current().record("download.bytes", len);
        Ok(len)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::Router;
    use axum::routing::get;
    use tokio::net::TcpListener;

    /// Serves `files` at `/<name>` on an ephemeral local port and returns the
    /// base URL. Unknown paths answer 404.
    pub async fn serve_files(files: Vec<(&'static str, Vec<u8>)>) -> String {
        let mut app = Router::new();
        for (name, bytes) in files {
            app = app.route(
                &format!("/{name}"),
                get(move || {
                    let bytes = bytes.clone();
                    async move { bytes }
                }),
            );
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_writes_body() {
        let base = testing::serve_files(vec![("t.html", b"<p>hi</p>".to_vec())]).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.html");

        let written = Downloader::default()
            .fetch_to(&format!("{base}/t.html"), &path)
            .await
            .unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&path).unwrap(), b"<p>hi</p>");
    }

    #[tokio::test]
    async fn test_http_error_status_is_download_error() {
        let base = testing::serve_files(vec![]).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("File1.pdf");

        let err = Downloader::default()
            .fetch_to(&format!("{base}/missing.pdf"), &path)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Download(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Downloader::default()
            .fetch_to("http://127.0.0.1:1/a.pdf", &dir.path().join("a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Download(_)));
    }
}
