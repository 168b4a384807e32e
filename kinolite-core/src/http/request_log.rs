//! Daily request/response log for outbound provider calls
//!
//! Human-readable, one file per calendar day
//! (`http_client.YYYY-MM-DD.log`). Writes go through a lossy non-blocking
//! worker so a slow or failing disk never holds up or fails a request.

use std::io::Write;
use std::path::Path;

use reqwest::Method;
use tracing::debug;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use url::{Host, Url};

use crate::{Error, Result};

const SPLIT_LINE: &str = "################################################################";

/// Rolling daily request log
pub struct RequestLog {
    writer: NonBlocking,
    _guard: WorkerGuard,
}

impl RequestLog {
    /// Open (creating if needed) the log directory
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("http_client")
            .filename_suffix("log")
            .build(dir)
            .map_err(|e| Error::Internal(format!("Failed to open request log: {e}")))?;

        let (writer, guard) = tracing_appender::non_blocking(appender);

        Ok(Self {
            writer,
            _guard: guard,
        })
    }

    /// Append one request/response pair. Loopback targets are skipped.
    pub fn record(&self, method: &Method, url: &str, post_data: Option<&str>, result: &str) {
        if is_loopback(url) {
            return;
        }

        let entry = format_entry(method, url, post_data, result);
        let mut writer = self.writer.clone();
        if let Err(e) = writer.write_all(entry.as_bytes()) {
            debug!(error = %e, url = %url, "Request log write dropped");
        }
    }
}

impl std::fmt::Debug for RequestLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLog").finish()
    }
}

fn format_entry(method: &Method, url: &str, post_data: Option<&str>, result: &str) -> String {
    let mut entry = format!(
        "\n\n\n{SPLIT_LINE}\n\n{}\n{method}: {url}\n",
        chrono::Local::now().format("%d.%m.%Y %H:%M:%S")
    );

    if let Some(data) = post_data.filter(|d| !d.trim().is_empty()) {
        entry.push_str(data);
        entry.push('\n');
    }

    entry.push_str(result);
    entry
}

/// Whether `url` targets this machine
#[must_use]
pub fn is_loopback(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    match parsed.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback("http://127.0.0.1:9118/lite/alloha"));
        assert!(is_loopback("http://localhost/x"));
        assert!(is_loopback("http://[::1]:80/"));
        assert!(!is_loopback("https://api.example.com/"));
        assert!(!is_loopback("not a url"));
    }

    #[test]
    fn test_format_entry_includes_post_data() {
        let entry = format_entry(&Method::POST, "https://api.test/", Some("a=1"), "StatusCode: 200");
        assert!(entry.contains("POST: https://api.test/\na=1\nStatusCode: 200"));

        let entry = format_entry(&Method::GET, "https://api.test/", Some("  "), "StatusCode: 404");
        assert!(entry.contains("GET: https://api.test/\nStatusCode: 404"));
    }

    #[test]
    fn test_record_writes_daily_file() {
        let dir = tempfile::tempdir().unwrap();

        {
            let log = RequestLog::new(dir.path().join("logs")).unwrap();
            log.record(&Method::GET, "https://api.test/?kp=1", None, "StatusCode: 200\n\n{}");
            log.record(&Method::GET, "http://127.0.0.1/skip", None, "StatusCode: 200");
        }

        let files: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);

        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("http_client."));
        assert!(name.ends_with(".log"));

        let content = std::fs::read_to_string(&files[0]).unwrap();
        assert!(content.contains("GET: https://api.test/?kp=1"));
        assert!(!content.contains("/skip"));
    }
}
