use std::path::{Path, PathBuf};

use url::Url;

/// A single resource to fetch into a caller-owned destination file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url:         Url,
    pub headers:     Vec<(String, String)>,
    pub destination: PathBuf,
    /// Server-side key of the resource, kept for diagnostics.
    pub remote_key:  String,
}

impl DownloadRequest {
    pub fn new(url: Url, destination: impl Into<PathBuf>) -> Self {
        Self {
            url,
            headers: Vec::new(),
            destination: destination.into(),
            remote_key: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn remote_key(mut self, key: impl Into<String>) -> Self {
        self.remote_key = key.into();
        self
    }

    pub fn destination(&self) -> &Path { &self.destination }
}

/// Opaque handle for continuing a partial transfer.
///
/// Produced by a transport when a connection drops after some bytes were
/// persisted and the server supports byte ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeToken {
    url:       Url,
    headers:   Vec<(String, String)>,
    offset:    u64,
    validator: Option<String>,
}

impl ResumeToken {
    pub fn new(url: Url, headers: Vec<(String, String)>, offset: u64, validator: Option<String>) -> Self {
        Self {
            url,
            headers,
            offset,
            validator,
        }
    }

    pub fn url(&self) -> &Url { &self.url }

    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Bytes already on disk; the next request starts here.
    pub fn offset(&self) -> u64 { self.offset }

    /// Entity tag the partial bytes were read from.
    pub fn validator(&self) -> Option<&str> { self.validator.as_deref() }

    pub fn range_header(&self) -> String { format!("bytes={}-", self.offset) }

    /// Request equivalent to restarting this transfer from byte zero.
    pub fn restart(&self, destination: impl Into<PathBuf>) -> DownloadRequest {
        DownloadRequest {
            url:         self.url.clone(),
            headers:     self.headers.clone(),
            destination: destination.into(),
            remote_key:  String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_token_range_header() {
        let url = Url::parse("https://cdn.example/attachments/42").unwrap();
        let token = ResumeToken::new(url, vec![], 512, Some("\"v1\"".into()));
        assert_eq!(token.offset(), 512);
        assert_eq!(token.range_header(), "bytes=512-");
        assert_eq!(token.validator(), Some("\"v1\""));
    }

    #[test]
    fn test_request_builder() {
        let url = Url::parse("https://cdn.example/attachments/42").unwrap();
        let request = DownloadRequest::new(url, "/tmp/x.part")
            .header("Content-Type", "application/octet-stream")
            .remote_key("42");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.remote_key, "42");
        assert_eq!(request.destination(), Path::new("/tmp/x.part"));
    }
}
