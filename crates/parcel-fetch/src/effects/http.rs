use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT_RANGES, CONTENT_RANGE, ETAG, IF_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use url::Url;

use crate::data::{DownloadRequest, ProgressFn, ResumeToken, TransferProgress};
use crate::effects::Transport;
use crate::error::{FetchError, NetworkKind, TransferFailure};

/// Timeouts and identity for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Maximum silence between two body chunks.
    pub read_timeout:    Duration,
    pub user_agent:      Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout:    Duration::from_secs(30),
            user_agent:      None,
        }
    }
}

/// Production transport over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

/// Request identity carried into a resume token if the body is cut short.
struct Origin<'a> {
    url:       &'a Url,
    headers:   &'a [(String, String)],
    validator: Option<String>,
    ranges:    bool,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout);
        if let Some(agent) = config.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(map_reqwest)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self { Self { client } }

    async fn send(
        &self,
        url: &Url,
        headers: &[(String, String)],
        range: Option<&ResumeToken>,
    ) -> Result<Response, FetchError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(token) = range {
            request = request.header(RANGE, token.range_header());
            if let Some(validator) = token.validator() {
                request = request.header(IF_RANGE, validator);
            }
        }
        request.send().await.map_err(map_reqwest)
    }

    /// Stream the response body into `file`, starting the byte count at `base`.
    async fn pump(
        &self,
        response: Response,
        mut file: tokio::fs::File,
        destination: &Path,
        base: u64,
        origin: Origin<'_>,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf, TransferFailure> {
        let total = response.content_length().map(|len| len + base);
        let mut received = base;
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    file.flush().await?;
                    let error = map_reqwest(e);
                    if !origin.ranges || received == 0 {
                        return Err(TransferFailure::fatal(error));
                    }
                    let token = ResumeToken::new(
                        origin.url.clone(),
                        origin.headers.to_vec(),
                        received,
                        origin.validator.clone(),
                    );
                    return Err(TransferFailure::resumable(error, token));
                }
            };

            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            trace!(received, total = ?total, "chunk written");

            if on_progress(TransferProgress::new(received, total)).is_abort() {
                debug!(url = %origin.url, received, "transfer aborted by observer");
                return Err(TransferFailure::fatal(FetchError::Aborted));
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(destination.to_path_buf())
    }
}

impl Transport for ReqwestTransport {
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf, TransferFailure> {
        let response = self.send(&request.url, &request.headers, None).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(status, &request.url).into());
        }

        let origin = Origin {
            url:       &request.url,
            headers:   &request.headers,
            validator: header_str(&response, ETAG),
            ranges:    accepts_ranges(&response),
        };
        let file = tokio::fs::File::create(&request.destination).await?;
        self.pump(response, file, &request.destination, 0, origin, on_progress)
            .await
    }

    async fn resume(
        &self,
        token: ResumeToken,
        destination: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf, TransferFailure> {
        let on_disk = tokio::fs::metadata(destination).await.map(|m| m.len()).unwrap_or(0);
        if on_disk < token.offset() {
            debug!(url = %token.url(), on_disk, offset = token.offset(), "partial file shorter than token, restarting");
            return self.download(&token.restart(destination), on_progress).await;
        }

        let response = match self.send(token.url(), token.headers(), Some(&token)).await {
            Ok(response) => response,
            Err(error) if error.is_retryable() => return Err(TransferFailure::resumable(error, token)),
            Err(error) => return Err(error.into()),
        };

        let status = response.status();
        let origin = Origin {
            url:       token.url(),
            headers:   token.headers(),
            validator: header_str(&response, ETAG).or_else(|| token.validator().map(str::to_owned)),
            ranges:    true,
        };

        match status {
            StatusCode::PARTIAL_CONTENT if content_range_start(&response) != Some(token.offset()) => {
                debug!(
                    url = %token.url(),
                    offset = token.offset(),
                    content_range = ?header_str(&response, CONTENT_RANGE),
                    "partial content does not start at resume offset, restarting"
                );
                drop(response);
                self.download(&token.restart(destination), on_progress).await
            }
            StatusCode::PARTIAL_CONTENT => {
                let file = tokio::fs::OpenOptions::new().append(true).open(destination).await?;
                file.set_len(token.offset()).await?;
                debug!(url = %token.url(), offset = token.offset(), "resumed with partial content");
                self.pump(response, file, destination, token.offset(), origin, on_progress)
                    .await
            }
            status if status.is_success() => {
                debug!(url = %token.url(), "server ignored range, restarting from zero");
                let origin = Origin {
                    ranges: accepts_ranges(&response),
                    validator: header_str(&response, ETAG),
                    ..origin
                };
                let file = tokio::fs::File::create(destination).await?;
                self.pump(response, file, destination, 0, origin, on_progress).await
            }
            status => Err(http_error(status, token.url()).into()),
        }
    }
}

fn http_error(status: StatusCode, url: &Url) -> FetchError {
    FetchError::Http {
        status: status.as_u16(),
        url:    url.to_string(),
    }
}

fn header_str(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// First byte position of a `Content-Range: bytes START-END/TOTAL` header.
fn content_range_start(response: &Response) -> Option<u64> {
    header_str(response, CONTENT_RANGE).as_deref().and_then(parse_content_range_start)
}

fn parse_content_range_start(value: &str) -> Option<u64> {
    let (unit, range) = value.trim().split_once(' ')?;
    if !unit.eq_ignore_ascii_case("bytes") {
        return None;
    }
    let (start, _) = range.trim_start().split_once('-')?;
    start.parse().ok()
}

fn accepts_ranges(response: &Response) -> bool {
    response
        .headers()
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("bytes"))
}

pub(crate) fn map_reqwest(e: reqwest::Error) -> FetchError {
    let message = e.to_string();
    if e.is_timeout() {
        FetchError::network(NetworkKind::Timeout, message)
    } else if e.is_connect() {
        FetchError::network(connect_kind(&e), message)
    } else if e.is_body() || e.is_decode() {
        FetchError::network(NetworkKind::Interrupted, message)
    } else if e.is_builder() {
        FetchError::InvalidUrl(message)
    } else if let Some(status) = e.status() {
        FetchError::Http {
            status: status.as_u16(),
            url:    e.url().map(Url::to_string).unwrap_or_default(),
        }
    } else if e.is_request() {
        FetchError::network(NetworkKind::Other, message)
    } else {
        FetchError::Http {
            status: 0,
            url:    e.url().map(Url::to_string).unwrap_or_default(),
        }
    }
}

/// hyper's connector reports resolver failures as a "dns error" somewhere in
/// the source chain of a connect error.
fn connect_kind(error: &(dyn std::error::Error + 'static)) -> NetworkKind {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.to_string().to_ascii_lowercase().contains("dns error") {
            return NetworkKind::Dns;
        }
        current = e.source();
    }
    NetworkKind::Connect
}
