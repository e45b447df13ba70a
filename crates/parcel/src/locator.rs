use std::path::Path;

use parcel_fetch::{DownloadRequest, FetchError};
use url::Url;

use crate::pointer::AttachmentPointer;

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const CIPHERTEXT_CONTENT_TYPE: &str = "application/octet-stream";

/// Maps pointers to CDN resource URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    cdn_base: Url,
}

impl ResourceLocator {
    pub fn new(cdn_base: Url) -> Self { Self { cdn_base } }

    pub fn cdn_base(&self) -> &Url { &self.cdn_base }

    /// `<cdn>/<signed key>` when the pointer is pre-signed, else
    /// `<cdn>/attachments/<remote key>`. Key segments are percent-encoded.
    pub fn url_for(&self, pointer: &AttachmentPointer) -> Result<Url, FetchError> {
        let segments: Vec<&str> = match pointer.signed_key.as_deref() {
            Some(signed) => signed.split('/').filter(|s| !s.is_empty()).collect(),
            None if pointer.remote_key.is_empty() => Vec::new(),
            None => vec!["attachments", pointer.remote_key.as_str()],
        };
        if segments.is_empty() {
            return Err(FetchError::InvalidUrl(format!("attachment {} has no resource key", pointer.id)));
        }

        let mut url = self.cdn_base.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::InvalidUrl(format!("{} cannot be a base", self.cdn_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn request(&self, pointer: &AttachmentPointer, destination: &Path) -> Result<DownloadRequest, FetchError> {
        Ok(DownloadRequest::new(self.url_for(pointer)?, destination)
            .header(CONTENT_TYPE_HEADER, CIPHERTEXT_CONTENT_TYPE)
            .remote_key(pointer.remote_key.clone()))
    }
}
