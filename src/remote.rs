use reqwest::header::RANGE;
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::Settings;
use crate::error::SyncError;

const TOKEN_HEADER: &str = "X-Plex-Token";

/// Which bytes of a part to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    Full,
    /// `bytes=offset-`
    From(u64),
    /// The first `n` bytes, `bytes=0-(n-1)`.
    Head(u64),
}

impl ByteRange {
    fn header_value(&self) -> Option<String> {
        match *self {
            ByteRange::Full => None,
            ByteRange::From(offset) => Some(format!("bytes={offset}-")),
            ByteRange::Head(0) => None,
            ByteRange::Head(n) => Some(format!("bytes=0-{}", n - 1)),
        }
    }
}

/// Connection handle to the server holding the media bytes. Authentication
/// is attached to every request.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
    token: String,
}

impl RemoteStore {
    pub fn new(settings: &Settings) -> Result<Self, SyncError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .read_timeout(settings.read_timeout())
            .build()
            .map_err(|err| SyncError::network(&settings.baseurl, err))?;

        Ok(Self::with_client(client, &settings.baseurl, &settings.token))
    }

    pub fn with_client(client: Client, base_url: &str, token: &str) -> Self {
        RemoteStore {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        if key.starts_with('/') {
            format!("{}{}", self.base_url, key)
        } else {
            format!("{}/{}", self.base_url, key)
        }
    }

    /// Starts a GET for `key` and returns the streaming response. Non-success
    /// statuses are turned into [`SyncError::Status`].
    pub async fn fetch(&self, key: &str, range: ByteRange) -> Result<Response, SyncError> {
        let mut request = self.client.get(self.url_for(key));
        if !self.token.is_empty() {
            request = request.header(TOKEN_HEADER, &self.token);
        }
        if let Some(value) = range.header_value() {
            request = request.header(RANGE, value);
        }

        debug!("GET {key} {range:?}");
        let response = request
            .send()
            .await
            .map_err(|err| SyncError::network(key, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                key: key.to_string(),
                status,
            });
        }
        Ok(response)
    }
}
