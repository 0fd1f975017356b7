//! JSON-over-HTTP directory backend.
//!
//! Publishing is a `POST` of the [`RoomSnapshot`] to the endpoint,
//! removal a `DELETE` with `{"GUID": ...}`, and listing a `GET` that
//! answers `{"rooms": [...]}`. Every request carries the `x-username`,
//! `x-token` and `api-version` headers.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::snapshot::RoomList;
use crate::{AnnounceError, DirectoryBackend, RoomListing, RoomSnapshot};

/// Directory API version sent with every request.
pub const API_VERSION: &str = "1";

/// Environment variable holding the directory endpoint URL.
pub const ENV_ENDPOINT_URL: &str = "ROOMLINK_ANNOUNCE_URL";
/// Environment variable holding the directory username.
pub const ENV_USERNAME: &str = "ROOMLINK_USERNAME";
/// Environment variable holding the directory token.
pub const ENV_TOKEN: &str = "ROOMLINK_TOKEN";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the directory lives and who we are to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebBackendConfig {
    pub endpoint_url: String,
    pub username: String,
    pub token: String,
}

impl WebBackendConfig {
    /// Reads the configuration from `ROOMLINK_ANNOUNCE_URL`,
    /// `ROOMLINK_USERNAME` and `ROOMLINK_TOKEN`. Unset variables are
    /// left empty.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            endpoint_url: lookup(ENV_ENDPOINT_URL).unwrap_or_default(),
            username: lookup(ENV_USERNAME).unwrap_or_default(),
            token: lookup(ENV_TOKEN).unwrap_or_default(),
        }
    }

    fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.token.is_empty()
    }
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    #[serde(rename = "GUID")]
    guid: &'a str,
}

/// A [`DirectoryBackend`] that talks to a web service.
#[derive(Debug, Clone)]
pub struct WebBackend {
    config: WebBackendConfig,
    client: Client,
}

impl WebBackend {
    /// # Errors
    /// [`AnnounceError::Http`] if the HTTP client can't be set up.
    pub fn new(config: WebBackendConfig) -> Result<Self, AnnounceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &WebBackendConfig {
        &self.config
    }

    fn endpoint(&self) -> Result<&str, AnnounceError> {
        if self.config.endpoint_url.is_empty() {
            return Err(AnnounceError::NoEndpoint);
        }
        Ok(&self.config.endpoint_url)
    }

    /// Writes need credentials; reads don't.
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, AnnounceError> {
        if !self.config.has_credentials() {
            return Err(AnnounceError::MissingCredentials);
        }
        Ok(request
            .header("x-username", &self.config.username)
            .header("x-token", &self.config.token)
            .header("api-version", API_VERSION))
    }
}

fn check_status(response: Response) -> Result<Response, AnnounceError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(AnnounceError::Status(status.as_u16()));
    }
    Ok(response)
}

impl DirectoryBackend for WebBackend {
    fn publish(&self, room: &RoomSnapshot) -> Result<(), AnnounceError> {
        let url = self.endpoint()?;
        let request = self.authorized(self.client.post(url))?.json(room);
        check_status(request.send()?)?;
        tracing::debug!(guid = %room.guid, members = room.members.len(), "room published");
        Ok(())
    }

    fn delete(&self, guid: &str) -> Result<(), AnnounceError> {
        let url = self.endpoint()?;
        let request = self.authorized(self.client.delete(url))?.json(&DeleteRequest { guid });
        check_status(request.send()?)?;
        tracing::debug!(guid, "room listing deleted");
        Ok(())
    }

    fn fetch_room_list(&self) -> Result<Vec<RoomListing>, AnnounceError> {
        let url = self.endpoint()?;
        let response = check_status(self.client.get(url).header("api-version", API_VERSION).send()?)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.contains("application/json") {
            return Err(AnnounceError::UnexpectedContentType(content_type));
        }

        let body = response.bytes()?;
        let list: RoomList = serde_json::from_slice(&body)?;
        Ok(list.rooms)
    }
}
