//! Subsonic REST connector
//!
//! Implements `MusicService` on top of the host's `HttpClient`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_library::{AlbumDetails, MusicService, Result as ServiceResult};
use core_runtime::logging::{redact_if_sensitive, redact_url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::auth::SubsonicCredentials;
use crate::error::{Result, SubsonicError};
use crate::types::SubsonicEnvelope;

/// Timeout for JSON API calls
const API_TIMEOUT: Duration = Duration::from_secs(15);

/// Subsonic API connector
///
/// Every request is authenticated with a fresh salt. URLs built by this
/// type carry the token and only reach logs through `redact_url`.
///
/// # Example
///
/// ```ignore
/// use provider_subsonic::{SubsonicConnector, SubsonicCredentials};
///
/// let creds = SubsonicCredentials::new("https://music.example.com", "joe", "sesame")?;
/// let connector = SubsonicConnector::new(http_client, creds);
/// let details = connector.get_album("al-1").await?;
/// ```
pub struct SubsonicConnector {
    http_client: Arc<dyn HttpClient>,
    credentials: SubsonicCredentials,
    api_timeout: Duration,
}

impl SubsonicConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: SubsonicCredentials) -> Self {
        Self {
            http_client,
            credentials,
            api_timeout: API_TIMEOUT,
        }
    }

    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    pub fn credentials(&self) -> &SubsonicCredentials {
        &self.credentials
    }

    /// `{base}/rest/{endpoint}?{auth}&key=value...`
    fn build_url(&self, endpoint: &str, params: &[(&str, &str)], json: bool) -> Result<String> {
        let mut url = format!(
            "{}/rest/{}?{}",
            self.credentials.base_url,
            endpoint,
            self.credentials.auth_query(json)?
        );
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        Ok(url)
    }

    #[instrument(skip(self, url), fields(endpoint = %endpoint))]
    async fn execute(&self, endpoint: &str, url: String) -> Result<HttpResponse> {
        debug!(url = %redact_url(&url), "Calling Subsonic API");
        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(self.api_timeout);

        let response = self.http_client.execute(request).await?;

        if response.status == 401 {
            warn!(
                user = %redact_if_sensitive("username", &self.credentials.username),
                "Server rejected credentials"
            );
            return Err(SubsonicError::AuthenticationFailed(format!(
                "HTTP 401 from {}",
                endpoint
            )));
        }
        if !response.is_success() {
            warn!(status = response.status, "API request failed");
            return Err(SubsonicError::HttpStatus {
                status: response.status,
                endpoint: endpoint.to_string(),
            });
        }

        debug!(status = response.status, bytes = response.body.len(), "API request succeeded");
        Ok(response)
    }

    fn parse_envelope(response: &HttpResponse) -> Result<SubsonicEnvelope> {
        let envelope: SubsonicEnvelope = response
            .json()
            .map_err(|e| SubsonicError::ParseError(e.to_string()))?;

        if !envelope.response.is_ok() {
            let (code, message) = envelope
                .response
                .error
                .as_ref()
                .map(|e| (e.code, e.message.clone()))
                .unwrap_or((0, "Unknown error".to_string()));
            return Err(SubsonicError::from_api(code, message));
        }

        Ok(envelope)
    }

    async fn fetch_album(&self, album_id: &str) -> Result<AlbumDetails> {
        let url = self.build_url("getAlbum", &[("id", album_id)], true)?;
        let response = self.execute("getAlbum", url).await?;
        let envelope = Self::parse_envelope(&response)?;

        let payload = envelope.response.album.ok_or_else(|| {
            SubsonicError::ParseError(format!("getAlbum response for {} has no album", album_id))
        })?;

        let album = payload.album;
        let songs = payload
            .song
            .into_iter()
            .map(|mut song| {
                if song.album_id.is_none() {
                    song.album_id = Some(album.id.clone());
                }
                if song.album.is_none() {
                    song.album = Some(album.name.clone());
                }
                song
            })
            .collect::<Vec<_>>();

        debug!(album_id, songs = songs.len(), "Fetched album");
        Ok(AlbumDetails { album, songs })
    }

    async fn fetch_cover_art(&self, cover_art_id: &str, size: u32) -> Result<Bytes> {
        let size = size.to_string();
        let url = self.build_url("getCoverArt", &[("id", cover_art_id), ("size", &size)], true)?;
        let response = self.execute("getCoverArt", url).await?;

        // Binary endpoints report failures as a JSON envelope with status 200
        if is_json(&response) {
            Self::parse_envelope(&response)?;
            return Err(SubsonicError::ParseError(format!(
                "getCoverArt returned JSON instead of image for {}",
                cover_art_id
            )));
        }
        if response.body.is_empty() {
            return Err(SubsonicError::ParseError(format!(
                "Empty cover art for {}",
                cover_art_id
            )));
        }

        Ok(response.body)
    }
}

fn is_json(response: &HttpResponse) -> bool {
    response
        .headers
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v.contains("json"))
}

#[async_trait]
impl MusicService for SubsonicConnector {
    async fn get_album(&self, album_id: &str) -> ServiceResult<AlbumDetails> {
        Ok(self.fetch_album(album_id).await?)
    }

    async fn stream_url(&self, song_id: &str) -> ServiceResult<Option<String>> {
        if song_id.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.build_url("stream", &[("id", song_id)], false)?))
    }

    async fn cover_art(&self, cover_art_id: &str, size: u32) -> ServiceResult<Bytes> {
        Ok(self.fetch_cover_art(cover_art_id, size).await?)
    }
}
