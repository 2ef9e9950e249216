use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER};

use crate::common::errors::RelayError;
use crate::common::http::HttpClient;
use crate::config::UpstreamConfig;

/// Stateless per-request proxy for playlists and media segments.
///
/// Browsers cannot fetch the media host directly across origins, so every
/// playlist and segment request routes through here. Playlists get their
/// bare relative lines rewritten to absolute upstream URIs before being
/// handed back; anything else streams through untouched.
pub struct HlsRelay {
    client: Client,
    media_origin: String,
}

/// What came back from the upstream, already split by playlist detection.
pub struct RelayedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: RelayedBody,
}

pub enum RelayedBody {
    Playlist(String),
    Stream(reqwest::Response),
}

impl HlsRelay {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: HttpClient::new()?,
            media_origin: config.embed.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch(&self, target: &str) -> Result<RelayedResponse, RelayError> {
        if target.is_empty() {
            return Err(RelayError::BadRequest);
        }

        // The media host rejects fetches without a Referer/Origin pair
        // from its own player.
        let response = self
            .client
            .get(target)
            .header(REFERER, format!("{}/", self.media_origin))
            .header(ORIGIN, self.media_origin.as_str())
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if is_playlist(&content_type, target) {
            let text = response.text().await?;
            Ok(RelayedResponse {
                status,
                content_type,
                body: RelayedBody::Playlist(rewrite_playlist(&text, target)),
            })
        } else {
            Ok(RelayedResponse {
                status,
                content_type,
                body: RelayedBody::Stream(response),
            })
        }
    }
}

/// A playlist is recognized by content type or by the `.m3u8` extension
/// on the URL path.
pub fn is_playlist(content_type: &str, url: &str) -> bool {
    content_type.to_ascii_lowercase().contains("mpegurl")
        || url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .ends_with(".m3u8")
}

/// Rewrites bare relative lines to absolute URIs under the requested
/// target's directory. Comment lines and already-absolute lines pass
/// through byte-identical. Without this, the player resolves relative
/// entries against the relay's own origin.
pub fn rewrite_playlist(text: &str, target_url: &str) -> String {
    let base = match target_url.rfind('/') {
        Some(i) => &target_url[..=i],
        None => target_url,
    };

    let mut out = text
        .lines()
        .map(|line| {
            if line.is_empty() || line.starts_with('#') || is_absolute(line) {
                line.to_string()
            } else {
                format!("{base}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn is_absolute(line: &str) -> bool {
    line.starts_with("http://") || line.starts_with("https://")
}
