pub mod crypto;
pub mod keys;
pub mod nonce;
pub mod types;

use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, REFERER};
use tracing::debug;

use crate::common::errors::ExtractError;
use crate::common::http::HttpClient;
use crate::config::UpstreamConfig;
use types::{FileEntry, RawSources, SourcesPayload, StreamManifest, StreamSource, TimeRange, TrackEntry};

// Embed links look like `https://<host>/embed-2/v3/e-1/<hash>?k=1`; older
// pages use `/e/` without the revision. Links that match neither are
// rendered as an opaque iframe instead of being resolved.
static EMBED_HASH: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"/e(?:-1)?/([^/?]+)").expect("valid regex"));

/// Extracts playable streams from the MegaCloud embedded host.
pub struct MegaCloudSource {
  client: Client,
  catalog_base: String,
  embed_base: String,
}

impl MegaCloudSource {
  pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
    let client = match &config.user_agent {
      Some(ua) => HttpClient::with_user_agent(ua)?,
      None => HttpClient::new()?,
    };
    Ok(Self {
      client,
      catalog_base: config.catalog.trim_end_matches('/').to_string(),
      embed_base: config.embed.trim_end_matches('/').to_string(),
    })
  }

  /// Resolves an opaque episode source id into a playable manifest.
  ///
  /// Every step depends on the previous one: the embed hash comes from the
  /// catalog link, the nonce from the embed page, the sources payload from
  /// the nonce, and the decrypt secret from a fresh player script.
  pub async fn resolve(&self, source_id: &str) -> Result<StreamManifest, ExtractError> {
    let link = self.fetch_episode_link(source_id).await?;

    let Some(hash) = extract_embed_hash(&link) else {
      debug!("no embed hash in link, falling back to iframe: {}", link);
      return Ok(StreamManifest::embed_fallback(link));
    };

    let embed_url = format!("{}/embed-2/v3/e-1/{}?k=1", self.embed_base, hash);
    let html = self.fetch_embed_page(&embed_url).await?;
    let nonce_token = nonce::extract_nonce(&html)?;

    let mut payload = self
      .fetch_sources_payload(&hash, &nonce_token, &embed_url)
      .await?;

    let files = match payload.sources.take() {
      Some(RawSources::Plain(files)) if !payload.encrypted => files,
      Some(RawSources::Encrypted(encoded)) => {
        let script = self.fetch_player_script().await?;
        let schedule = keys::extract_key_schedule(&script)?;
        let (secret, residual) = keys::carve_secret(&encoded, &schedule)?;
        crypto::decrypt_sources(&secret, &residual)?
      }
      _ => return Err(ExtractError::InvalidSourcesPayload),
    };

    Ok(build_manifest(
      files,
      payload.tracks,
      payload.intro,
      payload.outro,
    ))
  }

  async fn fetch_episode_link(&self, source_id: &str) -> Result<String, ExtractError> {
    let url = format!(
      "{}/ajax/v2/episode/sources?id={}",
      self.catalog_base, source_id
    );
    let body: serde_json::Value = self.client.get(&url).send().await?.json().await?;

    body
      .get("link")
      .and_then(|v| v.as_str())
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .ok_or(ExtractError::MissingLink)
  }

  // The host rejects requests without a Referer pointing back at itself
  // and the XHR marker.
  async fn fetch_embed_page(&self, embed_url: &str) -> Result<String, ExtractError> {
    let html = self
      .client
      .get(embed_url)
      .header(REFERER, embed_url)
      .header(ACCEPT, "*/*")
      .header("X-Requested-With", "XMLHttpRequest")
      .send()
      .await?
      .text()
      .await?;
    Ok(html)
  }

  async fn fetch_sources_payload(
    &self,
    video_id: &str,
    nonce_token: &str,
    embed_url: &str,
  ) -> Result<SourcesPayload, ExtractError> {
    let url = format!(
      "{}/embed-2/v3/e-1/getSources?id={}&_k={}",
      self.embed_base, video_id, nonce_token
    );
    let text = self
      .client
      .get(&url)
      .header(REFERER, embed_url)
      .header(ACCEPT, "*/*")
      .header("X-Requested-With", "XMLHttpRequest")
      .send()
      .await?
      .text()
      .await?;

    serde_json::from_str(&text).map_err(|_| ExtractError::InvalidSourcesPayload)
  }

  /// The upstream rotates the player script and caches hard by URL, so a
  /// timestamp query keeps the fetched schedule in step with the payload.
  async fn fetch_player_script(&self) -> Result<String, ExtractError> {
    let cache_bust = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_millis();
    let url = format!(
      "{}/js/player/a/v3/pro/embed-1.min.js?v={}",
      self.embed_base, cache_bust
    );
    Ok(self.client.get(&url).send().await?.text().await?)
  }
}

fn extract_embed_hash(link: &str) -> Option<String> {
  EMBED_HASH.captures(link).map(|caps| caps[1].to_string())
}

fn build_manifest(
  files: Vec<FileEntry>,
  tracks: Vec<TrackEntry>,
  intro: Option<TimeRange>,
  outro: Option<TimeRange>,
) -> StreamManifest {
  StreamManifest {
    sources: files
      .into_iter()
      .map(|f| StreamSource {
        url: f.file,
        kind: f.kind,
      })
      .collect(),
    embed_url: None,
    tracks,
    intro: intro.unwrap_or_default(),
    outro: outro.unwrap_or_default(),
  }
}
