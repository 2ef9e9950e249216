use serde::{Deserialize, Serialize};

/// Upstream `getSources` response. `sources` arrives either as a plain
/// array of files or as a base64 blob that needs the player-script key
/// schedule to open.
#[derive(Debug, Deserialize)]
pub struct SourcesPayload {
  pub sources: Option<RawSources>,
  #[serde(default)]
  pub encrypted: bool,
  #[serde(default)]
  pub tracks: Vec<TrackEntry>,
  pub intro: Option<TimeRange>,
  pub outro: Option<TimeRange>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawSources {
  Plain(Vec<FileEntry>),
  Encrypted(String),
}

/// One media file as the upstream names it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileEntry {
  pub file: String,
  #[serde(rename = "type", default)]
  pub kind: String,
}

/// Subtitle or thumbnail track, passed through to the player untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackEntry {
  pub file: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
  pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
  pub start: f64,
  pub end: f64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct StreamSource {
  pub url: String,
  #[serde(rename = "type")]
  pub kind: String,
}

/// Terminal artifact handed back to the player.
#[derive(Debug, Serialize)]
pub struct StreamManifest {
  pub sources: Vec<StreamSource>,
  #[serde(rename = "embedUrl", skip_serializing_if = "Option::is_none")]
  pub embed_url: Option<String>,
  pub tracks: Vec<TrackEntry>,
  pub intro: TimeRange,
  pub outro: TimeRange,
}

impl StreamManifest {
  /// Degraded shape for links without a recognizable embed hash: no
  /// playable sources, the raw link is meant for an opaque iframe.
  pub fn embed_fallback(link: String) -> Self {
    Self {
      sources: Vec::new(),
      embed_url: Some(link),
      tracks: Vec::new(),
      intro: TimeRange::default(),
      outro: TimeRange::default(),
    }
  }
}
