use std::sync::LazyLock;

use regex::Regex;

use crate::common::errors::ExtractError;

// The embed page carries the token either as one 48-character run or as
// three separate 16-character runs. Nothing upstream documents either
// shape; both have been observed in live pages.
static NONCE_48: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b[a-zA-Z0-9]{48}\b").expect("valid regex"));

static NONCE_3X16: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\b([a-zA-Z0-9]{16})\b.*?\b([a-zA-Z0-9]{16})\b.*?\b([a-zA-Z0-9]{16})\b")
    .expect("valid regex")
});

/// Pulls the `_k` session nonce out of embed page markup.
///
/// The single 48-character token is tried first; failing that, three
/// 16-character tokens concatenated in order of appearance. The attempt
/// order is part of the contract, the patterns are alternatives and are
/// never merged.
pub fn extract_nonce(html: &str) -> Result<String, ExtractError> {
  if let Some(m) = NONCE_48.find(html) {
    return Ok(m.as_str().to_string());
  }

  if let Some(caps) = NONCE_3X16.captures(html) {
    return Ok(format!("{}{}{}", &caps[1], &caps[2], &caps[3]));
  }

  Err(ExtractError::NonceNotFound)
}
