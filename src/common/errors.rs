use thiserror::Error;

/// Failures on the watch-resolution path. All of these are terminal for
/// the request that hit them; nothing is retried internally.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Transport failure or an undecodable body from the catalog site.
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(#[from] reqwest::Error),

    /// The episode sources response carried no usable link field.
    #[error("source link not found")]
    MissingLink,

    /// getSources returned no body we can work with.
    #[error("invalid sources payload")]
    InvalidSourcesPayload,

    /// Neither nonce shape matched the embed page.
    #[error("nonce not found in embed page")]
    NonceNotFound,

    /// The player script yielded no usable offset/length pairs.
    #[error("decrypt key schedule not found in player script")]
    KeyScheduleNotFound,

    /// Covers key derivation, the block cipher, padding and the final
    /// JSON parse. CBC gives no integrity error of its own, so most key
    /// mismatches surface here as a parse failure.
    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// Failures on the relay path.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing url parameter")]
    BadRequest,

    #[error("proxy fetch failed: {0}")]
    ProxyFetch(#[from] reqwest::Error),
}
