use crate::relay::HlsRelay;
use crate::sources::MegaCloudSource;

/// Shared state handed to every request handler.
pub struct AppState {
    pub megacloud: MegaCloudSource,
    pub relay: HlsRelay,
}
