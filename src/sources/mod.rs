pub mod megacloud;

pub use megacloud::MegaCloudSource;
