//! Top-level error type for fatal startup failures (§7). Control-path
//! errors never reach here — they cross the HTTP boundary as
//! `OperationResult`/`error_code` values produced by `rvc-store`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RvcdError {
    #[error(transparent)]
    Catalog(#[from] rvc_spec::CatalogError),

    #[error(transparent)]
    Mapping(#[from] rvc_mapping::MappingError),

    #[error(transparent)]
    Transport(#[from] rvc_bus::TransportError),

    #[error(transparent)]
    Feature(#[from] rvc_features::FeatureError),

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}
