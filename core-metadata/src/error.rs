use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Artwork store error: {0}")]
    ArtworkStore(String),

    #[error("Invalid artwork settings: {0}")]
    InvalidSettings(String),

    #[error("Service error: {0}")]
    Service(#[from] core_library::ServiceError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
