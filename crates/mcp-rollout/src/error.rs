use thiserror::Error;

#[derive(Debug, Error)]
pub enum RolloutError {
    #[error(transparent)]
    Store(#[from] mcp_store::StoreError),
}

pub type Result<T> = std::result::Result<T, RolloutError>;
