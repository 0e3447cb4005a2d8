/// Errors from parsing identifier and key representations.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded value had the wrong length.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The input was not a valid `store:objecthex` key.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
}
