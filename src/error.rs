//! Error types for bulletin-board graph operations.

use thiserror::Error;

/// Result type alias for PQBBS operations.
pub type Result<T> = std::result::Result<T, PqbbsError>;

/// Main error type for PQBBS operations.
///
/// The first six variants are the failures a caller of the board operations
/// can observe. The rest describe infrastructure failures that are usually
/// wrapped into one of those before they reach the caller.
#[derive(Error, Debug)]
pub enum PqbbsError {
    /// A signing key is required but the board has none registered
    #[error("Not master: {0}")]
    NotMaster(String),

    /// A container, board or object that must exist is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// The board identity is already registered
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The transport refused a subscribe or unsubscribe request
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    /// A referenced object could not be decoded
    #[error("Corrupt object ({context}): {source}")]
    Corrupt {
        /// Which container or operation was reading the object.
        context: String,
        /// The underlying store or decode error.
        #[source]
        source: Box<PqbbsError>,
    },

    /// The atomic publish step itself failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Cryptographic operation errors
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Key reconstruction or validation errors
    #[error("Key error: {0}")]
    Key(String),

    /// Signature creation or verification errors
    #[error("Signature error: {0}")]
    Signature(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PqbbsError {
    /// Creates a new not-master error.
    pub fn not_master<T: ToString>(msg: T) -> Self {
        Self::NotMaster(msg.to_string())
    }

    /// Creates a new not-found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new already-exists error.
    pub fn already_exists<T: ToString>(msg: T) -> Self {
        Self::AlreadyExists(msg.to_string())
    }

    /// Creates a new subscription error.
    pub fn subscription<T: ToString>(msg: T) -> Self {
        Self::SubscriptionFailed(msg.to_string())
    }

    /// Wraps an underlying error as a corrupt-object error with context.
    pub fn corrupt<T: ToString>(context: T, source: PqbbsError) -> Self {
        Self::Corrupt {
            context: context.to_string(),
            source: Box::new(source),
        }
    }

    /// Creates a new transaction error.
    pub fn transaction<T: ToString>(msg: T) -> Self {
        Self::TransactionFailed(msg.to_string())
    }

    /// Creates a new cryptographic error.
    pub fn crypto<T: ToString>(msg: T) -> Self {
        Self::Crypto(msg.to_string())
    }

    /// Creates a new key error.
    pub fn key<T: ToString>(msg: T) -> Self {
        Self::Key(msg.to_string())
    }

    /// Creates a new signature error.
    pub fn signature<T: ToString>(msg: T) -> Self {
        Self::Signature(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Passes caller-facing errors through and reports infrastructure
    /// failures as `TransactionFailed`, prefixed with `context`.
    pub(crate) fn in_transaction(self, context: &str) -> Self {
        match self {
            Self::NotMaster(_)
            | Self::NotFound(_)
            | Self::AlreadyExists(_)
            | Self::SubscriptionFailed(_)
            | Self::Corrupt { .. }
            | Self::TransactionFailed(_) => self,
            other => Self::transaction(format!("{}: {}", context, other)),
        }
    }
}
