use thiserror::Error;

/// Errors raised while turning bytes and headers back into events.
///
/// Every variant is a hard failure: a message that cannot be decoded is
/// never replaced with a default value.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No event kind is published under this routing key.
    #[error("Unknown routing key: {0}")]
    UnknownRoutingKey(String),

    /// The payload bytes are not a valid message for the kind.
    #[error("Failed to decode {kind} payload: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: prost::DecodeError,
    },

    /// A field the event cannot exist without was absent.
    #[error("{kind} is missing required field `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// A field was present but out of range.
    #[error("{kind} has invalid `{field}`: {reason}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },

    /// The producer used a newer, incompatible schema.
    #[error("Unsupported schema version {found} (supported up to {supported})")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },

    /// A reserved header could not be parsed.
    #[error("Invalid header `{name}`: {value:?}")]
    InvalidHeader { name: &'static str, value: String },
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
