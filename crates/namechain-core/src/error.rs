//! Core error types

use thiserror::Error;

/// Errors from the DNS name codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Label is empty")]
    LabelEmpty,

    #[error("Label too long: {length} bytes (max 255)")]
    LabelTooLong { length: usize },

    #[error("Invalid name encoding at offset {offset}")]
    InvalidEncoding { offset: usize },
}

/// Errors from the bridge message codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unknown message type: {tag:#04x}")]
    UnknownMessageType { tag: u8 },

    #[error("Message type mismatch: expected {expected}, got {actual}")]
    MessageTypeMismatch { expected: String, actual: String },

    #[error("Message truncated: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Message has {extra} trailing bytes")]
    TrailingBytes { extra: usize },

    #[error("Invalid UTF-8 in label at offset {offset}")]
    InvalidLabel { offset: usize },

    #[error("Invalid boolean byte {value:#04x} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },

    #[error("Field too large: {field} is {length} bytes")]
    FieldTooLarge { field: &'static str, length: usize },
}

/// Errors from price computation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("Amount too large for conversion from {from_decimals} to {to_decimals} decimals")]
    AmountTooLarge { from_decimals: u8, to_decimals: u8 },

    #[error("Price overflow computing {what}")]
    Overflow { what: &'static str },

    #[error("Label length {length} is not priced")]
    LabelLengthNotPriced { length: usize },

    #[error("Invalid pricing config: {0}")]
    InvalidConfig(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Umbrella error for the core crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Name error: {0}")]
    Name(#[from] NameError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Price error: {0}")]
    Price(#[from] PriceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
