//! Registry error types

use alloy_primitives::{Address, B256, U256};
use namechain_core::{CodecError, NameError, PriceError, RoleBitmap, Side};
use thiserror::Error;

/// Coarse classification of a `RegistryError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed names or messages
    Encoding,
    /// Missing roles or approvals
    Authorization,
    /// Invariant guards on registry and registrar state
    StateConflict,
    /// Payment collection and price conversion
    Payment,
    /// Inconsistent cross-chain message contents
    CrossChain,
    /// Deployment and configuration mistakes
    Config,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Name error: {0}")]
    Name(#[from] NameError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Price error: {0}")]
    Price(#[from] PriceError),

    #[error("Account {account} lacks roles {roles} on resource {resource:#x}")]
    UnauthorizedAccountRoles {
        resource: U256,
        roles: RoleBitmap,
        account: Address,
    },

    #[error("Operator {operator} is not approved to transfer tokens of {owner}")]
    TransferNotApproved { operator: Address, owner: Address },

    #[error("No registry deployed at {registry}")]
    RegistryNotDeployed { registry: Address },

    #[error("Name already registered: {label}")]
    NameAlreadyRegistered { label: String },

    #[error("Name expired: token {token_id:#x}")]
    NameExpired { token_id: U256 },

    #[error("Cannot reduce expiration of {token_id:#x} from {current} to {requested}")]
    CannotReduceExpiration {
        token_id: U256,
        current: u64,
        requested: u64,
    },

    #[error("Cannot set expiry {expiry} at or before current time {now}")]
    CannotSetPastExpiration { expiry: u64, now: u64 },

    #[error("Expiry overflow adding duration {duration}")]
    ExpiryOverflow { duration: u64 },

    #[error("No generations left for {label}")]
    GenerationExhausted { label: String },

    #[error("Account {account} does not own token {token_id:#x}")]
    NotTokenOwner { token_id: U256, account: Address },

    #[error("Invalid token receiver {account}")]
    InvalidReceiver { account: Address },

    #[error("Commitment not found: {commitment}")]
    CommitmentNotFound { commitment: B256 },

    #[error("Commitment {commitment} too new: age {age}s, minimum {min_age}s")]
    CommitmentTooNew {
        commitment: B256,
        age: u64,
        min_age: u64,
    },

    #[error("Commitment {commitment} too old: age {age}s, maximum {max_age}s")]
    CommitmentTooOld {
        commitment: B256,
        age: u64,
        max_age: u64,
    },

    #[error("Duration {duration}s below minimum {minimum}s")]
    DurationTooShort { duration: u64, minimum: u64 },

    #[error("Payment token {token} is not accepted")]
    UnsupportedPaymentToken { token: Address },

    #[error("Transfer of {amount} {token} from {from} to {to} returned false")]
    TransferFailed {
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },

    #[error("Token {token} reverted: {reason}")]
    TokenReverted { token: Address, reason: String },

    #[error("Token {token_id:#x} arrived from unmanaged registry {registry}")]
    ForeignRegistry { registry: Address, token_id: U256 },

    #[error("Label {label:?} does not match token {token_id:#x}")]
    LabelMismatch { token_id: U256, label: String },

    #[error("Invalid TLD: {tld:?}")]
    InvalidTLD { tld: String },

    #[error("Label not found in name: {label:?}")]
    LabelNotFound { label: String },

    #[error("Parent not migrated: {name}")]
    ParentNotMigrated { name: String },

    #[error("Stale message for {token:#x}: sequence {sequence}, expected {expected}")]
    StaleMessage {
        token: U256,
        sequence: u64,
        expected: u64,
    },

    #[error("Message from unexpected origin {origin}")]
    UnexpectedOrigin { origin: Side },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl RegistryError {
    /// Stable error code for integrators and tests
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::Name(NameError::LabelEmpty) => "LABEL_EMPTY",
            RegistryError::Name(NameError::LabelTooLong { .. }) => "LABEL_TOO_LONG",
            RegistryError::Name(NameError::InvalidEncoding { .. }) => "INVALID_ENCODING",
            RegistryError::Codec(CodecError::UnknownMessageType { .. }) => "UNKNOWN_MESSAGE_TYPE",
            RegistryError::Codec(_) => "INVALID_MESSAGE",
            RegistryError::Price(PriceError::AmountTooLarge { .. }) => "AMOUNT_TOO_LARGE",
            RegistryError::Price(PriceError::LabelLengthNotPriced { .. }) => {
                "LABEL_LENGTH_NOT_PRICED"
            }
            RegistryError::Price(PriceError::Overflow { .. }) => "PRICE_OVERFLOW",
            RegistryError::Price(PriceError::InvalidConfig(_)) => "INVALID_PRICING_CONFIG",
            RegistryError::UnauthorizedAccountRoles { .. } => "UNAUTHORIZED_ACCOUNT_ROLES",
            RegistryError::TransferNotApproved { .. } => "TRANSFER_NOT_APPROVED",
            RegistryError::RegistryNotDeployed { .. } => "REGISTRY_NOT_DEPLOYED",
            RegistryError::NameAlreadyRegistered { .. } => "NAME_ALREADY_REGISTERED",
            RegistryError::NameExpired { .. } => "NAME_EXPIRED",
            RegistryError::CannotReduceExpiration { .. } => "CANNOT_REDUCE_EXPIRATION",
            RegistryError::CannotSetPastExpiration { .. } => "CANNOT_SET_PAST_EXPIRATION",
            RegistryError::ExpiryOverflow { .. } => "EXPIRY_OVERFLOW",
            RegistryError::GenerationExhausted { .. } => "GENERATION_EXHAUSTED",
            RegistryError::NotTokenOwner { .. } => "NOT_TOKEN_OWNER",
            RegistryError::InvalidReceiver { .. } => "INVALID_RECEIVER",
            RegistryError::CommitmentNotFound { .. } => "COMMITMENT_NOT_FOUND",
            RegistryError::CommitmentTooNew { .. } => "COMMITMENT_TOO_NEW",
            RegistryError::CommitmentTooOld { .. } => "COMMITMENT_TOO_OLD",
            RegistryError::DurationTooShort { .. } => "DURATION_TOO_SHORT",
            RegistryError::UnsupportedPaymentToken { .. } => "UNSUPPORTED_PAYMENT_TOKEN",
            RegistryError::TransferFailed { .. } => "TRANSFER_FAILED",
            RegistryError::TokenReverted { .. } => "TOKEN_REVERTED",
            RegistryError::ForeignRegistry { .. } => "FOREIGN_REGISTRY",
            RegistryError::LabelMismatch { .. } => "LABEL_MISMATCH",
            RegistryError::InvalidTLD { .. } => "INVALID_TLD",
            RegistryError::LabelNotFound { .. } => "LABEL_NOT_FOUND",
            RegistryError::ParentNotMigrated { .. } => "PARENT_NOT_MIGRATED",
            RegistryError::StaleMessage { .. } => "STALE_MESSAGE",
            RegistryError::UnexpectedOrigin { .. } => "UNEXPECTED_ORIGIN",
            RegistryError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Name(_) | RegistryError::Codec(_) => ErrorKind::Encoding,
            RegistryError::Price(PriceError::InvalidConfig(_)) => ErrorKind::Config,
            RegistryError::Price(_) => ErrorKind::Payment,
            RegistryError::UnauthorizedAccountRoles { .. }
            | RegistryError::TransferNotApproved { .. } => ErrorKind::Authorization,
            RegistryError::NameAlreadyRegistered { .. }
            | RegistryError::NameExpired { .. }
            | RegistryError::CannotReduceExpiration { .. }
            | RegistryError::CannotSetPastExpiration { .. }
            | RegistryError::ExpiryOverflow { .. }
            | RegistryError::GenerationExhausted { .. }
            | RegistryError::NotTokenOwner { .. }
            | RegistryError::InvalidReceiver { .. }
            | RegistryError::CommitmentNotFound { .. }
            | RegistryError::CommitmentTooNew { .. }
            | RegistryError::CommitmentTooOld { .. }
            | RegistryError::DurationTooShort { .. } => ErrorKind::StateConflict,
            RegistryError::UnsupportedPaymentToken { .. }
            | RegistryError::TransferFailed { .. }
            | RegistryError::TokenReverted { .. } => ErrorKind::Payment,
            RegistryError::ForeignRegistry { .. }
            | RegistryError::LabelMismatch { .. }
            | RegistryError::InvalidTLD { .. }
            | RegistryError::LabelNotFound { .. }
            | RegistryError::ParentNotMigrated { .. }
            | RegistryError::StaleMessage { .. }
            | RegistryError::UnexpectedOrigin { .. } => ErrorKind::CrossChain,
            RegistryError::RegistryNotDeployed { .. } | RegistryError::InvalidConfig(_) => {
                ErrorKind::Config
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = RegistryError::NameExpired { token_id: U256::from(1u8) };
        assert_eq!(err.code(), "NAME_EXPIRED");
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let err = RegistryError::from(NameError::LabelEmpty);
        assert_eq!(err.code(), "LABEL_EMPTY");
        assert_eq!(err.kind(), ErrorKind::Encoding);

        let err = RegistryError::from(CodecError::UnknownMessageType { tag: 9 });
        assert_eq!(err.code(), "UNKNOWN_MESSAGE_TYPE");
    }

    #[test]
    fn test_price_errors_split_by_kind() {
        let err = RegistryError::from(PriceError::AmountTooLarge {
            from_decimals: 6,
            to_decimals: 18,
        });
        assert_eq!(err.kind(), ErrorKind::Payment);

        let err = RegistryError::from(PriceError::InvalidConfig("x".into()));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_unauthorized_message_has_context() {
        let err = RegistryError::UnauthorizedAccountRoles {
            resource: U256::from(0x42u8),
            roles: namechain_core::roles::roles::RENEW,
            account: Address::repeat_byte(0xaa),
        };
        let text = err.to_string();
        assert!(text.contains("0x42"), "resource missing from {}", text);
        let account = Address::repeat_byte(0xaa).to_string();
        assert!(text.contains(&account), "account missing from {}", text);
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }
}
