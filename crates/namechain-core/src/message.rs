//! Bridge message codec
//!
//! Every message starts with a one-byte type tag so a receiver can dispatch
//! without decoding the payload. All integers are big-endian.
//!
//! ```text
//! EJECTION   [tag=0x01][name_len:4][dns name][transfer]
//! MIGRATION  [tag=0x02][name_len:4][dns name][transfer][to_l1:1][data_len:4][data]
//! RENEWAL    [tag=0x03][token_id:32][new_expiry:8]
//!
//! transfer   [label_len:4][label][owner:20][subregistry:20][resolver:20][expires:8][role_bitmap:32]
//! ```
//!
//! Decoding is strict: truncated input, trailing bytes and non-canonical
//! booleans are rejected. Labels must be UTF-8, as everywhere in `name`.

use std::fmt;

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::name::{canonical_id, label_hash};
use crate::roles::RoleBitmap;

/// Width of the type tag prefix
pub const MESSAGE_TYPE_LEN: usize = 1;

/// Encoded size of a renewal message
pub const RENEWAL_MESSAGE_LEN: usize = MESSAGE_TYPE_LEN + 32 + 8;

/// Fixed part of an encoded `TransferData` (everything but the label bytes)
const TRANSFER_FIXED_LEN: usize = 4 + 20 + 20 + 20 + 8 + 32;

/// Bridge message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MessageType {
    Ejection = 0x01,
    Migration = 0x02,
    Renewal = 0x03,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0x01 => Ok(MessageType::Ejection),
            0x02 => Ok(MessageType::Migration),
            0x03 => Ok(MessageType::Renewal),
            _ => Err(CodecError::UnknownMessageType { tag }),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Ejection => write!(f, "ejection"),
            MessageType::Migration => write!(f, "migration"),
            MessageType::Renewal => write!(f, "renewal"),
        }
    }
}

/// Target state of a name crossing the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    pub label: String,
    pub owner: Address,
    pub subregistry: Address,
    pub resolver: Address,
    pub expires: u64,
    pub role_bitmap: RoleBitmap,
}

impl TransferData {
    /// Canonical id of the label, shared by every generation of the name
    pub fn canonical_id(&self) -> U256 {
        canonical_id(U256::from_be_bytes(label_hash(&self.label).0))
    }
}

/// Payload of a migration message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationData {
    pub transfer: TransferData,
    /// Keep the name on L1 instead of moving it to L2
    pub to_l1: bool,
    /// Opaque extra data for the receiving side
    pub data: Bytes,
}

/// A decoded bridge message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    Ejection {
        dns_name: Bytes,
        transfer: TransferData,
    },
    Migration {
        dns_name: Bytes,
        migration: MigrationData,
    },
    Renewal {
        token_id: U256,
        new_expiry: u64,
    },
}

impl BridgeMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            BridgeMessage::Ejection { .. } => MessageType::Ejection,
            BridgeMessage::Migration { .. } => MessageType::Migration,
            BridgeMessage::Renewal { .. } => MessageType::Renewal,
        }
    }

    /// Canonical id of the name the message concerns
    pub fn canonical_id(&self) -> U256 {
        match self {
            BridgeMessage::Ejection { transfer, .. } => transfer.canonical_id(),
            BridgeMessage::Migration { migration, .. } => migration.transfer.canonical_id(),
            BridgeMessage::Renewal { token_id, .. } => canonical_id(*token_id),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            BridgeMessage::Ejection { dns_name, transfer } => encode_ejection(dns_name, transfer),
            BridgeMessage::Migration { dns_name, migration } => {
                encode_migration(dns_name, migration)
            }
            BridgeMessage::Renewal { token_id, new_expiry } => {
                Ok(encode_renewal(*token_id, *new_expiry))
            }
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        match get_message_type(data)? {
            MessageType::Ejection => {
                let (dns_name, transfer) = decode_ejection(data)?;
                Ok(BridgeMessage::Ejection {
                    dns_name: dns_name.into(),
                    transfer,
                })
            }
            MessageType::Migration => {
                let (dns_name, migration) = decode_migration(data)?;
                Ok(BridgeMessage::Migration {
                    dns_name: dns_name.into(),
                    migration,
                })
            }
            MessageType::Renewal => {
                let (token_id, new_expiry) = decode_renewal(data)?;
                Ok(BridgeMessage::Renewal { token_id, new_expiry })
            }
        }
    }
}

/// Read the message type from the tag prefix only.
pub fn get_message_type(data: &[u8]) -> Result<MessageType, CodecError> {
    let tag = *data.first().ok_or(CodecError::Truncated {
        expected: MESSAGE_TYPE_LEN,
        actual: 0,
    })?;
    MessageType::try_from(tag)
}

pub fn encode_ejection(dns_name: &[u8], transfer: &TransferData) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(
        MESSAGE_TYPE_LEN + 4 + dns_name.len() + TRANSFER_FIXED_LEN + transfer.label.len(),
    );
    out.push(MessageType::Ejection as u8);
    write_bytes(&mut out, "dns_name", dns_name)?;
    write_transfer(&mut out, transfer)?;
    Ok(out)
}

pub fn decode_ejection(data: &[u8]) -> Result<(Vec<u8>, TransferData), CodecError> {
    let mut reader = Reader::expecting(data, MessageType::Ejection)?;
    let dns_name = reader.bytes()?.to_vec();
    let transfer = reader.transfer()?;
    reader.finish()?;
    Ok((dns_name, transfer))
}

pub fn encode_migration(
    dns_name: &[u8],
    migration: &MigrationData,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(
        MESSAGE_TYPE_LEN
            + 4
            + dns_name.len()
            + TRANSFER_FIXED_LEN
            + migration.transfer.label.len()
            + 1
            + 4
            + migration.data.len(),
    );
    out.push(MessageType::Migration as u8);
    write_bytes(&mut out, "dns_name", dns_name)?;
    write_transfer(&mut out, &migration.transfer)?;
    out.push(migration.to_l1 as u8);
    write_bytes(&mut out, "data", &migration.data)?;
    Ok(out)
}

pub fn decode_migration(data: &[u8]) -> Result<(Vec<u8>, MigrationData), CodecError> {
    let mut reader = Reader::expecting(data, MessageType::Migration)?;
    let dns_name = reader.bytes()?.to_vec();
    let transfer = reader.transfer()?;
    let to_l1 = reader.bool()?;
    let extra = Bytes::copy_from_slice(reader.bytes()?);
    reader.finish()?;
    Ok((
        dns_name,
        MigrationData {
            transfer,
            to_l1,
            data: extra,
        },
    ))
}

pub fn encode_renewal(token_id: U256, new_expiry: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(RENEWAL_MESSAGE_LEN);
    out.push(MessageType::Renewal as u8);
    out.extend_from_slice(&token_id.to_be_bytes::<32>());
    out.extend_from_slice(&new_expiry.to_be_bytes());
    out
}

pub fn decode_renewal(data: &[u8]) -> Result<(U256, u64), CodecError> {
    let mut reader = Reader::expecting(data, MessageType::Renewal)?;
    let token_id = reader.u256()?;
    let new_expiry = reader.u64()?;
    reader.finish()?;
    Ok((token_id, new_expiry))
}

/// Encode a bare `TransferData` (no type tag), the payload a holder attaches
/// when transferring a token into an ejection controller.
pub fn encode_transfer_data(transfer: &TransferData) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(TRANSFER_FIXED_LEN + transfer.label.len());
    write_transfer(&mut out, transfer)?;
    Ok(out)
}

pub fn decode_transfer_data(data: &[u8]) -> Result<TransferData, CodecError> {
    let mut reader = Reader { data, offset: 0 };
    let transfer = reader.transfer()?;
    reader.finish()?;
    Ok(transfer)
}

fn write_bytes(out: &mut Vec<u8>, field: &'static str, bytes: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(bytes.len()).map_err(|_| CodecError::FieldTooLarge {
        field,
        length: bytes.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn write_transfer(out: &mut Vec<u8>, transfer: &TransferData) -> Result<(), CodecError> {
    write_bytes(out, "label", transfer.label.as_bytes())?;
    out.extend_from_slice(transfer.owner.as_slice());
    out.extend_from_slice(transfer.subregistry.as_slice());
    out.extend_from_slice(transfer.resolver.as_slice());
    out.extend_from_slice(&transfer.expires.to_be_bytes());
    out.extend_from_slice(&transfer.role_bitmap.0.to_be_bytes::<32>());
    Ok(())
}

/// Cursor over an encoded message
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Check the tag and position the cursor after it.
    fn expecting(data: &'a [u8], expected: MessageType) -> Result<Self, CodecError> {
        let actual = get_message_type(data)?;
        if actual != expected {
            return Err(CodecError::MessageTypeMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(Self {
            data,
            offset: MESSAGE_TYPE_LEN,
        })
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(CodecError::Truncated {
                expected: usize::MAX,
                actual: self.data.len(),
            })?;
        let slice = self.data.get(self.offset..end).ok_or(CodecError::Truncated {
            expected: end,
            actual: self.data.len(),
        })?;
        self.offset = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn u256(&mut self) -> Result<U256, CodecError> {
        Ok(U256::from_be_bytes(self.array::<32>()?))
    }

    fn address(&mut self) -> Result<Address, CodecError> {
        Ok(Address::from(self.array::<20>()?))
    }

    fn bool(&mut self) -> Result<bool, CodecError> {
        let offset = self.offset;
        match self.array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidBool { offset, value }),
        }
    }

    fn bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn transfer(&mut self) -> Result<TransferData, CodecError> {
        let label_offset = self.offset + 4;
        let label = std::str::from_utf8(self.bytes()?)
            .map_err(|_| CodecError::InvalidLabel {
                offset: label_offset,
            })?
            .to_owned();

        Ok(TransferData {
            label,
            owner: self.address()?,
            subregistry: self.address()?,
            resolver: self.address()?,
            expires: self.u64()?,
            role_bitmap: RoleBitmap(self.u256()?),
        })
    }

    fn finish(self) -> Result<(), CodecError> {
        if self.offset != self.data.len() {
            return Err(CodecError::TrailingBytes {
                extra: self.data.len() - self.offset,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name;
    use crate::roles::roles;

    fn sample_transfer(label: &str) -> TransferData {
        TransferData {
            label: label.to_string(),
            owner: Address::repeat_byte(0x11),
            subregistry: Address::repeat_byte(0x22),
            resolver: Address::repeat_byte(0x33),
            expires: 1_800_000_000,
            role_bitmap: roles::OWNER_DEFAULT,
        }
    }

    #[test]
    fn test_ejection_roundtrip_all_fields() {
        let dns = name::encode(&["test", "eth"]).unwrap();
        let transfer = sample_transfer("test");

        let encoded = encode_ejection(&dns, &transfer).unwrap();
        assert_eq!(get_message_type(&encoded).unwrap(), MessageType::Ejection);

        let (decoded_dns, decoded) = decode_ejection(&encoded).unwrap();
        assert_eq!(decoded_dns, dns);
        assert_eq!(decoded.label, "test");
        assert_eq!(decoded.owner, transfer.owner);
        assert_eq!(decoded.subregistry, transfer.subregistry);
        assert_eq!(decoded.resolver, transfer.resolver);
        assert_eq!(decoded.expires, transfer.expires);
        assert_eq!(decoded.role_bitmap, transfer.role_bitmap);
    }

    #[test]
    fn test_ejection_layout() {
        let transfer = TransferData {
            label: "ab".into(),
            owner: Address::ZERO,
            subregistry: Address::ZERO,
            resolver: Address::ZERO,
            expires: 0,
            role_bitmap: RoleBitmap::EMPTY,
        };
        let encoded = encode_ejection(b"\x02ab\x00", &transfer).unwrap();

        assert_eq!(encoded[0], 0x01);
        assert_eq!(&encoded[1..5], &4u32.to_be_bytes());
        assert_eq!(&encoded[5..9], b"\x02ab\x00");
        assert_eq!(&encoded[9..13], &2u32.to_be_bytes());
        assert_eq!(&encoded[13..15], b"ab");
        assert_eq!(encoded.len(), 15 + 20 * 3 + 8 + 32);
    }

    #[test]
    fn test_boundary_values_roundtrip() {
        let transfer = TransferData {
            label: String::new(),
            owner: Address::ZERO,
            subregistry: Address::ZERO,
            resolver: Address::ZERO,
            expires: 0,
            role_bitmap: RoleBitmap::MAX,
        };
        let encoded = encode_ejection(&[], &transfer).unwrap();
        assert_eq!(decode_ejection(&encoded).unwrap(), (vec![], transfer.clone()));

        let transfer = TransferData {
            expires: u64::MAX,
            role_bitmap: RoleBitmap::EMPTY,
            ..transfer
        };
        let encoded = encode_ejection(&[0], &transfer).unwrap();
        assert_eq!(decode_ejection(&encoded).unwrap(), (vec![0], transfer));
    }

    #[test]
    fn test_migration_roundtrip() {
        let dns = name::encode(&["sub", "test", "eth"]).unwrap();
        let migration = MigrationData {
            transfer: sample_transfer("sub"),
            to_l1: true,
            data: Bytes::from_static(b"\xde\xad\xbe\xef"),
        };

        let encoded = encode_migration(&dns, &migration).unwrap();
        assert_eq!(get_message_type(&encoded).unwrap(), MessageType::Migration);
        assert_eq!(decode_migration(&encoded).unwrap(), (dns, migration));
    }

    #[test]
    fn test_migration_invalid_bool() {
        let migration = MigrationData {
            transfer: sample_transfer("x"),
            to_l1: false,
            data: Bytes::new(),
        };
        let mut encoded = encode_migration(&[0], &migration).unwrap();
        let bool_offset = encoded.len() - 5;
        encoded[bool_offset] = 2;

        assert_eq!(
            decode_migration(&encoded),
            Err(CodecError::InvalidBool { offset: bool_offset, value: 2 })
        );
    }

    #[test]
    fn test_renewal_roundtrip() {
        let token_id = name::label_to_token_id("test", 3);
        let encoded = encode_renewal(token_id, 1_900_000_000);
        assert_eq!(encoded.len(), RENEWAL_MESSAGE_LEN);
        assert_eq!(decode_renewal(&encoded).unwrap(), (token_id, 1_900_000_000));

        let encoded = encode_renewal(U256::MAX, u64::MAX);
        assert_eq!(decode_renewal(&encoded).unwrap(), (U256::MAX, u64::MAX));
    }

    #[test]
    fn test_bare_transfer_data() {
        let transfer = sample_transfer("test");
        let encoded = encode_transfer_data(&transfer).unwrap();
        assert_eq!(encoded.len(), TRANSFER_FIXED_LEN + 4);
        assert_eq!(decode_transfer_data(&encoded).unwrap(), transfer);

        assert!(decode_transfer_data(&encoded[..encoded.len() - 1]).is_err());
        assert!(decode_transfer_data(&[]).is_err());
    }

    #[test]
    fn test_get_message_type_reads_prefix_only() {
        // tag alone, payload missing
        assert_eq!(get_message_type(&[0x01]).unwrap(), MessageType::Ejection);
        assert_eq!(get_message_type(&[0x03, 0xff]).unwrap(), MessageType::Renewal);
    }

    #[test]
    fn test_unknown_message_type() {
        assert_eq!(
            get_message_type(&[0x00]),
            Err(CodecError::UnknownMessageType { tag: 0x00 })
        );
        assert_eq!(
            get_message_type(&[0x04, 1, 2, 3]),
            Err(CodecError::UnknownMessageType { tag: 0x04 })
        );
        assert_eq!(
            get_message_type(&[]),
            Err(CodecError::Truncated { expected: 1, actual: 0 })
        );
    }

    #[test]
    fn test_type_mismatch() {
        let encoded = encode_renewal(U256::from(1u8), 1);
        assert!(matches!(
            decode_ejection(&encoded),
            Err(CodecError::MessageTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_and_trailing() {
        let encoded = encode_ejection(b"\x00", &sample_transfer("test")).unwrap();

        let truncated = &encoded[..encoded.len() - 1];
        assert!(matches!(decode_ejection(truncated), Err(CodecError::Truncated { .. })));

        let mut extended = encoded.clone();
        extended.push(0);
        assert_eq!(decode_ejection(&extended), Err(CodecError::TrailingBytes { extra: 1 }));
    }

    #[test]
    fn test_huge_length_prefix_rejected() {
        let mut data = vec![0x01];
        data.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(decode_ejection(&data), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_invalid_utf8_label() {
        let mut encoded = encode_ejection(&[], &sample_transfer("ab")).unwrap();
        // label bytes start after tag, empty dns name and label length
        encoded[9] = 0xff;
        assert_eq!(decode_ejection(&encoded), Err(CodecError::InvalidLabel { offset: 9 }));
    }

    #[test]
    fn test_bridge_message_dispatch() {
        let dns = name::encode(&["test", "eth"]).unwrap();
        let message = BridgeMessage::Ejection {
            dns_name: dns.into(),
            transfer: sample_transfer("test"),
        };
        let encoded = message.encode().unwrap();
        let decoded = BridgeMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.message_type(), MessageType::Ejection);
        assert_eq!(
            decoded.canonical_id(),
            name::canonical_id(name::label_to_token_id("test", 7))
        );
    }

    #[test]
    fn test_message_json() {
        let message = BridgeMessage::Renewal {
            token_id: U256::from(5u8),
            new_expiry: 10,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "renewal");
        assert_eq!(json["new_expiry"], 10);
    }
}
