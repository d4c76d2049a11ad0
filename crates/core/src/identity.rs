//! Identities and on-chain addresses.
//!
//! An [`Identity`] is a network participant keyed by its hex address.
//! An [`Address`] is a fixed 20-byte on-chain account (settlement actor,
//! payment channel). Both parse from plain or `0x`-prefixed hex.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while parsing identities and addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("empty address")]
    Empty,

    #[error("address is not valid hex: {0}")]
    InvalidHex(String),

    #[error("address too long: {0} hex digits")]
    TooLong(usize),
}

/// A network identity, keyed by its address.
///
/// Kept in canonical form: lowercase hex without the `0x` prefix, so
/// equality and map lookups behave regardless of how the address arrived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity {
    address: String,
}

impl Identity {
    /// Build an identity from a known-good address. Normalizes the form
    /// but performs no validation; use [`Identity::parse`] for untrusted
    /// input.
    pub fn from_address(address: &str) -> Self {
        Self {
            address: canonical(address),
        }
    }

    /// Parse an untrusted address string. Rejects empty and non-hex input.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let stripped = strip_prefix(address);
        if stripped.is_empty() {
            return Err(AddressError::Empty);
        }
        if !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidHex(address.to_string()));
        }
        Ok(Self::from_address(address))
    }

    /// The canonical address string (lowercase hex, no prefix).
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.address)
    }
}

/// A 20-byte on-chain account address.
///
/// Parses go-ethereum style: short hex input is left-padded with zeros,
/// so `"0x1"` becomes `0x0000…0001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(#[serde(with = "address_hex")] [u8; 20]);

impl Address {
    /// Parse from plain or `0x`-prefixed hex, left-padding short input.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let stripped = strip_prefix(s);
        if stripped.is_empty() {
            return Err(AddressError::Empty);
        }
        if stripped.len() > 40 {
            return Err(AddressError::TooLong(stripped.len()));
        }
        // Left-pad to an even 40 digits before decoding.
        let padded = format!("{stripped:0>40}");
        let raw = hex::decode(&padded).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

mod address_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 20], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 20], D::Error> {
        let s = String::deserialize(de)?;
        super::Address::parse(&s)
            .map(|a| a.0)
            .map_err(serde::de::Error::custom)
    }
}

/// On-chain registration state of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Unregistered,
    InProgress,
    RegisteredConsumer,
    RegisteredProvider,
    RegistrationError,
}

impl Default for RegistrationStatus {
    fn default() -> Self {
        Self::Unregistered
    }
}

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

fn canonical(s: &str) -> String {
    strip_prefix(s).to_lowercase()
}
