//! Account address validation.

use ethers_core::types::Address;
use ethers_core::utils::to_checksum;

use crate::error::ValidationError;

/// Parse and canonicalize a 20-byte account address.
///
/// Accepts 40 hex digits with or without a `0x` prefix. Single-case input is
/// taken as-is; mixed-case input must carry a valid EIP-55 checksum.
pub fn parse_address(field: &str, input: &str) -> Result<Address, ValidationError> {
    let trimmed = input.trim();
    let invalid = |reason: &str| ValidationError::InvalidAddress {
        field: field.to_string(),
        value: input.to_string(),
        reason: reason.to_string(),
    };

    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.len() != 40 {
        return Err(invalid("expected 40 hex digits"));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid("invalid hex characters"));
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(digits, &mut bytes).map_err(|_| invalid("invalid hex characters"))?;
    let address = Address::from(bytes);

    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    if has_upper && has_lower && checksum(&address)[2..] != *digits {
        return Err(invalid("bad address checksum"));
    }

    Ok(address)
}

/// EIP-55 checksummed form.
pub fn checksum(address: &Address) -> String {
    to_checksum(address, None)
}
