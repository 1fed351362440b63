use crate::crypto::hash::base58check_checksum;

/// Version byte prefixed to Tron mainnet account hashes.
pub const TRON_ADDRESS_PREFIX: u8 = 0x41;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Checks for `0x` followed by exactly 40 hex characters.
pub fn is_valid_evm_address(value: &str) -> bool {
    let normalized = value.trim();
    normalized.len() == 42
        && (normalized.starts_with("0x") || normalized.starts_with("0X"))
        && normalized[2..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_base58_body(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| BASE58_ALPHABET.contains(c))
}

fn is_bech32_body(value: &str) -> bool {
    let Some((hrp, data)) = value.rsplit_once('1') else {
        return false;
    };
    !hrp.is_empty()
        && hrp.chars().all(|c| c.is_ascii_lowercase())
        && data.len() >= 6
        && data
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
}

// Internal helper that checks conditions for `is_bare_avalanche_bech32`.
fn is_bare_avalanche_bech32(value: &str) -> bool {
    ["avax1", "fuji1"].iter().any(|hrp| value.starts_with(hrp)) && is_bech32_body(value)
}

/// Recognizes Avalanche P-Chain addresses: `P-` followed by a bech32 or
/// Base58 body, or a bare Base58 or `avax1…` body with the prefix implied.
pub fn looks_like_platform_address(value: &str) -> bool {
    let normalized = value.trim();
    if normalized.starts_with("0x") || normalized.starts_with("0X") {
        return false;
    }
    match normalized.strip_prefix("P-") {
        Some(body) => {
            (20..=70).contains(&body.len()) && (is_bech32_body(body) || is_base58_body(body))
        }
        None => {
            (25..=60).contains(&normalized.len())
                && (is_base58_body(normalized) || is_bare_avalanche_bech32(normalized))
        }
    }
}

/// Adds the `P-` prefix when a platform address was supplied bare.
pub fn canonical_platform_address(value: &str) -> String {
    let normalized = value.trim();
    if normalized.starts_with("P-") {
        normalized.to_string()
    } else {
        format!("P-{}", normalized)
    }
}

/// Derives the Tron Base58Check address that shares the EVM account hash.
///
/// Only meaningful for Tron accounts controlled by the same key as the EVM
/// address. Returns `None` when the input is not 20 bytes of hex.
pub fn to_tron_address(evm_address: &str) -> Option<String> {
    let trimmed = evm_address.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let account_hash = hex::decode(hex_part).ok()?;
    if account_hash.len() != 20 {
        return None;
    }

    let mut payload = Vec::with_capacity(25);
    payload.push(TRON_ADDRESS_PREFIX);
    payload.extend_from_slice(&account_hash);
    let checksum = base58check_checksum(&payload);
    payload.extend_from_slice(&checksum);

    Some(bs58::encode(payload).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tron_address_matches_known_usdt_contract() {
        let derived = to_tron_address("0xa614f803b6fd780986a42c78ec9c7f77e6ded13c");
        assert_eq!(derived.as_deref(), Some("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"));
    }

    #[test]
    fn tron_address_is_deterministic_and_checksummed() {
        let input = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
        let first = to_tron_address(input).expect("valid evm address");
        let second = to_tron_address(input).expect("valid evm address");
        assert_eq!(first, second);
        assert!(first.starts_with('T'));

        let decoded = bs58::decode(&first).into_vec().expect("base58 decodes");
        assert_eq!(decoded.len(), 25);
        assert_eq!(decoded[0], TRON_ADDRESS_PREFIX);
        let (payload, checksum) = decoded.split_at(21);
        assert_eq!(checksum, base58check_checksum(payload));
    }

    #[test]
    fn tron_address_rejects_malformed_input() {
        assert_eq!(to_tron_address("0x1234"), None);
        assert_eq!(to_tron_address("not-hex"), None);
        assert_eq!(to_tron_address(""), None);
    }

    #[test]
    fn evm_address_validation() {
        assert!(is_valid_evm_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_valid_evm_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA9604"));
        assert!(!is_valid_evm_address("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_valid_evm_address("0xzzdA6BF26964aF9D7eEd9e03E53415D37aA96045"));
    }

    #[test]
    fn platform_address_patterns() {
        assert!(looks_like_platform_address(
            "P-avax1tzdcgj4ehsvhhgpl7zylwpw0gl2rxcg4r5afk5"
        ));
        assert!(looks_like_platform_address("6Y3kysjF9jnHnYkdS9yGAuoHyae2eNmeV"));
        assert!(looks_like_platform_address(
            "avax1tzdcgj4ehsvhhgpl7zylwpw0gl2rxcg4r5afk5"
        ));
        assert!(!looks_like_platform_address(
            "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
        ));
        assert!(!looks_like_platform_address("P-"));
        assert!(!looks_like_platform_address("hello"));
    }

    #[test]
    fn canonical_platform_address_adds_prefix_once() {
        assert_eq!(canonical_platform_address("avax1abc"), "P-avax1abc");
        assert_eq!(canonical_platform_address("P-avax1abc"), "P-avax1abc");
    }
}
