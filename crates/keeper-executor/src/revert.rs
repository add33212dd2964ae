//! Revert reason decoding.
//!
//! The result is attached to errors for logging only.

use alloy::sol_types::{Panic, Revert, SolError};

/// Human-readable reason for a failed call.
///
/// `Error(string)` payloads are decoded to their message and `Panic(uint256)`
/// payloads to their code. Other payloads are shown as hex. Without a payload
/// the RPC error message is used.
pub fn decode_revert_reason(data: Option<&[u8]>, message: &str) -> String {
    match data {
        Some(data) if !data.is_empty() => {
            if let Ok(revert) = Revert::abi_decode(data, true) {
                return revert.reason;
            }
            if let Ok(panic) = Panic::abi_decode(data, true) {
                return format!("Panic({})", panic.code);
            }
            format!("0x{}", hex::encode(data))
        }
        _ if !message.trim().is_empty() => message.to_string(),
        _ => "execution reverted".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    #[test]
    fn test_error_string_payload() {
        let data = Revert {
            reason: "no executable ids".to_string(),
        }
        .abi_encode();
        assert_eq!(&data[..4], &[0x08, 0xc3, 0x79, 0xa0]);
        assert_eq!(
            decode_revert_reason(Some(&data), "execution reverted"),
            "no executable ids"
        );
    }

    #[test]
    fn test_panic_payload() {
        let data = Panic {
            code: U256::from(0x11u64),
        }
        .abi_encode();
        assert_eq!(decode_revert_reason(Some(&data), ""), "Panic(17)");
    }

    #[test]
    fn test_unknown_payload_as_hex() {
        let data = [0xde, 0xad, 0xbe, 0xef];
        assert_eq!(decode_revert_reason(Some(&data), "reverted"), "0xdeadbeef");
    }

    #[test]
    fn test_message_fallback() {
        assert_eq!(decode_revert_reason(None, "insufficient funds"), "insufficient funds");
        assert_eq!(decode_revert_reason(Some(&[]), ""), "execution reverted");
    }
}
