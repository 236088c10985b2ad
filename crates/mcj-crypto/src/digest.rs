//! Session-server hash: SHA-1 rendered as a signed hexadecimal integer.

use sha1::{Digest, Sha1};

/// Digest sent to the session server's `hasJoined` endpoint.
///
/// The SHA-1 of `server_id ++ shared_secret ++ public_key` is read as a
/// big-endian two's-complement integer and printed in lowercase hex with no
/// leading zeros, prefixed with `-` when negative.
pub fn server_hash(server_id: &str, shared_secret: &[u8], public_key: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(shared_secret);
    hasher.update(public_key);
    let mut bytes: [u8; 20] = hasher.finalize().into();

    let negative = bytes[0] & 0x80 != 0;
    if negative {
        twos_complement(&mut bytes);
    }

    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let trimmed = hex.trim_start_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };
    if negative {
        format!("-{digits}")
    } else {
        digits.to_string()
    }
}

fn twos_complement(bytes: &mut [u8]) {
    let mut carry = true;
    for byte in bytes.iter_mut().rev() {
        *byte = !*byte;
        if carry {
            let (v, overflow) = byte.overflowing_add(1);
            *byte = v;
            carry = overflow;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(
            server_hash("Notch", &[], &[]),
            "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48"
        );
        assert_eq!(
            server_hash("jeb_", &[], &[]),
            "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1"
        );
        assert_eq!(
            server_hash("simon", &[], &[]),
            "88e16a1019277b15d58faf0541e11910eb756f6"
        );
    }

    #[test]
    fn parts_are_concatenated() {
        assert_eq!(
            server_hash("", b"No", b"tch"),
            server_hash("Notch", &[], &[])
        );
    }

    #[test]
    fn twos_complement_of_minus_one() {
        let mut bytes = [0xFFu8; 4];
        twos_complement(&mut bytes);
        assert_eq!(bytes, [0, 0, 0, 1]);
    }
}
