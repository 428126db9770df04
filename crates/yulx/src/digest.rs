//! Opaque byte-in/byte-out digests (§1: "Cryptographic primitives ...
//! consumed as opaque byte-in / byte-out digests").
//!
//! Every hash here is a direct call into a `Digest`-trait crate; none of the
//! primitives are reimplemented. `sha3`/`sha2`/`ripemd` are already in the
//! teacher's dependency tree (`ouros`'s `hashlib` module wraps the same
//! crates for the same reason); `blake2` is pulled in the same way for
//! BLAKE2b, which the teacher has no use for but the intrinsic table (§4.4)
//! requires.

use blake2::Blake2b;
use digest::{Digest as _, consts::U20, consts::U32};
use ripemd::Ripemd160;
use sha2::Sha256;
use sha3::Keccak256;

type Blake2b160 = Blake2b<U20>;
type Blake2b256 = Blake2b<U32>;

#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[must_use]
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

#[must_use]
pub fn blake2b160(data: &[u8]) -> [u8; 20] {
    Blake2b160::digest(data).into()
}

#[must_use]
pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    Blake2b256::digest(data).into()
}

/// `keccak160` = the low 20 bytes of `keccak256(data)`, an Ethereum-address-
/// shaped digest for callers that want a keccak hash sized to fit an
/// `address` word without a separate mask step.
#[must_use]
pub fn keccak160(data: &[u8]) -> [u8; 20] {
    let full = keccak256(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[12..]);
    out
}

/// `hash160` = RIPEMD-160(SHA-256(data)), the Bitcoin-style address digest.
#[must_use]
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// `hash256` = SHA-256(SHA-256(data)).
#[must_use]
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// 4-byte method/error selector: high 4 bytes of `keccak256(preimage)`.
#[must_use]
pub fn selector4(preimage: &str) -> [u8; 4] {
    let digest = keccak256(preimage.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Event topic0: the full 32-byte digest of the same preimage.
#[must_use]
pub fn topic0(preimage: &str) -> [u8; 32] {
    keccak256(preimage.as_bytes())
}

#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_erc20_transfer() {
        // transfer(address,uint256) -> 0xa9059cbb
        let sel = selector4("transfer(address,uint256)");
        assert_eq!(to_hex(&sel), "0xa9059cbb");
    }

    #[test]
    fn topic0_matches_known_erc20_transfer_event() {
        // Transfer(address,address,uint256) -> 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
        let topic = topic0("Transfer(address,address,uint256)");
        assert_eq!(to_hex(&topic), "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");
    }

    #[test]
    fn keccak256_of_empty_input_is_well_known() {
        let digest = keccak256(b"");
        assert_eq!(to_hex(&digest), "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");
    }
}
