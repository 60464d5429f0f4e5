//! Hierarchical-deterministic key derivation: paths, scheme templates,
//! extended public keys and address rendering.

pub mod address;
pub mod extended;
pub mod network;
pub mod path;
pub mod scheme;

pub use address::{Address, AddressEncoder, Bech32Encoder, P2pkhEncoder, P2shP2wpkhEncoder};
pub use extended::{ExtendedKey, KeyError};
pub use network::NetworkParameters;
pub use path::{DerivationPath, PathError};
pub use scheme::{DerivationScheme, SchemeError, SchemeLevel, SchemeNode};

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub(crate) fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// SHA-256 followed by RIPEMD-160, the address-hash primitive.
pub(crate) fn hash160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    hasher.finalize().into()
}
