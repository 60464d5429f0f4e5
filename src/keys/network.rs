//! Per-currency network parameters consumed by key serialization and
//! address rendering.

use serde::{Deserialize, Serialize};

/// Version bytes and encoding knobs for one currency network.
///
/// Supplied by the caller; the derivation engine treats these as opaque
/// except for length checks during Base58Check decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParameters {
    /// Stable identifier, e.g. `bitcoin` or `bitcoin_testnet`.
    pub identifier: String,
    /// Version byte(s) prefixed to a P2PKH address hash.
    pub p2pkh_version: Vec<u8>,
    /// Version byte(s) prefixed to a P2SH address hash.
    pub p2sh_version: Vec<u8>,
    /// Version bytes prefixed to a serialized extended public key.
    pub xpub_version: Vec<u8>,
    /// Human-readable part for Bech32 address rendering, when supported.
    pub bech32_hrp: Option<String>,
}

impl NetworkParameters {
    pub fn bitcoin() -> Self {
        Self {
            identifier: "bitcoin".to_string(),
            p2pkh_version: vec![0x00],
            p2sh_version: vec![0x05],
            xpub_version: vec![0x04, 0x88, 0xB2, 0x1E],
            bech32_hrp: Some("bc".to_string()),
        }
    }

    pub fn bitcoin_testnet() -> Self {
        Self {
            identifier: "bitcoin_testnet".to_string(),
            p2pkh_version: vec![0x6F],
            p2sh_version: vec![0xC4],
            xpub_version: vec![0x04, 0x35, 0x87, 0xCF],
            bech32_hrp: Some("tb".to_string()),
        }
    }
}
