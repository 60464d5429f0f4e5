//! Address rendering strategies.
//!
//! The keychain's index-tracking state machine is identical across address
//! encodings; only the final rendering of derived key material differs. That
//! seam is the [`AddressEncoder`] trait, with one implementation per
//! supported encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::extended::KeyError;
use super::network::NetworkParameters;
use super::{double_sha256, hash160};

/// A rendered address plus the material it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Address hash (hash160 of the key or script, or the witness program).
    pub hash: Vec<u8>,
    /// Version byte(s) the hash was prefixed with; empty for Bech32.
    pub version: Vec<u8>,
    /// Derivation path the address was derived at, when known.
    pub derivation_path: Option<String>,
    encoded: String,
}

impl Address {
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn with_derivation_path(mut self, path: String) -> Self {
        self.derivation_path = Some(path);
        self
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Strategy rendering a derived public key into an [`Address`].
pub trait AddressEncoder: Send + Sync {
    fn render(
        &self,
        public_key: &[u8; 33],
        network: &NetworkParameters,
    ) -> Result<Address, KeyError>;
}

fn base58check(version: &[u8], hash: &[u8]) -> String {
    let mut data = Vec::with_capacity(version.len() + hash.len() + 4);
    data.extend_from_slice(version);
    data.extend_from_slice(hash);
    let checksum = double_sha256(&data);
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

/// Pay-to-public-key-hash.
pub struct P2pkhEncoder;

impl AddressEncoder for P2pkhEncoder {
    fn render(
        &self,
        public_key: &[u8; 33],
        network: &NetworkParameters,
    ) -> Result<Address, KeyError> {
        let hash = hash160(public_key);
        Ok(Address {
            encoded: base58check(&network.p2pkh_version, &hash),
            hash: hash.to_vec(),
            version: network.p2pkh_version.clone(),
            derivation_path: None,
        })
    }
}

/// Pay-to-witness-public-key-hash nested in pay-to-script-hash.
pub struct P2shP2wpkhEncoder;

impl AddressEncoder for P2shP2wpkhEncoder {
    fn render(
        &self,
        public_key: &[u8; 33],
        network: &NetworkParameters,
    ) -> Result<Address, KeyError> {
        // Redeem script: OP_0 PUSH20 <hash160(pubkey)>.
        let mut redeem_script = Vec::with_capacity(22);
        redeem_script.extend_from_slice(&[0x00, 0x14]);
        redeem_script.extend_from_slice(&hash160(public_key));
        let hash = hash160(&redeem_script);
        Ok(Address {
            encoded: base58check(&network.p2sh_version, &hash),
            hash: hash.to_vec(),
            version: network.p2sh_version.clone(),
            derivation_path: None,
        })
    }
}

/// Native segwit v0 rendering over the network's Bech32 HRP.
pub struct Bech32Encoder;

impl AddressEncoder for Bech32Encoder {
    fn render(
        &self,
        public_key: &[u8; 33],
        network: &NetworkParameters,
    ) -> Result<Address, KeyError> {
        let hrp_str = network.bech32_hrp.as_ref().ok_or_else(|| {
            KeyError::Encoding(format!(
                "network {} has no bech32 human-readable part",
                network.identifier
            ))
        })?;
        let hrp = bech32::Hrp::parse(hrp_str)
            .map_err(|e| KeyError::Encoding(format!("invalid bech32 hrp: {e}")))?;

        let program = hash160(public_key);
        let encoded = bech32::segwit::encode(hrp, bech32::Fe32::Q, &program)
            .map_err(|e| KeyError::Encoding(format!("bech32 encoding failed: {e}")))?;

        Ok(Address {
            encoded,
            hash: program.to_vec(),
            version: Vec::new(),
            derivation_path: None,
        })
    }
}
