//! BIP32 extended public keys.
//!
//! An [`ExtendedKey`] is a public-key + chain-code node supporting
//! non-hardened child derivation, Base58Check (de)serialization against
//! caller-supplied network version bytes, and the hash160 address-hash
//! primitive. Path derivation is an explicit iterative fold, so adversarial
//! path depth cannot grow the stack.

use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{NonZeroScalar, ProjectivePoint, PublicKey as SecpPublicKey};
use sha2::Sha512;

use super::network::NetworkParameters;
use super::path::DerivationPath;
use super::{double_sha256, hash160};

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid extended key encoding: {0}")]
    Encoding(String),

    #[error("extended key checksum mismatch")]
    Checksum,

    #[error("network version mismatch: expected {expected}, found {found}")]
    NetworkVersionMismatch { expected: String, found: String },

    #[error("invalid public key material: {0}")]
    InvalidKey(String),

    #[error("derivation depth overflow")]
    DepthOverflow,
}

/// A BIP32 public-key node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    public_key: [u8; 33],
    chain_code: [u8; 32],
    depth: u8,
    child_number: u32,
    parent_fingerprint: u32,
    network: NetworkParameters,
}

impl ExtendedKey {
    pub fn new(
        public_key: [u8; 33],
        chain_code: [u8; 32],
        depth: u8,
        child_number: u32,
        parent_fingerprint: u32,
        network: NetworkParameters,
    ) -> Self {
        Self {
            public_key,
            chain_code,
            depth,
            child_number,
            parent_fingerprint,
            network,
        }
    }

    pub fn public_key(&self) -> [u8; 33] {
        self.public_key
    }

    pub fn chain_code(&self) -> [u8; 32] {
        self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }

    pub fn parent_fingerprint(&self) -> u32 {
        self.parent_fingerprint
    }

    pub fn network(&self) -> &NetworkParameters {
        &self.network
    }

    /// hash160 of the compressed public key.
    pub fn public_key_hash(&self) -> [u8; 20] {
        hash160(&self.public_key)
    }

    /// First four bytes of the public key hash, as used for child bookkeeping.
    pub fn fingerprint(&self) -> u32 {
        let hash = self.public_key_hash();
        u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]])
    }

    /// One public-parent to public-child derivation step.
    ///
    /// Deterministic over `(public_key, chain_code, child_num)`. A hardened
    /// child number is not rejected: no private key is available here, so
    /// the step runs over the same public data with the hardened bit kept in
    /// the serialized index. Real hardened children must be derived upstream
    /// from the private key.
    pub fn derive_child(&self, child_num: u32) -> Result<Self, KeyError> {
        if self.depth == u8::MAX {
            return Err(KeyError::DepthOverflow);
        }

        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;
        mac.update(&self.public_key);
        mac.update(&child_num.to_be_bytes());
        let digest = mac.finalize().into_bytes();
        let (tweak_bytes, child_chain_code) = digest.split_at(32);

        // Child point = parse256(IL)*G + K_parent.
        let tweak = NonZeroScalar::try_from(tweak_bytes)
            .map_err(|_| KeyError::InvalidKey("derivation tweak outside curve order".to_string()))?;
        let parent = SecpPublicKey::from_sec1_bytes(&self.public_key)
            .map_err(|_| KeyError::InvalidKey("parent key not on curve".to_string()))?;
        let child_point =
            ProjectivePoint::GENERATOR * tweak.as_ref() + ProjectivePoint::from(parent.as_affine());

        let encoded = child_point.to_affine().to_encoded_point(true);
        if encoded.len() != 33 {
            return Err(KeyError::InvalidKey(
                "derived child is the point at infinity".to_string(),
            ));
        }
        let mut public_key = [0u8; 33];
        public_key.copy_from_slice(encoded.as_bytes());

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(child_chain_code);

        Ok(Self {
            public_key,
            chain_code,
            depth: self.depth + 1,
            child_number: child_num,
            parent_fingerprint: self.fingerprint(),
            network: self.network.clone(),
        })
    }

    /// Left fold of [`derive_child`](Self::derive_child) over the path
    /// segments. The empty path returns the key unchanged.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, KeyError> {
        let mut current = self.clone();
        for child_num in path.iter() {
            current = current.derive_child(child_num)?;
        }
        Ok(current)
    }

    /// Serialize to Base58Check using the network's xpub version bytes.
    pub fn to_base58(&self) -> String {
        let mut data = Vec::with_capacity(self.network.xpub_version.len() + 78);
        data.extend_from_slice(&self.network.xpub_version);
        data.push(self.depth);
        data.extend_from_slice(&self.parent_fingerprint.to_be_bytes());
        data.extend_from_slice(&self.child_number.to_be_bytes());
        data.extend_from_slice(&self.chain_code);
        data.extend_from_slice(&self.public_key);

        let checksum = double_sha256(&data);
        data.extend_from_slice(&checksum[..4]);
        bs58::encode(data).into_string()
    }

    /// Decode a Base58Check extended key, validating the checksum and the
    /// version prefix against `network`.
    pub fn from_base58(network: &NetworkParameters, encoded: &str) -> Result<Self, KeyError> {
        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| KeyError::Encoding(e.to_string()))?;

        let version_len = network.xpub_version.len();
        let payload_len = version_len + 74;
        if decoded.len() != payload_len + 4 {
            return Err(KeyError::Encoding(format!(
                "expected {} bytes, found {}",
                payload_len + 4,
                decoded.len()
            )));
        }

        let checksum = double_sha256(&decoded[..payload_len]);
        if checksum[..4] != decoded[payload_len..] {
            return Err(KeyError::Checksum);
        }

        if decoded[..version_len] != network.xpub_version[..] {
            return Err(KeyError::NetworkVersionMismatch {
                expected: hex::encode(&network.xpub_version),
                found: hex::encode(&decoded[..version_len]),
            });
        }

        let body = &decoded[version_len..payload_len];
        let depth = body[0];
        let parent_fingerprint = u32::from_be_bytes([body[1], body[2], body[3], body[4]]);
        let child_number = u32::from_be_bytes([body[5], body[6], body[7], body[8]]);

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&body[9..41]);
        let mut public_key = [0u8; 33];
        public_key.copy_from_slice(&body[41..74]);

        // Reject material that does not decode to a curve point.
        SecpPublicKey::from_sec1_bytes(&public_key)
            .map_err(|_| KeyError::InvalidKey("public key not on curve".to_string()))?;

        Ok(Self {
            public_key,
            chain_code,
            depth,
            child_number,
            parent_fingerprint,
            network: network.clone(),
        })
    }
}
