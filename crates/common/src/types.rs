//! Core identifier types.

use std::fmt;

/// 32-byte opaque node identifier.
///
/// Node identifiers are assigned by the discovery layer and are treated as
/// opaque bytes everywhere else: equality, hashing, and display are the
/// only operations the rest of the workspace relies on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// All-zero identifier.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex encoding of the first eight bytes, for log lines.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Check if this is the zero identifier.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for NodeId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_hex() {
        let id = NodeId::from_bytes([0xab; 32]);
        let hex = id.to_hex();
        let parsed = NodeId::from_hex(&hex).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_node_id_hex_rejects_wrong_length() {
        assert!(NodeId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_node_id_zero() {
        assert!(NodeId::ZERO.is_zero());
        assert!(!NodeId::from_bytes([1; 32]).is_zero());
    }

    #[test]
    fn test_node_id_short_hex() {
        let id = NodeId::from_bytes([0x01; 32]);
        assert_eq!(id.short_hex(), "0101010101010101");
    }
}
