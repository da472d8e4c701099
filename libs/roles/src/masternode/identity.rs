use std::fmt;

/// Identifier of a masternode: the hash of its registration transaction.
/// Stable for the lifetime of the masternode, so all quorum accounting is
/// keyed by it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProTxHash(pub [u8; 32]);

impl ProTxHash {
    /// Parses a hash from its hex form.
    pub fn from_hex(text: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(text)?;
        Ok(Self(bytes.as_slice().try_into()?))
    }
}

impl fmt::Display for ProTxHash {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ProTxHash {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "protx:{}..", &hex::encode(self.0)[..8])
    }
}
