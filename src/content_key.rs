/// A stable key derived from the leading characters of a chunk's content.
///
/// Two results whose content starts with the same prefix are treated as the
/// same passage when merging semantic and keyword results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    /// Numeric form of the hash, used for set membership.
    pub numeric: u64,
    /// Short hex string for human display (e.g. "a1b2c3").
    pub short: String,
}

impl ContentKey {
    /// Hash the first `prefix_chars` characters of `content`.
    pub fn new(content: &str, prefix_chars: usize) -> Self {
        let prefix = crate::text_util::take_chars(content, prefix_chars);
        let hash = blake3::hash(prefix.as_bytes());
        let mut first = [0u8; 8];
        first.copy_from_slice(&hash.as_bytes()[..8]);
        let numeric = u64::from_le_bytes(first);
        let short = hash.to_hex()[..6].to_string();
        Self { numeric, short }
    }
}

impl std::fmt::Display for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.short)
    }
}
