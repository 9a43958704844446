//! Tiering policy: inline-in-metadata vs. externally stored content.

/// Content at or below this size is stored inline in the metadata row.
pub const MAX_INLINE_SIZE: usize = 256;

/// Where a logical object's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Bytes live inline in the metadata record.
    Inline,
    /// Bytes live in the object store, grouped by an external location.
    External,
}

impl Tier {
    /// Choose the tier for content of the given length.
    ///
    /// Zero-length content is a third case handled by the caller: the
    /// record carries neither inline bytes nor an external location.
    pub fn for_len(len: usize) -> Tier {
        if len <= MAX_INLINE_SIZE {
            Tier::Inline
        } else {
            Tier::External
        }
    }
}
