//! Parse job input
//!
//! A [`Job`] is the immutable input of one parse request: the raw source bytes
//! and the decoded option flags. It is owned by exactly one Baton.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Parser option bitset.
///
/// Bit values match the ones used by the blueprint parser family, so flags
/// decoded here can be handed to any compatible [`Parser`](crate::Parser).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OptionFlags(u32);

impl OptionFlags {
    /// No options
    pub const NONE: OptionFlags = OptionFlags(0);
    /// Render markdown descriptions (never set by the request validator)
    pub const RENDER_DESCRIPTIONS: OptionFlags = OptionFlags(1 << 0);
    /// Treat a missing API name as an error
    pub const REQUIRE_BLUEPRINT_NAME: OptionFlags = OptionFlags(1 << 1);
    /// Include the source map in the delivered result
    pub const EXPORT_SOURCEMAP: OptionFlags = OptionFlags(1 << 2);

    pub const fn from_bits(bits: u32) -> Self {
        OptionFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: OptionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: OptionFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for OptionFlags {
    type Output = OptionFlags;

    fn bitor(self, rhs: OptionFlags) -> OptionFlags {
        OptionFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OptionFlags {
    fn bitor_assign(&mut self, rhs: OptionFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for OptionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05b}", self.0)
    }
}

/// Immutable input bundle for one computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    source: Vec<u8>,
    flags: OptionFlags,
}

impl Job {
    pub fn new(source: impl Into<Vec<u8>>, flags: OptionFlags) -> Self {
        Self {
            source: source.into(),
            flags,
        }
    }

    /// Raw source bytes
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn flags(&self) -> OptionFlags {
        self.flags
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}
