// RecallId - correlation key of one concurrent playback pass

use std::fmt;
use std::ops::BitOr;

/// Identifies one playback pass; every runtime recall and signal of the
/// pass carries the same group id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Kind of pass a group runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecallIdFlags(u8);

impl RecallIdFlags {
    pub const NONE: Self = Self(0);
    /// Driven by notation
    pub const NOTATION: Self = Self(1);
    /// Renders to the soundcard
    pub const PLAYBACK: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RecallIdFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecallId {
    pub group_id: GroupId,
    pub flags: RecallIdFlags,
}

impl RecallId {
    pub fn new(group_id: GroupId, flags: RecallIdFlags) -> Self {
        Self { group_id, flags }
    }

    pub fn same_group(&self, other: &RecallId) -> bool {
        self.group_id == other.group_id
    }
}

impl fmt::Display for RecallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group_id)
    }
}
