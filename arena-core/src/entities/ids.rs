use serde::{Deserialize, Serialize};
use std::fmt;

/// Room-unique player handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Room-unique mob handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MobId(pub u32);

/// Room-unique XP orb handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrbId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl fmt::Display for MobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Something a weapon can damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetRef {
    Mob(MobId),
    Player(PlayerId),
}

impl TargetRef {
    pub fn is_player(&self) -> bool {
        matches!(self, TargetRef::Player(_))
    }
}

/// Monotonic id source shared by all entity kinds in a room.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn next_raw(&mut self) -> u32 {
        self.next = self.next.wrapping_add(1);
        self.next
    }

    pub fn player(&mut self) -> PlayerId {
        PlayerId(self.next_raw())
    }

    pub fn mob(&mut self) -> MobId {
        MobId(self.next_raw())
    }

    pub fn orb(&mut self) -> OrbId {
        OrbId(self.next_raw())
    }
}
