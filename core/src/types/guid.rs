//! 64-bit object GUIDs.
//!
//! The high bits of a GUID encode what kind of object it names; the low
//! bits are a per-kind counter. The engine never stores live references to
//! world objects across tick boundaries - it stores GUIDs and re-resolves
//! them through the world registry every time.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// What a GUID refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum GuidKind {
    Player,
    Creature,
    Pet,
    GameObject,
    Item,
    Corpse,
    DynamicObject,
    Unknown,
}

const HIGH_PLAYER: u64 = 0x0000;
const HIGH_ITEM: u64 = 0x4000;
const HIGH_GAMEOBJECT: u64 = 0xF110;
const HIGH_CREATURE: u64 = 0xF130;
const HIGH_PET: u64 = 0xF140;
const HIGH_DYNOBJECT: u64 = 0xF100;
const HIGH_CORPSE: u64 = 0xF101;

const HIGH_SHIFT: u32 = 48;
const COUNTER_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

/// A 64-bit object identifier: kind in the high bits, counter below.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    Encode,
    Decode,
)]
pub struct ObjectGuid(u64);

impl ObjectGuid {
    pub const EMPTY: ObjectGuid = ObjectGuid(0);

    pub fn new(kind: GuidKind, counter: u64) -> Self {
        let high = match kind {
            GuidKind::Player => HIGH_PLAYER,
            GuidKind::Item => HIGH_ITEM,
            GuidKind::GameObject => HIGH_GAMEOBJECT,
            GuidKind::Creature => HIGH_CREATURE,
            GuidKind::Pet => HIGH_PET,
            GuidKind::DynamicObject => HIGH_DYNOBJECT,
            GuidKind::Corpse => HIGH_CORPSE,
            GuidKind::Unknown => 0xFFFF,
        };
        ObjectGuid((high << HIGH_SHIFT) | (counter & COUNTER_MASK))
    }

    pub fn player(counter: u64) -> Self {
        // The player high part is zero, so an all-zero counter would be
        // indistinguishable from the empty GUID. Counters start at 1.
        debug_assert!(counter != 0);
        Self::new(GuidKind::Player, counter)
    }

    pub fn creature(counter: u64) -> Self {
        Self::new(GuidKind::Creature, counter)
    }

    pub fn pet(counter: u64) -> Self {
        Self::new(GuidKind::Pet, counter)
    }

    pub fn game_object(counter: u64) -> Self {
        Self::new(GuidKind::GameObject, counter)
    }

    pub fn item(counter: u64) -> Self {
        Self::new(GuidKind::Item, counter)
    }

    pub fn corpse(counter: u64) -> Self {
        Self::new(GuidKind::Corpse, counter)
    }

    pub fn from_raw(raw: u64) -> Self {
        ObjectGuid(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn counter(self) -> u64 {
        self.0 & COUNTER_MASK
    }

    pub fn kind(self) -> GuidKind {
        match self.0 >> HIGH_SHIFT {
            HIGH_PLAYER => GuidKind::Player,
            HIGH_ITEM => GuidKind::Item,
            HIGH_GAMEOBJECT => GuidKind::GameObject,
            HIGH_CREATURE => GuidKind::Creature,
            HIGH_PET => GuidKind::Pet,
            HIGH_DYNOBJECT => GuidKind::DynamicObject,
            HIGH_CORPSE => GuidKind::Corpse,
            _ => GuidKind::Unknown,
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Units are anything that can act: players, creatures and pets.
    pub fn is_unit(self) -> bool {
        matches!(
            self.kind(),
            GuidKind::Player | GuidKind::Creature | GuidKind::Pet
        )
    }

    pub fn is_player(self) -> bool {
        !self.is_empty() && self.kind() == GuidKind::Player
    }
}

impl std::fmt::Display for ObjectGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}-{}", self.kind(), self.counter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        let g = ObjectGuid::creature(1234);
        assert_eq!(g.kind(), GuidKind::Creature);
        assert_eq!(g.counter(), 1234);
        assert!(g.is_unit());
        assert!(!g.is_player());
    }

    #[test]
    fn test_player_guid() {
        let g = ObjectGuid::player(7);
        assert_eq!(g.kind(), GuidKind::Player);
        assert!(g.is_player());
        assert!(g.is_unit());
    }

    #[test]
    fn test_empty() {
        assert!(ObjectGuid::EMPTY.is_empty());
        assert!(!ObjectGuid::item(1).is_empty());
        assert!(!ObjectGuid::item(1).is_unit());
    }

    #[test]
    fn test_raw_round_trip() {
        let g = ObjectGuid::game_object(99);
        assert_eq!(ObjectGuid::from_raw(g.raw()), g);
    }
}
