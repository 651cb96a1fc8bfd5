//! Non-unit world objects the targeting system can name: game objects,
//! items and corpses. These are registry entries only; their behavior
//! lives in the effect handlers that touch them.

use arcanum_core::types::{ObjectGuid, Position};

/// A placed game object (door, chest, spell focus, summoned object).
#[derive(Debug, Clone)]
pub struct GameObject {
    pub guid: ObjectGuid,
    pub entry: u32,
    pub position: Position,
    /// Spell focus id when this object acts as one, zero otherwise.
    pub focus_id: u32,
}

impl GameObject {
    pub fn new(guid: ObjectGuid, entry: u32, position: Position) -> Self {
        Self {
            guid,
            entry,
            position,
            focus_id: 0,
        }
    }
}

/// An item instance addressable by cast payloads (enchant targets,
/// consumable cast items).
#[derive(Debug, Clone)]
pub struct ItemObject {
    pub guid: ObjectGuid,
    pub entry: u32,
    pub owner: ObjectGuid,
    pub count: u32,
    /// Remaining use charges; negative means unlimited.
    pub charges: i32,
}

impl ItemObject {
    pub fn new(guid: ObjectGuid, entry: u32, owner: ObjectGuid) -> Self {
        Self {
            guid,
            entry,
            owner,
            count: 1,
            charges: -1,
        }
    }
}

/// A corpse left by a dead unit, targetable by resurrection spells.
#[derive(Debug, Clone)]
pub struct Corpse {
    pub guid: ObjectGuid,
    pub owner: ObjectGuid,
    pub position: Position,
}

impl Corpse {
    pub fn new(guid: ObjectGuid, owner: ObjectGuid, position: Position) -> Self {
        Self {
            guid,
            owner,
            position,
        }
    }
}
