//! Flag sets of the spell system.
//!
//! Internally these are strongly-typed `bitflags`; at the wire boundary
//! they serialize as the raw words, preserving the external bit layout
//! exactly.

use bitflags::bitflags;

bitflags! {
    /// First spell attribute word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpellAttr0: u32 {
        /// Uses the ranged slot and consumes ammunition.
        const RANGED = 1 << 1;
        /// Next-melee-swing spell; occupies the melee cast slot.
        const ON_NEXT_SWING = 1 << 2;
        /// Always applied, never cast; rejected as a cast request.
        const PASSIVE = 1 << 6;
        /// Cast time is not interrupted by movement.
        const CASTABLE_WHILE_MOVING = 1 << 13;
        /// Usable while dead.
        const CASTABLE_WHILE_DEAD = 1 << 11;
        /// Ignores line-of-sight checks entirely.
        const IGNORE_LINE_OF_SIGHT = 1 << 20;
        /// Usable while stunned.
        const CASTABLE_WHILE_STUNNED = 1 << 18;
        /// Usable while confused or feared.
        const CASTABLE_WHILE_CONFUSED = 1 << 26;
        /// Hidden failure: never report cast errors to the client.
        const HIDDEN_CAST_ERRORS = 1 << 29;
    }
}

bitflags! {
    /// Second spell attribute word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpellAttr1: u32 {
        /// Channeled: occupies the channeled slot, duration ticks while
        /// the caster keeps casting.
        const CHANNELED = 1 << 2;
        /// Cannot be redirected by reflect auras.
        const CANT_BE_REFLECTED = 1 << 7;
        /// Usable while silenced (typically physical abilities).
        const ALLOW_WHILE_SILENCED = 1 << 11;
        /// Channel is not broken when the target takes damage.
        const CHANNEL_TRACK_TARGET = 1 << 16;
        /// Melee combat start is not triggered by this spell.
        const NO_THREAT = 1 << 9;
        /// Spell does not put the caster in combat.
        const NO_COMBAT = 1 << 28;
    }
}

bitflags! {
    /// Third spell attribute word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpellAttr2: u32 {
        /// Skip the hit roll entirely; the spell always lands.
        const IGNORE_HIT_RESULT = 1 << 3;
        /// This spell can never critically strike.
        const CANT_CRIT = 1 << 29;
        /// Triggered casts of this spell still run the full cost logic.
        const TRIGGERED_CAN_TRIGGER_PROC = 1 << 4;
        /// Area effects ignore the max-target cap.
        const IGNORE_AREA_TARGET_CAP = 1 << 13;
        /// Usable only on dead targets.
        const ALLOW_DEAD_TARGET = 1 << 5;
    }
}

bitflags! {
    /// Flags word of the outbound spell start/go messages. Every optional
    /// trailing section of those messages is gated by exactly one bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CastFlags: u32 {
        /// Cast is pending (start message sent, go not yet).
        const PENDING = 0x0000_0001;
        /// Projectile in flight; ammo display section present.
        const AMMO = 0x0000_0020;
        /// Heal-amount prediction section present.
        const HEAL_PREDICTION = 0x0000_0040;
        /// Predicted caster power section present.
        const POWER_LEFT_SELF = 0x0000_0800;
        /// Rune cooldown section present.
        const RUNE_LIST = 0x0002_0000;
        /// Adjusted missile trajectory section present.
        const ADJUST_MISSILE = 0x0002_0000 << 1;
        /// Visual-only immunity cast.
        const IMMUNITY = 0x0400_0000;
    }
}

bitflags! {
    /// Presence mask of the targeting payload. A set bit means the
    /// corresponding optional field follows on the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TargetMask: u32 {
        /// No bits set: the cast targets the caster; no payload follows.
        const SELF = 0x0000_0000;
        const UNIT = 0x0000_0002;
        const UNIT_MINIPET = 0x0001_0000;
        const GAMEOBJECT = 0x0000_0800;
        const ITEM = 0x0000_0010;
        const SOURCE_LOCATION = 0x0000_0020;
        const DEST_LOCATION = 0x0000_0040;
        const CORPSE_ENEMY = 0x0000_0200;
        const CORPSE_ALLY = 0x0000_8000;
        const STRING = 0x0000_2000;
        const TRADE_ITEM = 0x0000_1000;
        const GLYPH_SLOT = 0x0002_0000;
        const DEST_TARGET = 0x0004_0000;
        const EXTRA_FLAGS = 0x0008_0000;
        /// Trajectory elevation/speed pair follows the dest location.
        const TRAJECTORY = 0x0010_0000;
    }
}

impl TargetMask {
    pub fn has_dest(self) -> bool {
        self.intersects(TargetMask::DEST_LOCATION | TargetMask::DEST_TARGET)
    }
}

bitflags! {
    /// Transient unit state consulted by cast validation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct UnitFlags: u32 {
        const IN_COMBAT = 1 << 0;
        const STUNNED = 1 << 1;
        const SILENCED = 1 << 2;
        const CONFUSED = 1 << 3;
        const FLEEING = 1 << 4;
        const ROOTED = 1 << 5;
        const PACIFIED = 1 << 6;
        /// Cannot be picked by the target resolver.
        const NOT_SELECTABLE = 1 << 7;
        /// NPC evade mode: immune to everything, resets threat.
        const EVADING = 1 << 8;
        const MOVING = 1 << 9;
        const STEALTHED = 1 << 10;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cast_flag_bits_are_distinct() {
        let all = [
            CastFlags::PENDING,
            CastFlags::AMMO,
            CastFlags::HEAL_PREDICTION,
            CastFlags::POWER_LEFT_SELF,
            CastFlags::RUNE_LIST,
            CastFlags::ADJUST_MISSILE,
            CastFlags::IMMUNITY,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!((*a & *b).is_empty(), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_target_mask_dest() {
        assert!(TargetMask::DEST_LOCATION.has_dest());
        assert!(TargetMask::DEST_TARGET.has_dest());
        assert!(!TargetMask::UNIT.has_dest());
        assert!(TargetMask::SELF.is_empty());
    }

    #[test]
    fn test_wire_layout_round_trip() {
        // the external bit layout must survive through the raw word
        let mask = TargetMask::UNIT | TargetMask::DEST_LOCATION | TargetMask::TRAJECTORY;
        let raw = mask.bits();
        assert_eq!(TargetMask::from_bits_truncate(raw), mask);
        assert_eq!(raw, 0x0010_0042);
    }
}
