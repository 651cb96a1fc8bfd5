//! Closed enumerations of the spell system.
//!
//! Everything here is wire-visible or template data, so each enum carries
//! explicit discriminants and never grows implicitly.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Lifecycle of one in-flight cast.
///
/// `Traveling` resolves into `Landing` (or straight to `Finished`) once
/// every per-target delay has elapsed; channeled spells go through
/// `Channeling` after landing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellState {
    Created,
    Targeting,
    Casting,
    Traveling,
    Landing,
    Channeling,
    Finished,
}

/// Result of a cast attempt. Serialized to the client as a single byte in
/// the cast-result message; a few codes are internal-only and are never
/// reported (triggered casts would otherwise spam confusing UI errors).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellCastResult {
    Success = 0,
    /// Internal success for triggered casts; not reported.
    SuccessSilent = 1,
    AffectingCombat = 2,
    AlreadyOpen = 3,
    BadImplicitTargets = 4,
    BadTargets = 5,
    CasterDead = 6,
    CastDepthExceeded = 7,
    Charmed = 8,
    Confused = 9,
    DontReport = 10,
    EquippedItem = 11,
    EquippedItemClass = 12,
    Fleeing = 13,
    Immune = 14,
    IncorrectArea = 15,
    Interrupted = 16,
    ItemGone = 17,
    ItemNotFound = 18,
    LineOfSight = 19,
    Moving = 20,
    NoAmmo = 21,
    NotBehind = 22,
    NotHere = 23,
    NotInfront = 24,
    NotKnown = 25,
    NotReady = 26,
    NotStanding = 27,
    NothingToDispel = 28,
    NoValidTargets = 29,
    OutOfRange = 30,
    Pacified = 31,
    PreventedByMechanic = 32,
    NotEnoughPower = 33,
    Reagents = 34,
    RequiresArea = 35,
    RequiresSpellFocus = 36,
    Rooted = 37,
    Silenced = 38,
    SpellInProgress = 39,
    Stunned = 40,
    TargetsDead = 41,
    TargetAffectingCombat = 42,
    TargetEnemy = 43,
    TargetFriendly = 44,
    TargetNotInParty = 45,
    TargetNotInRaid = 46,
    TooClose = 47,
    TryAgain = 48,
    UnitNotInfront = 49,
    Error = 50,
}

impl SpellCastResult {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::SuccessSilent)
    }

    /// Whether the client should be told about this result. Internal and
    /// triggered-cast failures stay silent.
    pub fn is_reportable(self) -> bool {
        !matches!(
            self,
            Self::Success
                | Self::SuccessSilent
                | Self::DontReport
                | Self::CastDepthExceeded
                | Self::Error
        )
    }
}

/// Outcome of the precomputed hit roll for one target.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellMissInfo {
    None = 0,
    Miss = 1,
    Resist = 2,
    Dodge = 3,
    Parry = 4,
    Block = 5,
    Evade = 6,
    Immune = 7,
    Deflect = 8,
    Absorb = 9,
    Reflect = 10,
}

impl SpellMissInfo {
    pub fn is_hit(self) -> bool {
        self == SpellMissInfo::None
    }

    /// Outcomes that return rage/energy costs to the caster.
    pub fn refunds_power(self) -> bool {
        matches!(self, Self::Miss | Self::Dodge | Self::Parry)
    }
}

/// Damage schools.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum SpellSchool {
    Physical = 0,
    Holy = 1,
    Fire = 2,
    Nature = 3,
    Frost = 4,
    Shadow = 5,
    Arcane = 6,
}

impl SpellSchool {
    /// Wire form: a one-bit-per-school mask.
    pub fn mask(self) -> u32 {
        1 << (self as u32)
    }
}

/// Resource a spell draws its cost from.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum PowerType {
    Mana = 0,
    Rage = 1,
    Focus = 2,
    Energy = 3,
}

impl PowerType {
    /// Rage and energy casts partially refund on a full miss.
    pub fn refundable(self) -> bool {
        matches!(self, Self::Rage | Self::Energy)
    }
}

/// Crowd-control mechanic carried by a spell or aura.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum Mechanic {
    None = 0,
    Charm = 1,
    Disorient = 2,
    Fear = 5,
    Root = 7,
    Silence = 9,
    Sleep = 10,
    Snare = 11,
    Stun = 12,
    Knockout = 14,
    Polymorph = 17,
    Banish = 18,
    Horror = 24,
    Daze = 27,
    Sap = 30,
}

/// Dispel family an aura belongs to.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum DispelType {
    None = 0,
    Magic = 1,
    Curse = 2,
    Disease = 3,
    Poison = 4,
    Stealth = 5,
    Invisibility = 6,
    Enrage = 9,
}

/// Shared diminishing-returns bucket. Spells in the same group diminish
/// each other's durations on a common timer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum DiminishingGroup {
    None = 0,
    Stun = 1,
    Fear = 2,
    Root = 3,
    Disorient = 4,
    Silence = 5,
    Sleep = 6,
    Horror = 7,
}

/// Current diminishing level for one (unit, group) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiminishingLevel {
    Level1,
    Level2,
    Level3,
    Immune,
}

impl DiminishingLevel {
    pub fn next(self) -> Self {
        match self {
            Self::Level1 => Self::Level2,
            Self::Level2 => Self::Level3,
            Self::Level3 | Self::Immune => Self::Immune,
        }
    }

    /// Duration multiplier in percent; immune is zero.
    pub fn duration_pct(self) -> u32 {
        match self {
            Self::Level1 => crate::constants::DIMINISHING_PCT[0],
            Self::Level2 => crate::constants::DIMINISHING_PCT[1],
            Self::Level3 => crate::constants::DIMINISHING_PCT[2],
            Self::Immune => 0,
        }
    }
}

/// What an effect slot does when it lands.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum SpellEffectKind {
    None = 0,
    SchoolDamage = 2,
    Dummy = 3,
    ApplyAura = 6,
    PowerDrain = 8,
    Heal = 10,
    WeaponDamage = 31,
    PowerBurn = 62,
    TriggerSpell = 64,
    InterruptCast = 68,
    Dispel = 38,
    KnockBack = 98,
    ApplyAreaAura = 27,
    Energize = 30,
    HealMaxHealth = 67,
}

/// Persistent effect kinds an [`ApplyAura`](SpellEffectKind::ApplyAura)
/// effect can attach to a unit.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum AuraKind {
    None = 0,
    PeriodicDamage = 3,
    ModConfuse = 5,
    ModFear = 7,
    PeriodicHeal = 8,
    ModStun = 12,
    ModStat = 29,
    ModSilence = 27,
    ReflectSpells = 74,
    SchoolAbsorb = 69,
    ModRoot = 26,
    ProcTriggerSpell = 42,
    ModThreat = 10,
    ModMechanicImmunity = 77,
}

impl AuraKind {
    /// The crowd-control mechanic this aura imposes, if any. Drives both
    /// the caster-state restrictions and diminishing-returns grouping.
    pub fn mechanic(self) -> Mechanic {
        match self {
            Self::ModStun => Mechanic::Stun,
            Self::ModFear => Mechanic::Fear,
            Self::ModRoot => Mechanic::Root,
            Self::ModSilence => Mechanic::Silence,
            Self::ModConfuse => Mechanic::Disorient,
            _ => Mechanic::None,
        }
    }

    pub fn is_periodic(self) -> bool {
        matches!(self, Self::PeriodicDamage | Self::PeriodicHeal)
    }
}

/// Implicit-target specifier. Each effect slot declares a pair `(A, B)`;
/// B's meaning is conditioned on A (for instance, an area B fills around
/// the destination that A established).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub enum ImplicitTarget {
    None = 0,
    /// The caster itself.
    UnitCaster = 1,
    /// Nearby enemy chosen by proximity.
    UnitNearbyEnemy = 2,
    /// Nearby party member.
    UnitNearbyParty = 3,
    /// Nearby ally.
    UnitNearbyAlly = 4,
    /// The caster's pet.
    UnitPet = 5,
    /// The explicitly selected enemy; chains when the effect has a chain
    /// target count.
    UnitTargetEnemy = 6,
    /// Units around the source point, filtered by script entry table.
    UnitSrcAreaEntry = 7,
    /// Units around the destination point, filtered by script entry table.
    UnitDestAreaEntry = 8,
    /// The explicitly selected ally.
    UnitTargetAlly = 21,
    /// The selected unit, friend or foe.
    UnitTargetAny = 25,
    /// Enemies around the source point.
    UnitSrcAreaEnemy = 15,
    /// Enemies around the destination point.
    UnitDestAreaEnemy = 16,
    /// The caster's location as destination.
    DestCaster = 17,
    /// The selected unit's location as destination.
    DestTarget = 18,
    /// Party members around the caster.
    UnitPartyCaster = 20,
    /// Party members around the selected target.
    UnitPartyTarget = 37,
    /// The explicitly selected game object.
    GameObjectTarget = 26,
    /// The equipped/selected item.
    ItemTarget = 27,
    /// Allies around the destination point.
    UnitDestAreaAlly = 30,
    /// Allies around the source point.
    UnitSrcAreaAlly = 31,
    /// A random point near the destination, area-uniform.
    DestRandom = 32,
    /// Enemies in a frontal cone.
    UnitConeEnemy = 24,
    /// Allies in a frontal cone.
    UnitConeAlly = 57,
    /// Chain-heal style jump among allies, most injured first.
    UnitChainHealAlly = 45,
    /// The selected enemy corpse.
    CorpseEnemy = 33,
    /// The caster's own corpse.
    CorpseCaster = 34,
    /// Raid members around the caster.
    UnitRaidCaster = 56,
    /// Lowest-health raid members, bounded selection.
    UnitRaidPriority = 61,
    /// Destination produced from the missile trajectory.
    DestTraj = 76,
    /// Game objects around the destination.
    GameObjectDestArea = 40,
    /// Explicit destination supplied by the client payload.
    DestDb = 63,
}

impl ImplicitTarget {
    /// Specifiers that select around a point rather than a unit.
    pub fn is_area(self) -> bool {
        matches!(
            self,
            Self::UnitSrcAreaEntry
                | Self::UnitDestAreaEntry
                | Self::UnitSrcAreaEnemy
                | Self::UnitDestAreaEnemy
                | Self::UnitDestAreaAlly
                | Self::UnitSrcAreaAlly
                | Self::UnitConeEnemy
                | Self::UnitConeAlly
                | Self::UnitPartyCaster
                | Self::UnitPartyTarget
                | Self::UnitRaidCaster
                | Self::GameObjectDestArea
        )
    }

    /// Specifiers whose selection is hostile to the caster.
    pub fn is_harmful(self) -> bool {
        matches!(
            self,
            Self::UnitNearbyEnemy
                | Self::UnitTargetEnemy
                | Self::UnitSrcAreaEnemy
                | Self::UnitDestAreaEnemy
                | Self::UnitConeEnemy
                | Self::CorpseEnemy
        )
    }
}

/// The four mutually-exclusive "current spell" slots on a caster.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentSpellSlot {
    Melee = 0,
    Generic = 1,
    AutoRepeat = 2,
    Channeled = 3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reportability() {
        assert!(!SpellCastResult::Success.is_reportable());
        assert!(!SpellCastResult::DontReport.is_reportable());
        assert!(!SpellCastResult::CastDepthExceeded.is_reportable());
        assert!(SpellCastResult::NotReady.is_reportable());
        assert!(SpellCastResult::Reagents.is_reportable());
    }

    #[test]
    fn test_diminishing_level_progression() {
        let mut level = DiminishingLevel::Level1;
        assert_eq!(level.duration_pct(), 100);
        level = level.next();
        assert_eq!(level.duration_pct(), 50);
        level = level.next();
        assert_eq!(level.duration_pct(), 25);
        level = level.next();
        assert_eq!(level, DiminishingLevel::Immune);
        assert_eq!(level.duration_pct(), 0);
        // saturates
        assert_eq!(level.next(), DiminishingLevel::Immune);
    }

    #[test]
    fn test_school_mask() {
        assert_eq!(SpellSchool::Physical.mask(), 1);
        assert_eq!(SpellSchool::Frost.mask(), 1 << 4);
    }

    #[test]
    fn test_aura_mechanics() {
        assert_eq!(AuraKind::ModStun.mechanic(), Mechanic::Stun);
        assert_eq!(AuraKind::PeriodicDamage.mechanic(), Mechanic::None);
        assert!(AuraKind::PeriodicHeal.is_periodic());
        assert!(!AuraKind::ModStun.is_periodic());
    }

    #[test]
    fn test_miss_refunds() {
        assert!(SpellMissInfo::Dodge.refunds_power());
        assert!(!SpellMissInfo::Reflect.refunds_power());
        assert!(!SpellMissInfo::None.refunds_power());
    }
}
