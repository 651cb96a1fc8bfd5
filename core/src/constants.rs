//! Constants module - fixed numbers the casting engine is built around.

// =============================================================================
// Timing
// =============================================================================

/// World-logic ticks per second.
pub const TICKS: i32 = 20;
/// Milliseconds per world-logic tick.
pub const TICK_MS: u64 = 1_000 / TICKS as u64;

// =============================================================================
// Data files
// =============================================================================

/// Default data directory.
pub const DATDIR: &str = ".dat";
/// Spell template data file (zlib-compressed bincode).
pub const SPELL_DAT: &str = "spells.dat";
/// Script target-entry table data file (zlib-compressed bincode).
pub const SPELL_TARGET_DAT: &str = "spell_targets.dat";

// =============================================================================
// Map bounds
// =============================================================================

/// Half-extent of the square playable area. Coordinates read off the wire
/// outside `[-MAP_HALFSIZE, MAP_HALFSIZE]` are malformed.
pub const MAP_HALFSIZE: f32 = 17066.0;
/// Maximum legal height difference; values beyond this are malformed.
pub const MAP_MAX_HEIGHT: f32 = 100000.0;

// =============================================================================
// Spell system
// =============================================================================

/// Effect slots per spell template.
pub const MAX_SPELL_EFFECTS: usize = 3;

/// Default maximum spell range in yards when a template gives none.
pub const DEFAULT_MAX_RANGE: f32 = 50.0;

/// Base melee reach used for range checks against a unit target.
pub const BASE_COMBAT_REACH: f32 = 1.5;

/// Minimum caster-to-target distance used when computing projectile travel
/// time. Targets closer than this still pay for this distance.
pub const MIN_MISSILE_DIST: f32 = 5.0;

/// Chain jumps never exceed this distance between consecutive targets.
pub const CHAIN_JUMP_RADIUS: f32 = 10.0;

/// Default search radius for the initial chain target.
pub const CHAIN_INITIAL_RADIUS: f32 = 25.0;

/// Arc of the standard frontal cone, in radians (roughly 90 degrees).
pub const CONE_ANGLE: f32 = std::f32::consts::FRAC_PI_2;

/// Triggered-spell chains deeper than this abort with a typed error
/// instead of recursing further.
pub const MAX_CAST_DEPTH: u32 = 8;

/// Per-caster cast slots: melee, generic, autorepeat, channeled.
pub const CURRENT_SPELL_SLOTS: usize = 4;

// =============================================================================
// Diminishing returns
// =============================================================================

/// A unit that has not been hit by a group within this window has its
/// diminishing level reset to the first level before the next application.
pub const DIMINISHING_RESET_MS: u64 = 15_000;

/// Duration multiplier per diminishing level, in percent. The fourth
/// application is immune.
pub const DIMINISHING_PCT: [u32; 3] = [100, 50, 25];

// =============================================================================
// Combat
// =============================================================================

/// Base chance for a spell to miss an equal-level target, in percent.
pub const BASE_SPELL_MISS_PCT: f32 = 4.0;
/// Added spell miss chance per level the target is above the caster.
pub const SPELL_MISS_PER_LEVEL_PCT: f32 = 2.0;
/// Spell critical strikes deal this multiple of the rolled amount.
pub const SPELL_CRIT_MULTIPLIER: f32 = 1.5;
/// Fraction of effective healing converted to threat, split over enemies.
pub const HEAL_THREAT_FACTOR: f32 = 0.5;
/// Fraction of the power cost refunded when a rage or energy spell fails
/// to land on every target (miss, dodge or parry).
pub const POWER_REFUND_PCT: u32 = 80;

// =============================================================================
// Wire protocol opcodes (server -> client)
// =============================================================================

pub const SMSG_CAST_RESULT: u16 = 0x0130;
pub const SMSG_SPELL_START: u16 = 0x0131;
pub const SMSG_SPELL_GO: u16 = 0x0132;
pub const SMSG_SPELL_FAILURE: u16 = 0x0133;
pub const SMSG_SPELL_CHANNEL_START: u16 = 0x0139;
pub const SMSG_SPELL_CHANNEL_UPDATE: u16 = 0x013A;
pub const SMSG_SPELL_DAMAGE_LOG: u16 = 0x0250;
pub const SMSG_SPELL_MISS_LOG: u16 = 0x0263;
pub const SMSG_SPELL_HEAL_LOG: u16 = 0x0150;
pub const SMSG_SPELL_ENERGIZE_LOG: u16 = 0x0151;
