//! Immutable spell templates.
//!
//! One [`SpellTemplate`] exists per spell id, loaded once at startup and
//! shared read-only across every cast of that spell. The engine never
//! mutates a template.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_RANGE, MAX_SPELL_EFFECTS};
use crate::types::attributes::{SpellAttr0, SpellAttr1, SpellAttr2};
use crate::types::enums::{
    AuraKind, DiminishingGroup, DispelType, ImplicitTarget, Mechanic, PowerType, SpellEffectKind,
    SpellSchool,
};

/// One required reagent: item entry and count consumed per cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Reagent {
    pub entry: u32,
    pub count: u32,
}

/// One of the up-to-three effect slots of a spell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SpellEffectTemplate {
    pub kind: SpellEffectKind,
    pub target_a: ImplicitTarget,
    pub target_b: ImplicitTarget,
    /// Flat component of the rolled amount.
    pub base_points: i32,
    /// Random component: a roll of `1..=die_sides` is added when positive.
    pub die_sides: i32,
    /// Selection radius in yards; zero means "use the spell range".
    pub radius: f32,
    /// Maximum chain jumps for chain-style targets; zero disables.
    pub chain_targets: u32,
    /// Aura attached when `kind` is `ApplyAura`/`ApplyAreaAura`.
    pub aura_kind: AuraKind,
    /// Tick interval for periodic auras, in milliseconds.
    pub amplitude_ms: u32,
    /// Spell id launched by `TriggerSpell` effects and proc auras.
    pub trigger_spell: u32,
    /// Mechanic override for this slot; `None` falls back to the spell.
    pub mechanic: Mechanic,
    /// Kind-specific payload: dispel family for `Dispel`, power index for
    /// drain/burn effects, knock strength for `KnockBack`.
    pub misc_value: i32,
    pub dmg_multiplier: f32,
}

impl Default for SpellEffectTemplate {
    fn default() -> Self {
        Self {
            kind: SpellEffectKind::None,
            target_a: ImplicitTarget::None,
            target_b: ImplicitTarget::None,
            base_points: 0,
            die_sides: 0,
            radius: 0.0,
            chain_targets: 0,
            aura_kind: AuraKind::None,
            amplitude_ms: 0,
            trigger_spell: 0,
            mechanic: Mechanic::None,
            misc_value: 0,
            dmg_multiplier: 1.0,
        }
    }
}

impl SpellEffectTemplate {
    pub fn is_used(&self) -> bool {
        self.kind != SpellEffectKind::None
    }

    pub fn is_area_aura(&self) -> bool {
        self.kind == SpellEffectKind::ApplyAreaAura
    }

    /// Whether this slot helps its target. Drives the faction polarity
    /// filter in the resolver and the friendly/hostile cast checks.
    pub fn is_positive(&self) -> bool {
        if self.target_a.is_harmful() || self.target_b.is_harmful() {
            return false;
        }
        match self.kind {
            SpellEffectKind::Heal
            | SpellEffectKind::HealMaxHealth
            | SpellEffectKind::Energize
            | SpellEffectKind::ApplyAreaAura => true,
            SpellEffectKind::ApplyAura => !matches!(
                self.aura_kind,
                AuraKind::PeriodicDamage
                    | AuraKind::ModStun
                    | AuraKind::ModFear
                    | AuraKind::ModConfuse
                    | AuraKind::ModSilence
                    | AuraKind::ModRoot
            ),
            SpellEffectKind::SchoolDamage
            | SpellEffectKind::PowerDrain
            | SpellEffectKind::PowerBurn
            | SpellEffectKind::WeaponDamage
            | SpellEffectKind::InterruptCast
            | SpellEffectKind::KnockBack => false,
            _ => true,
        }
    }
}

/// Immutable description of one spell. Loaded from the data store at
/// startup; every live cast holds a shared handle to one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct SpellTemplate {
    pub id: u32,
    pub name: String,
    pub school: SpellSchool,
    pub power_type: PowerType,
    /// Flat power cost.
    pub power_cost: u32,
    /// Additional cost as a percentage of base power.
    pub power_cost_pct: u32,
    pub cast_time_ms: u32,
    /// Cooldown started when the cast goes off.
    pub recovery_ms: u32,
    pub range_min: f32,
    pub range_max: f32,
    /// Projectile speed in yards per second; zero means instant delivery.
    pub speed: f32,
    /// Aura/channel duration; negative means permanent.
    pub duration_ms: i32,
    /// Raw attribute words; exact wire layout.
    pub attributes: u32,
    pub attributes_ex: u32,
    pub attributes_ex2: u32,
    pub mechanic: Mechanic,
    pub dispel: DispelType,
    pub dr_group: DiminishingGroup,
    /// Cap on resolved targets per effect; zero means uncapped.
    pub max_affected_targets: u32,
    pub reagents: Vec<Reagent>,
    /// Required equipped item class, or -1 for none.
    pub equipped_item_class: i32,
    /// Bit mask of acceptable subclasses of the required class.
    pub equipped_item_subclass_mask: u32,
    /// Zone id this spell is restricted to, if any.
    pub area_id: Option<u32>,
    pub effects: [SpellEffectTemplate; MAX_SPELL_EFFECTS],
}

impl Default for SpellTemplate {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            school: SpellSchool::Physical,
            power_type: PowerType::Mana,
            power_cost: 0,
            power_cost_pct: 0,
            cast_time_ms: 0,
            recovery_ms: 0,
            range_min: 0.0,
            range_max: DEFAULT_MAX_RANGE,
            speed: 0.0,
            duration_ms: 0,
            attributes: 0,
            attributes_ex: 0,
            attributes_ex2: 0,
            mechanic: Mechanic::None,
            dispel: DispelType::None,
            dr_group: DiminishingGroup::None,
            max_affected_targets: 0,
            reagents: Vec::new(),
            equipped_item_class: -1,
            equipped_item_subclass_mask: 0,
            area_id: None,
            effects: [SpellEffectTemplate::default(); MAX_SPELL_EFFECTS],
        }
    }
}

impl SpellTemplate {
    pub fn attr0(&self) -> SpellAttr0 {
        SpellAttr0::from_bits_truncate(self.attributes)
    }

    pub fn attr1(&self) -> SpellAttr1 {
        SpellAttr1::from_bits_truncate(self.attributes_ex)
    }

    pub fn attr2(&self) -> SpellAttr2 {
        SpellAttr2::from_bits_truncate(self.attributes_ex2)
    }

    pub fn has_attr0(&self, flag: SpellAttr0) -> bool {
        self.attr0().contains(flag)
    }

    pub fn has_attr1(&self, flag: SpellAttr1) -> bool {
        self.attr1().contains(flag)
    }

    pub fn has_attr2(&self, flag: SpellAttr2) -> bool {
        self.attr2().contains(flag)
    }

    pub fn is_channeled(&self) -> bool {
        self.has_attr1(SpellAttr1::CHANNELED)
    }

    pub fn is_passive(&self) -> bool {
        self.has_attr0(SpellAttr0::PASSIVE)
    }

    pub fn is_ranged(&self) -> bool {
        self.has_attr0(SpellAttr0::RANGED)
    }

    pub fn is_reflectable(&self) -> bool {
        !self.has_attr1(SpellAttr1::CANT_BE_REFLECTED)
            && self.effects().any(|(_, e)| !e.is_positive())
    }

    /// Used effect slots with their indices.
    pub fn effects(&self) -> impl Iterator<Item = (usize, &SpellEffectTemplate)> {
        self.effects.iter().enumerate().filter(|(_, e)| e.is_used())
    }

    /// Selection radius for one effect slot, falling back to the spell
    /// range, then the world default.
    pub fn effect_radius(&self, index: usize) -> f32 {
        let r = self.effects[index].radius;
        if r > 0.0 {
            r
        } else if self.range_max > 0.0 {
            self.range_max
        } else {
            DEFAULT_MAX_RANGE
        }
    }

    /// Total power cost against the given base power pool.
    pub fn calc_power_cost(&self, base_power: u32) -> u32 {
        self.power_cost + base_power * self.power_cost_pct / 100
    }

    /// Whether every used effect helps its target.
    pub fn is_positive(&self) -> bool {
        self.effects().all(|(_, e)| e.is_positive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn damage_template() -> SpellTemplate {
        let mut t = SpellTemplate {
            id: 133,
            name: "Fireball".into(),
            school: SpellSchool::Fire,
            power_cost: 30,
            ..Default::default()
        };
        t.effects[0] = SpellEffectTemplate {
            kind: SpellEffectKind::SchoolDamage,
            target_a: ImplicitTarget::UnitTargetEnemy,
            base_points: 100,
            die_sides: 20,
            ..Default::default()
        };
        t
    }

    #[test]
    fn test_effect_iteration_skips_unused() {
        let t = damage_template();
        let used: Vec<usize> = t.effects().map(|(i, _)| i).collect();
        assert_eq!(used, vec![0]);
    }

    #[test]
    fn test_positivity() {
        let t = damage_template();
        assert!(!t.is_positive());
        assert!(t.is_reflectable());

        let mut heal = t.clone();
        heal.effects[0].kind = SpellEffectKind::Heal;
        heal.effects[0].target_a = ImplicitTarget::UnitTargetAlly;
        assert!(heal.is_positive());
        assert!(!heal.is_reflectable());
    }

    #[test]
    fn test_power_cost() {
        let mut t = damage_template();
        t.power_cost_pct = 10;
        assert_eq!(t.calc_power_cost(1000), 130);
    }

    #[test]
    fn test_effect_radius_fallbacks() {
        let mut t = damage_template();
        t.range_max = 30.0;
        assert_eq!(t.effect_radius(0), 30.0);
        t.effects[0].radius = 8.0;
        assert_eq!(t.effect_radius(0), 8.0);
        t.effects[0].radius = 0.0;
        t.range_max = 0.0;
        assert_eq!(t.effect_radius(0), DEFAULT_MAX_RANGE);
    }

    #[test]
    fn test_attribute_words_preserve_layout() {
        let mut t = damage_template();
        t.attributes_ex = SpellAttr1::CHANNELED.bits();
        assert!(t.is_channeled());
        assert_eq!(t.attributes_ex, 1 << 2);
    }
}
