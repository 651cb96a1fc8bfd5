//! Per-spell special cases.
//!
//! A handful of spells need behavior the generic resolver and effect
//! handlers cannot express: hand-picked target filters and dummy effects
//! with bespoke scripts. They register here against their spell id; the
//! resolver and the dummy handler consult the store's override table and
//! fall through to generic behavior when no entry exists.

use log::debug;

use arcanum_core::types::{ObjectGuid, SpellTemplate};

use crate::world::World;

/// Hook points for one special-cased spell.
pub trait SpellOverride {
    /// Prune or replace the generic candidate list of one effect slot.
    /// Runs after generic selection, before the hit rolls.
    fn filter_targets(
        &self,
        _world: &mut World,
        _template: &SpellTemplate,
        _effect_index: usize,
        _candidates: &mut Vec<ObjectGuid>,
    ) {
    }

    /// Script body for a dummy effect slot.
    fn dummy_effect(
        &self,
        _world: &mut World,
        caster: ObjectGuid,
        template: &SpellTemplate,
        effect_index: usize,
        _target: ObjectGuid,
    ) {
        debug!(
            "unscripted dummy effect {effect_index} of spell {} cast by {caster}",
            template.id
        );
    }
}

/// Keeps only the most injured candidate. Used by triage-style spells
/// whose tooltip promises "the most wounded ally".
pub struct MostInjuredOnly;

impl SpellOverride for MostInjuredOnly {
    fn filter_targets(
        &self,
        world: &mut World,
        _template: &SpellTemplate,
        _effect_index: usize,
        candidates: &mut Vec<ObjectGuid>,
    ) {
        let most_injured = candidates
            .iter()
            .copied()
            .filter_map(|g| world.unit(g).map(|u| (g, u.health_pct())))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(g, _)| g);
        candidates.clear();
        if let Some(g) = most_injured {
            candidates.push(g);
        }
    }
}

/// Converts a dummy effect into a flat self-heal of the triggering
/// amount. The classic pattern for "... heals you for X" rider text.
pub struct SelfHealDummy {
    pub amount: u32,
}

impl SpellOverride for SelfHealDummy {
    fn dummy_effect(
        &self,
        world: &mut World,
        caster: ObjectGuid,
        template: &SpellTemplate,
        _effect_index: usize,
        _target: ObjectGuid,
    ) {
        crate::combat::heal(world, caster, caster, self.amount, template.id, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SpellStore;
    use crate::unit::Unit;
    use arcanum_core::types::Position;

    #[test]
    fn test_most_injured_only_keeps_one() {
        let mut world = World::new(SpellStore::new(), 3);
        let a = ObjectGuid::player(1);
        let b = ObjectGuid::player(2);
        world.insert_unit(Unit::new(a, "Whole", 10, 1, Position::default()));
        world.insert_unit(Unit::new(b, "Hurt", 10, 1, Position::default()));
        world.unit_mut(b).unwrap().modify_health(-400);

        let template = SpellTemplate::default();
        let mut candidates = vec![a, b];
        MostInjuredOnly.filter_targets(&mut world, &template, 0, &mut candidates);
        assert_eq!(candidates, vec![b]);
    }

    #[test]
    fn test_self_heal_dummy() {
        let mut world = World::new(SpellStore::new(), 3);
        let caster = ObjectGuid::player(1);
        world.insert_unit(Unit::new(caster, "Healer", 10, 1, Position::default()));
        world.unit_mut(caster).unwrap().modify_health(-500);

        let template = SpellTemplate::default();
        SelfHealDummy { amount: 200 }.dummy_effect(&mut world, caster, &template, 0, caster);
        assert_eq!(world.unit(caster).unwrap().health, 700);
    }
}
