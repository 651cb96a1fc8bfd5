//! The casting engine: world state, units, the spell orchestrator and
//! everything it touches. The binary wires this up to a tick loop; tests
//! drive a [`world::World`] directly.

pub mod combat;
pub mod events;
pub mod object;
pub mod spell;
pub mod store;
pub mod unit;
pub mod world;
