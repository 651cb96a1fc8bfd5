//! Data types module - GUIDs, positions, templates and the closed
//! enumerations the casting engine is built on.

pub mod attributes;
mod enums;
mod guid;
mod position;
mod template;

// Re-export all types
pub use attributes::{CastFlags, SpellAttr0, SpellAttr1, SpellAttr2, TargetMask, UnitFlags};
pub use enums::*;
pub use guid::{GuidKind, ObjectGuid};
pub use position::Position;
pub use template::{Reagent, SpellEffectTemplate, SpellTemplate};
