//! Immutable spell data store.
//!
//! Templates and the script target-entry table are loaded once from
//! zlib-compressed bincode files at startup and never mutated afterwards.
//! A missing data file is tolerated with a warning so a bare checkout can
//! still boot an empty world.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use bincode::{Decode, Encode};
use flate2::read::ZlibDecoder;
use log::{info, warn};

use arcanum_core::constants::{SPELL_DAT, SPELL_TARGET_DAT};
use arcanum_core::types::SpellTemplate;

use crate::spell::overrides::SpellOverride;

/// One row of the script target table: spells whose area-entry targets
/// are restricted to specific creature entries.
#[derive(Debug, Clone, Copy, Encode, Decode)]
pub struct ScriptTargetEntry {
    pub spell_id: u32,
    /// Creature template entry the target must have.
    pub entry: u32,
    /// Whether the spell wants the dead form of that creature.
    pub require_dead: bool,
}

#[derive(Default)]
pub struct SpellStore {
    templates: HashMap<u32, Arc<SpellTemplate>>,
    script_targets: HashMap<u32, Vec<ScriptTargetEntry>>,
    overrides: HashMap<u32, Arc<dyn SpellOverride + Send + Sync>>,
}

impl SpellStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load templates and script targets from `data_dir`.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let mut store = Self::new();

        let templates: Option<Vec<SpellTemplate>> =
            read_compressed(&data_dir.join(SPELL_DAT))?;
        match templates {
            Some(list) => {
                info!("Loaded {} spell templates", list.len());
                for t in list {
                    store.templates.insert(t.id, Arc::new(t));
                }
            }
            None => warn!("No spell template file found; starting with an empty store"),
        }

        let targets: Option<Vec<ScriptTargetEntry>> =
            read_compressed(&data_dir.join(SPELL_TARGET_DAT))?;
        match targets {
            Some(list) => {
                info!("Loaded {} script target entries", list.len());
                for row in list {
                    store.script_targets.entry(row.spell_id).or_default().push(row);
                }
            }
            None => warn!("No script target file found"),
        }

        Ok(store)
    }

    pub fn insert_template(&mut self, template: SpellTemplate) {
        self.templates.insert(template.id, Arc::new(template));
    }

    pub fn template(&self, spell_id: u32) -> Option<Arc<SpellTemplate>> {
        self.templates.get(&spell_id).cloned()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    pub fn add_script_target(&mut self, row: ScriptTargetEntry) {
        self.script_targets.entry(row.spell_id).or_default().push(row);
    }

    pub fn script_targets(&self, spell_id: u32) -> &[ScriptTargetEntry] {
        self.script_targets
            .get(&spell_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Hook a per-spell override into target selection and dummy effects.
    pub fn register_override(
        &mut self,
        spell_id: u32,
        handler: Arc<dyn SpellOverride + Send + Sync>,
    ) {
        self.overrides.insert(spell_id, handler);
    }

    pub fn override_for(&self, spell_id: u32) -> Option<Arc<dyn SpellOverride + Send + Sync>> {
        self.overrides.get(&spell_id).cloned()
    }
}

/// Read and decode one zlib-compressed bincode file. A missing file is
/// `Ok(None)`; a present but unreadable file is an error.
fn read_compressed<T: Decode<()>>(path: &Path) -> anyhow::Result<Option<Vec<T>>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut decoder = ZlibDecoder::new(file);
    let mut bytes = Vec::new();
    decoder
        .read_to_end(&mut bytes)
        .with_context(|| format!("decompressing {}", path.display()))?;
    let (decoded, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
        .with_context(|| format!("decoding {}", path.display()))?;
    Ok(Some(decoded))
}
