//! Compound-asset scaffold parsing
//!
//! A scaffold is a small keyed text document describing entities, the
//! components attached to them, and inheritance between entities. The
//! grammar recognized here:
//!
//! ```text
//! Entity Hero
//! Inherit Hero
//!     Humanoid
//!     Equippable
//! Material Hero
//!     base_color = #ff8800
//! Mesh Hero external:meshes/hero.mesh
//! ```
//!
//! Top-level lines are `<Key> <EntityName> [rest]`. `Entity` reserves a slot.
//! `Inherit` consumes the following indented block as a list of parent
//! entity names (duplicates coalesced, self-inherit rejected at parse
//! time). Any other key names a component type; `external:<path>` attaches
//! an external reference, otherwise the following indented block is kept
//! verbatim as an inline chunk.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::{AssetError, AssetResult};

/// One component attachment: either inline text or a reference elsewhere.
#[derive(Debug, Clone)]
pub enum ComponentSource {
    /// The component's content is inline in the scaffold.
    Inline(String),
    /// The component's content lives in another file.
    External(String),
}

/// A (component type, source) row, indexed by position in
/// [`CompoundAssetScaffold::components`].
#[derive(Debug, Clone)]
pub struct ComponentRow {
    /// Name of the component type this row attaches (e.g. `"Material"`).
    pub component_type: String,
    /// Which entity this row belongs to.
    pub entity_index: usize,
    /// Inline text or external reference.
    pub source: ComponentSource,
}

/// Bookkeeping for one parsed entity.
#[derive(Debug, Clone)]
pub struct EntityBookkeeping {
    /// Entity name as written in the document.
    pub name: String,
    /// Half-open range into `inherit_list` naming this entity's parents, in
    /// declared order.
    pub inherit_range: Range<usize>,
}

/// Parsed form of a compound text document.
///
/// Every string referenced by [`ComponentSource::Inline`]/`External` values
/// and by entity/component names is its own owned `String`, copied out of
/// the source document once at parse time; there is no retained backing blob
/// consumers need to keep alive alongside the scaffold.
#[derive(Debug, Clone)]
pub struct CompoundAssetScaffold {
    /// Entities in declaration order.
    pub entities: Vec<EntityBookkeeping>,
    /// Entity name hash -> index into `entities`.
    pub entity_lookup: HashMap<u64, usize>,
    /// Every component attachment, in declaration order.
    pub components: Vec<ComponentRow>,
    /// Flat storage of inherited-parent names; `EntityBookkeeping::inherit_range`
    /// slices into this.
    pub inherit_list: Vec<String>,
    /// `blake3`-derived id of the document content, used as part of the
    /// resolver's cache key so two parses of identical bytes always agree.
    pub unique_id: u64,
}

fn hash_name(name: &str) -> u64 {
    let hash = blake3::hash(name.as_bytes());
    let b = hash.as_bytes();
    u64::from_le_bytes(b[0..8].try_into().unwrap())
}

impl CompoundAssetScaffold {
    /// Parse a scaffold document.
    pub fn parse(document: &str) -> AssetResult<Self> {
        let mut entities: Vec<EntityBookkeeping> = Vec::new();
        let mut entity_lookup: HashMap<u64, usize> = HashMap::new();
        let mut components: Vec<ComponentRow> = Vec::new();
        let mut inherit_list: Vec<String> = Vec::new();

        let lines: Vec<&str> = document.lines().collect();
        let mut i = 0usize;
        let mut line_no = 0usize;

        while i < lines.len() {
            line_no += 1;
            let raw = lines[i];
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                i += 1;
                continue;
            }
            if raw.starts_with(char::is_whitespace) {
                return Err(AssetError::Format {
                    location: format!("{line_no}:1"),
                    message: "unexpected indented line outside any block".to_string(),
                });
            }

            let mut parts = trimmed.splitn(3, ' ');
            let key = parts.next().unwrap_or_default();
            let entity_name = parts.next().unwrap_or_default().to_string();
            let rest = parts.next().unwrap_or_default().to_string();

            if entity_name.is_empty() {
                return Err(AssetError::Format {
                    location: format!("{line_no}:1"),
                    message: format!("'{key}' requires an entity name"),
                });
            }

            // Collect any following indented lines as this key's block.
            let mut block = Vec::new();
            let mut j = i + 1;
            while j < lines.len() && lines[j].starts_with(char::is_whitespace) && !lines[j].trim().is_empty() {
                block.push(lines[j].trim().to_string());
                j += 1;
            }

            match key {
                "Entity" => {
                    let hash = hash_name(&entity_name);
                    if entity_lookup.contains_key(&hash) {
                        return Err(AssetError::Format {
                            location: format!("{line_no}:1"),
                            message: format!("duplicate entity '{entity_name}'"),
                        });
                    }
                    let index = entities.len();
                    entities.push(EntityBookkeeping {
                        name: entity_name.clone(),
                        inherit_range: 0..0,
                    });
                    entity_lookup.insert(hash, index);
                }
                "Inherit" => {
                    let entity_index = *entity_lookup.get(&hash_name(&entity_name)).ok_or_else(|| {
                        AssetError::Format {
                            location: format!("{line_no}:1"),
                            message: format!("Inherit references unknown entity '{entity_name}'"),
                        }
                    })?;

                    let mut parents = Vec::new();
                    for parent in block {
                        if parent == entity_name {
                            return Err(AssetError::Format {
                                location: format!("{line_no}:1"),
                                message: format!("entity '{entity_name}' cannot inherit itself"),
                            });
                        }
                        if !parents.contains(&parent) {
                            parents.push(parent);
                        }
                    }

                    let start = inherit_list.len();
                    inherit_list.extend(parents);
                    let end = inherit_list.len();
                    entities[entity_index].inherit_range = start..end;
                }
                component_type => {
                    let entity_index = *entity_lookup.get(&hash_name(&entity_name)).ok_or_else(|| {
                        AssetError::Format {
                            location: format!("{line_no}:1"),
                            message: format!(
                                "component '{component_type}' references unknown entity '{entity_name}'"
                            ),
                        }
                    })?;

                    let source = if let Some(path) = rest.strip_prefix("external:") {
                        ComponentSource::External(path.to_string())
                    } else {
                        ComponentSource::Inline(block.join("\n"))
                    };

                    components.push(ComponentRow {
                        component_type: component_type.to_string(),
                        entity_index,
                        source,
                    });
                }
            }

            i = j;
        }

        let unique_id = {
            let hash = blake3::hash(document.as_bytes());
            let b = hash.as_bytes();
            u64::from_le_bytes(b[0..8].try_into().unwrap())
        };

        Ok(Self {
            entities,
            entity_lookup,
            components,
            inherit_list,
            unique_id,
        })
    }

    /// Look up an entity's index by name.
    pub fn entity_index(&self, name: &str) -> Option<usize> {
        self.entity_lookup.get(&hash_name(name)).copied()
    }

    /// Every component row attached to `entity_index`, in declaration order.
    pub fn components_for(&self, entity_index: usize) -> impl Iterator<Item = &ComponentRow> {
        self.components
            .iter()
            .filter(move |row| row.entity_index == entity_index)
    }

    /// The first component row of type `component_type` attached to
    /// `entity_index`, if any. Used by the "top-most" resolution style.
    pub fn component_for(&self, entity_index: usize, component_type: &str) -> Option<&ComponentRow> {
        self.components_for(entity_index)
            .find(|row| row.component_type == component_type)
    }

    /// The ordered list of parent entity names for `entity_index`.
    pub fn parents_of(&self, entity_index: usize) -> &[String] {
        &self.inherit_list[self.entities[entity_index].inherit_range.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entities_components_and_inherits() {
        let doc = "\
Entity C
Material C
    base_color = blue

Entity A
Inherit A
    C
Material A
    base_color = red

Entity B
Inherit B
    C

Entity R
Inherit R
    A
    B
Material R
    base_color = green
";
        let scaffold = CompoundAssetScaffold::parse(doc).unwrap();
        assert_eq!(scaffold.entities.len(), 4);

        let r = scaffold.entity_index("R").unwrap();
        assert_eq!(scaffold.parents_of(r), &["A".to_string(), "B".to_string()]);

        let a = scaffold.entity_index("A").unwrap();
        assert_eq!(scaffold.parents_of(a), &["C".to_string()]);
    }

    #[test]
    fn rejects_self_inherit() {
        let doc = "Entity A\nInherit A\n    A\n";
        let err = CompoundAssetScaffold::parse(doc).unwrap_err();
        assert!(matches!(err, AssetError::Format { .. }));
    }

    #[test]
    fn dedups_inherit_list_but_preserves_order() {
        let doc = "Entity R\nInherit R\n    A\n    A\n    B\n";
        let scaffold = CompoundAssetScaffold::parse(doc).unwrap();
        let r = scaffold.entity_index("R").unwrap();
        assert_eq!(scaffold.parents_of(r), &["A".to_string(), "B".to_string()]);
    }
}
