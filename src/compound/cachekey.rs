//! Cache-key derivation for resolved compound assets
//!
//! Every resolved asset is cached in the heap under a synthetic
//! `ResolvedAsset<C>` type, keyed by a hash of (component type name,
//! indexer), so parsing the same bytes and resolving the same component
//! always yields the same key.

use crate::ids::IdentifierCode;

/// What a compound-asset lookup is indexed by.
#[derive(Debug, Clone)]
pub enum Indexer {
    /// An entity inside an already-parsed scaffold.
    ScaffoldEntity {
        /// `CompoundAssetScaffold::unique_id` of the owning scaffold.
        scaffold_unique_id: u64,
        /// Entity name within that scaffold.
        entity_name: String,
    },
    /// A free-form context + identifier pair (e.g. a file path and a
    /// sub-resource name within it), for assets reached without going
    /// through a scaffold at all.
    ContextAndIdentifier {
        /// Where to resolve `identifier` against (e.g. a base directory).
        context: String,
        /// The asset's own identifier within that context.
        identifier: String,
    },
}

impl Indexer {
    /// Compute the cache key for looking up `component_type` under this
    /// indexer.
    pub fn cache_key(&self, component_type: &str) -> IdentifierCode {
        match self {
            Indexer::ScaffoldEntity {
                scaffold_unique_id,
                entity_name,
            } => {
                let mut buf = Vec::new();
                buf.extend_from_slice(component_type.as_bytes());
                buf.push(0);
                buf.extend_from_slice(&scaffold_unique_id.to_le_bytes());
                buf.push(0);
                buf.extend_from_slice(entity_name.as_bytes());
                IdentifierCode::from_bytes(&buf)
            }
            Indexer::ContextAndIdentifier { context, identifier } => {
                let mut buf = Vec::new();
                buf.extend_from_slice(component_type.as_bytes());
                buf.push(0);
                buf.extend_from_slice(context.as_bytes());
                buf.push(0);
                buf.extend_from_slice(identifier.as_bytes());
                IdentifierCode::from_bytes(&buf)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_deterministic() {
        let indexer = Indexer::ScaffoldEntity {
            scaffold_unique_id: 42,
            entity_name: "Hero".to_string(),
        };
        assert_eq!(indexer.cache_key("Material"), indexer.cache_key("Material"));
    }

    #[test]
    fn cache_key_distinguishes_component_type() {
        let indexer = Indexer::ScaffoldEntity {
            scaffold_unique_id: 42,
            entity_name: "Hero".to_string(),
        };
        assert_ne!(indexer.cache_key("Material"), indexer.cache_key("Mesh"));
    }
}
