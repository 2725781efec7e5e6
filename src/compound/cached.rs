//! Caching resolved compound-asset components in the heap
//!
//! [`resolver`](super::resolver) resolves a component's value from a
//! scaffold's inheritance tree; this module is what actually puts that value
//! where repeat resolutions can find it without re-walking the tree, the way
//! every other asset type in this crate is looked up: through
//! [`AssetHeap`](crate::heap::AssetHeap), under a key derived by
//! [`Indexer::cache_key`](super::Indexer::cache_key).

use std::sync::Arc;

use crate::depval::DepValRegistry;
use crate::error::AssetResult;
use crate::heap::AssetHeap;
use crate::ids::{AssetTypeId, TypeCode};
use crate::marker::Marker;

use super::cachekey::Indexer;
use super::resolver::{resolve_merge, resolve_top_most, Component, EntityLoader, MergeableComponent, SearchRules};
use super::scaffold::CompoundAssetScaffold;

/// A resolved component, stored in the heap as its own asset type so it can
/// be cached and looked up the same way any other asset is.
///
/// `AssetTypeId::TYPE_NAME` must be a compile-time `&'static str` literal, so
/// it can't be built generically from [`Component::COMPONENT_TYPE`] at the
/// trait-definition level; `ResolvedAsset<C>` instead overrides
/// [`AssetTypeId::type_code`] directly, hashing a fixed prefix together with
/// `C::COMPONENT_TYPE` so distinct component types never collide in the
/// heap's type registry.
#[derive(Debug, Clone)]
pub struct ResolvedAsset<C>(pub C);

impl<C: Component> AssetTypeId for ResolvedAsset<C> {
    const TYPE_NAME: &'static str = "compound::ResolvedAsset";

    fn type_code() -> TypeCode {
        let mut buf = Vec::with_capacity(32 + C::COMPONENT_TYPE.len());
        buf.extend_from_slice(b"compound::ResolvedAsset::");
        buf.extend_from_slice(C::COMPONENT_TYPE.as_bytes());
        let hash = blake3::hash(&buf);
        let b = hash.as_bytes();
        TypeCode(u64::from_le_bytes(b[0..8].try_into().unwrap()))
    }
}

/// Merge-style resolve, caching the result in `heap` under `indexer`'s key.
/// A second call with the same indexer and component type returns the cached
/// marker without re-walking the inheritance tree.
pub fn resolve_merge_cached<C: MergeableComponent>(
    heap: &Arc<AssetHeap>,
    indexer: &Indexer,
    scaffold: &Arc<CompoundAssetScaffold>,
    entity_index: usize,
    loader: &dyn EntityLoader,
    search_rules: &SearchRules,
    dep_val_registry: &Arc<DepValRegistry>,
) -> AssetResult<Arc<Marker<ResolvedAsset<C>>>> {
    let key = indexer.cache_key(C::COMPONENT_TYPE);
    if let Some(marker) = heap.lookup::<ResolvedAsset<C>>(key) {
        return Ok(marker);
    }
    let (value, dep_val) = resolve_merge::<C>(scaffold, entity_index, loader, search_rules, dep_val_registry)?;
    let initializer = format!("compound:{}:{key}", C::COMPONENT_TYPE);
    Ok(heap.insert_ready::<ResolvedAsset<C>>(key, initializer, dep_val, ResolvedAsset(value)))
}

/// Top-most-style resolve, caching the result in `heap` under `indexer`'s
/// key. A second call with the same indexer and component type returns the
/// cached marker without re-walking the inheritance tree.
pub fn resolve_top_most_cached<C: Component>(
    heap: &Arc<AssetHeap>,
    indexer: &Indexer,
    scaffold: &Arc<CompoundAssetScaffold>,
    entity_index: usize,
    loader: &dyn EntityLoader,
    search_rules: &SearchRules,
    dep_val_registry: &Arc<DepValRegistry>,
) -> AssetResult<Arc<Marker<ResolvedAsset<C>>>> {
    let key = indexer.cache_key(C::COMPONENT_TYPE);
    if let Some(marker) = heap.lookup::<ResolvedAsset<C>>(key) {
        return Ok(marker);
    }
    let (value, dep_val) = resolve_top_most::<C>(scaffold, entity_index, loader, search_rules, dep_val_registry)?;
    let initializer = format!("compound:{}:{key}", C::COMPONENT_TYPE);
    Ok(heap.insert_ready::<ResolvedAsset<C>>(key, initializer, dep_val, ResolvedAsset(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::{ComponentSource, SameScaffoldLoader};
    use crate::error::AssetResult as Res;
    use crate::heap::HeapConfig;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Tags(Vec<String>);

    impl Component for Tags {
        const COMPONENT_TYPE: &'static str = "Tags";

        fn deserialize(source: &ComponentSource, _search_rules: &SearchRules) -> Res<Self> {
            match source {
                ComponentSource::Inline(text) => Ok(Tags(
                    text.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect(),
                )),
                ComponentSource::External(path) => Ok(Tags(vec![format!("external:{path}")])),
            }
        }
    }

    impl MergeableComponent for Tags {
        fn empty() -> Self {
            Tags(Vec::new())
        }

        fn merge_in_with_filename_resolve(&mut self, other: &Self, _search_rules: &SearchRules) -> Res<()> {
            for tag in &other.0 {
                if !self.0.contains(tag) {
                    self.0.push(tag.clone());
                }
            }
            Ok(())
        }
    }

    fn diamond_doc() -> &'static str {
        "\
Entity C
Tags C
    from-c

Entity A
Inherit A
    C
Tags A
    from-a

Entity R
Inherit R
    A
Tags R
    from-r
"
    }

    #[test]
    fn second_resolve_is_served_from_the_heap_cache() {
        let heap = AssetHeap::with_config(HeapConfig::default());
        let registry = DepValRegistry::new();
        let scaffold = Arc::new(CompoundAssetScaffold::parse(diamond_doc()).unwrap());
        let r = scaffold.entity_index("R").unwrap();
        let indexer = Indexer::ScaffoldEntity {
            scaffold_unique_id: scaffold.unique_id,
            entity_name: "R".to_string(),
        };

        let first = resolve_merge_cached::<Tags>(
            &heap,
            &indexer,
            &scaffold,
            r,
            &SameScaffoldLoader,
            &SearchRules::default(),
            &registry,
        )
        .unwrap();
        assert_eq!(first.actualize().unwrap().0 .0, vec!["from-c", "from-a", "from-r"]);

        let second = resolve_merge_cached::<Tags>(
            &heap,
            &indexer,
            &scaffold,
            r,
            &SameScaffoldLoader,
            &SearchRules::default(),
            &registry,
        )
        .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn distinct_component_types_never_collide_in_the_heap() {
        #[derive(Debug, Clone, PartialEq, Eq)]
        struct OtherTags(Vec<String>);

        impl Component for OtherTags {
            const COMPONENT_TYPE: &'static str = "OtherTags";

            fn deserialize(source: &ComponentSource, _search_rules: &SearchRules) -> Res<Self> {
                match source {
                    ComponentSource::Inline(text) => Ok(OtherTags(
                        text.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect(),
                    )),
                    ComponentSource::External(path) => Ok(OtherTags(vec![format!("external:{path}")])),
                }
            }
        }

        assert_ne!(ResolvedAsset::<Tags>::type_code(), ResolvedAsset::<OtherTags>::type_code());
    }
}
