//! Inheritance-tree resolution for compound assets
//!
//! Two resolution styles, matching what the target component type supports:
//!
//! - **Merge-style**: every ancestor of the requested entity is visited,
//!   children always ordered before their parents and siblings kept in
//!   declaration order, then merged into an accumulator starting from
//!   [`MergeableComponent::empty`], in that order.
//! - **Top-most-style**: the requested entity is checked first; if it
//!   doesn't provide the component, its parents are checked in declared
//!   order, recursively. The first provider wins and nothing is merged.

use std::collections::HashSet;
use std::sync::Arc;

use crate::depval::{DependencyValidation, DepValRegistry};
use crate::error::{AssetError, AssetResult};

use super::scaffold::{ComponentSource, CompoundAssetScaffold};

/// Where to resolve relative external references against.
#[derive(Debug, Clone, Default)]
pub struct SearchRules {
    /// Base directory external references are resolved relative to.
    pub base_dir: String,
}

/// A component type that can be deserialized from a scaffold attachment.
pub trait Component: Sized + Send + Sync + 'static {
    /// The key this component is attached under in a scaffold document.
    const COMPONENT_TYPE: &'static str;

    /// Build an instance from one attachment.
    fn deserialize(source: &ComponentSource, search_rules: &SearchRules) -> AssetResult<Self>;
}

/// A component type that also supports inheritance-tree merging.
pub trait MergeableComponent: Component {
    /// The accumulator every merge chain starts from.
    fn empty() -> Self;

    /// Fold `other`'s data into `self`. Called once per ancestor, in
    /// children-before-parent order, so the most-derived entity's values
    /// win when both set the same field.
    fn merge_in_with_filename_resolve(&mut self, other: &Self, search_rules: &SearchRules) -> AssetResult<()>;
}

/// Where an inherited parent name resolves to.
pub enum ResolvedParent {
    /// Another entity in the same scaffold.
    SameScaffold(usize),
    /// An entity in a different, already-loaded scaffold.
    External {
        /// The external scaffold.
        scaffold: Arc<CompoundAssetScaffold>,
        /// Entity index within it.
        entity_index: usize,
    },
}

/// Resolves an inherited parent name against a scaffold.
///
/// The default behavior only looks inside the current scaffold, falling
/// back to treating an unresolved name as unknown rather than as an
/// external file reference; a pipeline that loads multiple scaffolds
/// together can supply its own implementation that also consults other
/// already-parsed documents.
pub trait EntityLoader: Send + Sync {
    /// Resolve `parent_name`, as declared on `scaffold`, to an entity.
    fn resolve_parent(
        &self,
        scaffold: &Arc<CompoundAssetScaffold>,
        parent_name: &str,
    ) -> AssetResult<ResolvedParent>;
}

/// Looks up parent names only within the scaffold that declared them.
pub struct SameScaffoldLoader;

impl EntityLoader for SameScaffoldLoader {
    fn resolve_parent(
        &self,
        scaffold: &Arc<CompoundAssetScaffold>,
        parent_name: &str,
    ) -> AssetResult<ResolvedParent> {
        scaffold
            .entity_index(parent_name)
            .map(ResolvedParent::SameScaffold)
            .ok_or_else(|| AssetError::Format {
                location: parent_name.to_string(),
                message: format!("unresolved inherited entity '{parent_name}'"),
            })
    }
}

type TreeNode = (Arc<CompoundAssetScaffold>, usize);

/// Build the ordered ancestor list for `entity_index` within `scaffold`:
/// every ancestor precedes its descendants' merge target, and siblings
/// preserve declared order. Detects true inheritance cycles
/// (an entity reachable from itself along one inheritance path) while
/// still permitting diamond inheritance, where the same ancestor is reached
/// through more than one branch (see DESIGN.md Open Question #1).
pub fn build_ancestor_order(
    scaffold: &Arc<CompoundAssetScaffold>,
    entity_index: usize,
    loader: &dyn EntityLoader,
) -> AssetResult<Vec<TreeNode>> {
    let mut ordered = Vec::new();
    let mut path = HashSet::new();
    visit(scaffold, entity_index, loader, &mut path, &mut ordered)?;
    Ok(ordered)
}

fn visit(
    scaffold: &Arc<CompoundAssetScaffold>,
    entity_index: usize,
    loader: &dyn EntityLoader,
    path: &mut HashSet<(u64, usize)>,
    ordered: &mut Vec<TreeNode>,
) -> AssetResult<()> {
    let key = (scaffold.unique_id, entity_index);
    if !path.insert(key) {
        return Err(AssetError::Format {
            location: scaffold.entities[entity_index].name.clone(),
            message: "inheritance cycle detected".to_string(),
        });
    }

    for parent_name in scaffold.parents_of(entity_index).to_vec() {
        match loader.resolve_parent(scaffold, &parent_name)? {
            ResolvedParent::SameScaffold(idx) => visit(scaffold, idx, loader, path, ordered)?,
            ResolvedParent::External {
                scaffold: other,
                entity_index: idx,
            } => visit(&other, idx, loader, path, ordered)?,
        }
    }

    path.remove(&key);
    ordered.push((scaffold.clone(), entity_index));
    Ok(())
}

/// Resolve `entity_index` via the merge-style path: build every ancestor's
/// contribution, in order, and fold them into one accumulator starting from
/// [`MergeableComponent::empty`].
pub fn resolve_merge<C: MergeableComponent>(
    scaffold: &Arc<CompoundAssetScaffold>,
    entity_index: usize,
    loader: &dyn EntityLoader,
    search_rules: &SearchRules,
    dep_val_registry: &Arc<DepValRegistry>,
) -> AssetResult<(C, DependencyValidation)> {
    let ordered = build_ancestor_order(scaffold, entity_index, loader)?;

    let mut accumulator = C::empty();
    let mut leaf_dep_vals = Vec::new();

    for (node_scaffold, node_entity) in &ordered {
        leaf_dep_vals.push(dep_val_registry.make_file(
            &format!("scaffold:{}", node_scaffold.unique_id),
            node_scaffold.unique_id,
        ));

        if let Some(row) = node_scaffold.component_for(*node_entity, C::COMPONENT_TYPE) {
            let contribution = C::deserialize(&row.source, search_rules)?;
            accumulator.merge_in_with_filename_resolve(&contribution, search_rules)?;
        }
    }

    let composite = dep_val_registry.make_or_reuse(&leaf_dep_vals);
    Ok((accumulator, composite))
}

/// Resolve `entity_index` via the top-most-style path: the entity itself is
/// checked first, then its ancestors in declared order, recursively. The
/// first provider wins; nothing is merged.
pub fn resolve_top_most<C: Component>(
    scaffold: &Arc<CompoundAssetScaffold>,
    entity_index: usize,
    loader: &dyn EntityLoader,
    search_rules: &SearchRules,
    dep_val_registry: &Arc<DepValRegistry>,
) -> AssetResult<(C, DependencyValidation)> {
    let mut path = HashSet::new();
    find_top_most(scaffold, entity_index, loader, search_rules, dep_val_registry, &mut path)?
        .ok_or_else(|| AssetError::Retrieval(format!(
            "no entity in the inheritance tree of '{}' provides component '{}'",
            scaffold.entities[entity_index].name,
            C::COMPONENT_TYPE
        )))
}

fn find_top_most<C: Component>(
    scaffold: &Arc<CompoundAssetScaffold>,
    entity_index: usize,
    loader: &dyn EntityLoader,
    search_rules: &SearchRules,
    dep_val_registry: &Arc<DepValRegistry>,
    path: &mut HashSet<(u64, usize)>,
) -> AssetResult<Option<(C, DependencyValidation)>> {
    let key = (scaffold.unique_id, entity_index);
    if !path.insert(key) {
        return Err(AssetError::Format {
            location: scaffold.entities[entity_index].name.clone(),
            message: "inheritance cycle detected".to_string(),
        });
    }

    if let Some(row) = scaffold.component_for(entity_index, C::COMPONENT_TYPE) {
        let value = C::deserialize(&row.source, search_rules)?;
        let dep_val = dep_val_registry.make_file(&format!("scaffold:{}", scaffold.unique_id), scaffold.unique_id);
        path.remove(&key);
        return Ok(Some((value, dep_val)));
    }

    for parent_name in scaffold.parents_of(entity_index).to_vec() {
        let found = match loader.resolve_parent(scaffold, &parent_name)? {
            ResolvedParent::SameScaffold(idx) => {
                find_top_most(scaffold, idx, loader, search_rules, dep_val_registry, path)?
            }
            ResolvedParent::External { scaffold: other, entity_index: idx } => {
                find_top_most(&other, idx, loader, search_rules, dep_val_registry, path)?
            }
        };
        if found.is_some() {
            path.remove(&key);
            return Ok(found);
        }
    }

    path.remove(&key);
    Ok(None)
}
