//! assetry — deferred-construction asset cache
//!
//! This binary is a small smoke-test harness, not a product surface: it
//! builds a heap, inserts a couple of assets, advances a visibility barrier,
//! and logs what it sees. Real consumers embed the library directly.

use std::panic;
use std::sync::Arc;
use std::time::Duration;

use assetry::compound::{
    resolve_merge_cached, Component, CompoundAssetScaffold, MergeableComponent, SameScaffoldLoader, SearchRules,
};
use assetry::compound::{ComponentSource, Indexer};
use assetry::depval::DepValRegistry;
use assetry::dispatch::{ConstructorKind, Dispatcher, ParamPack};
use assetry::error::AssetResult;
use assetry::heap::{AssetHeap, HeapConfig};
use assetry::ids::{AssetTypeId, IdentifierCode};
use assetry::io::{InMemoryFileSystem, StubCompiler};
use assetry::operation_context::OperationContext;

#[derive(Debug, Clone, PartialEq)]
struct DemoAsset(String);

impl AssetTypeId for DemoAsset {
    const TYPE_NAME: &'static str = "assetry::demo::DemoAsset";
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tags(Vec<String>);

impl Component for Tags {
    const COMPONENT_TYPE: &'static str = "Tags";

    fn deserialize(source: &ComponentSource, _search_rules: &SearchRules) -> AssetResult<Self> {
        match source {
            ComponentSource::Inline(text) => {
                Ok(Tags(text.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect()))
            }
            ComponentSource::External(path) => Ok(Tags(vec![format!("external:{path}")])),
        }
    }
}

impl MergeableComponent for Tags {
    fn empty() -> Self {
        Tags(Vec::new())
    }

    fn merge_in_with_filename_resolve(&mut self, other: &Self, _search_rules: &SearchRules) -> AssetResult<()> {
        for tag in &other.0 {
            if !self.0.contains(tag) {
                self.0.push(tag.clone());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Sprite(String);

impl AssetTypeId for Sprite {
    const TYPE_NAME: &'static str = "assetry::demo::Sprite";
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("assetry fatal error:");
        eprintln!("{panic_info}");
        if let Some(location) = panic_info.location() {
            eprintln!("location: {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("=======================================================");
    log::info!("  assetry — deferred-construction asset cache");
    log::info!("  version: {}", assetry::VERSION);
    log::info!("=======================================================");

    let operation_context = Arc::new(OperationContext::new());
    let heap = AssetHeap::with_operation_context(HeapConfig::default(), operation_context.clone());
    let registry = DepValRegistry::new();

    heap.insert_ready::<DemoAsset>(
        IdentifierCode::from_hashable(&"immediate"),
        "immediate",
        registry.invalid_handle(),
        DemoAsset("loaded synchronously".to_string()),
    );

    let deferred = heap.insert::<DemoAsset, _>(
        IdentifierCode::from_hashable(&"deferred"),
        "deferred",
        registry.invalid_handle(),
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(DemoAsset("built off the calling thread".to_string()))
        },
    );

    log::info!("in flight while deferred asset builds: {:?}", operation_context.snapshot().labels);
    log::info!("waiting for deferred asset to resolve...");
    heap.stall_while_pending::<DemoAsset>(IdentifierCode::from_hashable(&"deferred"))
        .await?;
    heap.visibility_barrier();

    log::info!("deferred asset: {:?}", deferred.actualize());
    log::info!("in flight after resolve: {}", operation_context.in_flight_count());

    log::info!("---------------------------------------------------");
    log::info!("  compound-asset resolution, cached in the heap");
    log::info!("---------------------------------------------------");

    let scaffold = Arc::new(CompoundAssetScaffold::parse(
        "\
Entity Base
Tags Base
    flammable

Entity Hero
Inherit Hero
    Base
Tags Hero
    playable
",
    )?);
    let hero = scaffold.entity_index("Hero").expect("Hero entity");
    let indexer = Indexer::ScaffoldEntity {
        scaffold_unique_id: scaffold.unique_id,
        entity_name: "Hero".to_string(),
    };

    let tags = resolve_merge_cached::<Tags>(
        &heap,
        &indexer,
        &scaffold,
        hero,
        &SameScaffoldLoader,
        &SearchRules::default(),
        &registry,
    )?;
    log::info!("Hero tags (first resolve): {:?}", tags.actualize()?.0);

    // Served from the heap cache this time; no re-walk of the inheritance tree.
    let tags_again = resolve_merge_cached::<Tags>(
        &heap,
        &indexer,
        &scaffold,
        hero,
        &SameScaffoldLoader,
        &SearchRules::default(),
        &registry,
    )?;
    log::info!("Hero tags (cached resolve): {:?}", tags_again.actualize()?.0);

    log::info!("---------------------------------------------------");
    log::info!("  auto-construct dispatch");
    log::info!("---------------------------------------------------");

    let file_system = Arc::new(InMemoryFileSystem::new());
    file_system.put("sprite.png", b"not-really-a-png".to_vec());
    let dispatcher = Dispatcher::new(file_system, Arc::new(StubCompiler::new()));
    dispatcher.register::<Sprite>(ConstructorKind::ChunkContainer(Arc::new(|params, bytes| {
        Ok(Sprite(format!("{}: {} bytes", params.name, bytes.len())))
    })));

    let sprite = dispatcher
        .dispatch::<Sprite>(ParamPack {
            name: "sprite.png".to_string(),
            base_dir: String::new(),
            dep_val: registry.invalid_handle(),
        })?
        .await;
    log::info!("dispatched sprite: {sprite:?}");

    heap.shutdown().await;

    log::info!("=======================================================");
    log::info!("  assetry shutdown complete");
    log::info!("=======================================================");

    Ok(())
}
