//! Auto-construct dispatch
//!
//! Given a requested asset type `T` and a parameter pack, selects one of a
//! fixed set of constructor paths: a direct constructor, a user-supplied
//! override, a text-document constructor run through
//! [`crate::io::TextFormatter`], a chunk-container constructor that hands a
//! single opened file straight to `T`, a chunked-requests constructor that
//! resolves the set of chunk keys `T` itself declares it needs, or a
//! compiler-backed path through [`crate::io::IntermediateCompiler`]. The
//! selection is a sealed enum of constructor kinds plus a small per-type
//! dispatch table populated at registration time, rather than overload
//! resolution picked at compile time.
//!
//! Every kind ultimately produces a `Future<Output = Result<T, MarkerFailure>>`
//! suitable for [`crate::heap::AssetHeap::insert`], which already catches
//! constructor panics at the task boundary (see `heap::watcher`) — panics
//! raised from inside a user override are caught there, never here.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use thiserror::Error;

use crate::depval::DependencyValidation;
use crate::error::ConstructionReason;
use crate::ids::{AssetTypeId, TypeCode};
use crate::io::{CompileArtifact, CompileRequest, IntermediateCompiler, TextFormatter};
use crate::marker::MarkerFailure;

/// Errors raised by dispatch registration/lookup itself (as opposed to
/// failures from the constructor a dispatch entry runs, which are captured
/// into the resulting marker instead).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No constructor kind was registered for a type.
    #[error("no auto-construct entry registered for type {0:?}")]
    NoEntry(TypeCode),
}

/// The parameters an auto-construct invocation carries: the human-readable
/// name being constructed, a base path other relative references resolve
/// against, and the dependency validation the produced marker should carry
/// if the constructor doesn't build a more specific one itself.
#[derive(Debug, Clone)]
pub struct ParamPack {
    /// Name/path identifying what to construct.
    pub name: String,
    /// Base directory for resolving any further file references.
    pub base_dir: String,
    /// Dependency validation to fall back to.
    pub dep_val: DependencyValidation,
}

/// A type implements this to provide its own override constructor, found via
/// an explicit registry lookup at dispatch time.
pub trait AutoConstructOverride<T>: Send + Sync {
    /// Build `T` from `params`, asynchronously.
    fn construct(&self, params: ParamPack) -> BoxFuture<'static, Result<T, MarkerFailure>>;
}

/// A type's own declared set of chunk requests: which chunk keys it needs
/// resolved before it can be built, and how to assemble the resolved chunks
/// into `T`. Distinct from [`ConstructorKind::ChunkContainer`], which hands a
/// single opened file straight to `T` with no per-chunk resolution step.
pub trait ChunkRequester<T>: Send + Sync {
    /// The chunk keys to resolve, in the order `from_chunks` expects them.
    fn requested_chunks(&self, params: &ParamPack) -> Vec<String>;

    /// Build `T` from the resolved chunk bytes, one per entry returned by
    /// `requested_chunks`, in the same order.
    fn from_chunks(&self, params: ParamPack, chunks: Vec<Vec<u8>>) -> Result<T, MarkerFailure>;
}

/// One asset type's compile-process descriptor: which process type it
/// declares, and how to turn a finished artifact into `T`.
pub trait CompileBacked<T>: Send + Sync {
    /// Name of the compile process type this asset is built from.
    fn process_type(&self) -> &str;

    /// Turn a finished artifact into the constructed value.
    fn from_artifact(&self, artifact: CompileArtifact) -> Result<T, MarkerFailure>;
}

/// The selected construction strategy for one asset type.
pub enum ConstructorKind<T> {
    /// `T::construct(params)` directly, no document or compiler involved.
    Direct(Arc<dyn Fn(ParamPack) -> BoxFuture<'static, Result<T, MarkerFailure>> + Send + Sync>),
    /// A registered user override.
    Override(Arc<dyn AutoConstructOverride<T>>),
    /// Open `params.name`, tokenize with the text formatter, and build from
    /// the token stream.
    TextDocument(Arc<dyn Fn(ParamPack, Vec<crate::io::Token>) -> Result<T, MarkerFailure> + Send + Sync>),
    /// Open `params.name` as a single chunk container and hand its raw bytes
    /// straight to `T`; no per-chunk resolution.
    ChunkContainer(Arc<dyn Fn(ParamPack, Vec<u8>) -> Result<T, MarkerFailure> + Send + Sync>),
    /// Resolve the set of chunk keys `T` declares it needs, then build from
    /// the resolved bytes.
    ChunkedRequests(Arc<dyn ChunkRequester<T>>),
    /// Resolve via an out-of-band compiler, then convert the artifact.
    CompilerBacked(Arc<dyn CompileBacked<T>>),
}

fn reason_to_failure(initializer: &str, reason: ConstructionReason, dep_val: DependencyValidation) -> MarkerFailure {
    MarkerFailure {
        reason: reason.clone(),
        actualization_log: format!("{initializer}: {reason}"),
        dep_val,
    }
}

impl<T: Send + Sync + 'static> ConstructorKind<T> {
    /// Run this constructor kind, producing the future `AssetHeap::insert`
    /// expects. File/text-document/chunk constructors read `params.name`
    /// through `file_system`; the compiler-backed path goes through
    /// `compiler`.
    pub fn invoke(
        &self,
        params: ParamPack,
        file_system: Arc<dyn crate::io::FileSystem>,
        compiler: Arc<dyn IntermediateCompiler>,
    ) -> BoxFuture<'static, Result<T, MarkerFailure>> {
        match self {
            ConstructorKind::Direct(f) => f(params),
            ConstructorKind::Override(o) => {
                let o = o.clone();
                o.construct(params)
            }
            ConstructorKind::TextDocument(build) => {
                let build = build.clone();
                Box::pin(async move {
                    let bytes = file_system.read(&params.name).await.map_err(|_| {
                        reason_to_failure(
                            &params.name,
                            ConstructionReason::MissingFile(params.name.clone()),
                            params.dep_val.clone(),
                        )
                    })?;
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    let tokens = TextFormatter::new(&text).tokenize_all().map_err(|_| {
                        reason_to_failure(
                            &params.name,
                            ConstructionReason::FormatNotUnderstood,
                            params.dep_val.clone(),
                        )
                    })?;
                    build(params, tokens)
                })
            }
            ConstructorKind::ChunkContainer(build) => {
                let build = build.clone();
                Box::pin(async move {
                    let bytes = file_system.read(&params.name).await.map_err(|_| {
                        reason_to_failure(
                            &params.name,
                            ConstructionReason::MissingFile(params.name.clone()),
                            params.dep_val.clone(),
                        )
                    })?;
                    build(params, bytes)
                })
            }
            ConstructorKind::ChunkedRequests(requester) => {
                let requester = requester.clone();
                Box::pin(async move {
                    let keys = requester.requested_chunks(&params);
                    let mut chunks = Vec::with_capacity(keys.len());
                    for key in &keys {
                        let bytes = file_system.read(key).await.map_err(|_| {
                            reason_to_failure(
                                key,
                                ConstructionReason::MissingFile(key.clone()),
                                params.dep_val.clone(),
                            )
                        })?;
                        chunks.push(bytes);
                    }
                    requester.from_chunks(params, chunks)
                })
            }
            ConstructorKind::CompilerBacked(backed) => {
                let backed = backed.clone();
                Box::pin(async move {
                    let request = CompileRequest {
                        process_type: backed.process_type().to_string(),
                        key: params.name.clone(),
                    };
                    let artifact = if let Some(existing) = compiler.existing_artifact(&request) {
                        existing
                    } else {
                        compiler.compile(request).await.map_err(|_| {
                            reason_to_failure(
                                &params.name,
                                ConstructionReason::Other("compile failed".to_string()),
                                params.dep_val.clone(),
                            )
                        })?
                    };
                    backed.from_artifact(artifact)
                })
            }
        }
    }
}

/// Per-type registration table: one [`ConstructorKind`] per
/// [`AssetTypeId`], erased behind `Any` the same way `AssetHeap`'s table
/// registry is, since the table itself can't be generic over every `T` it
/// holds entries for.
pub struct Dispatcher {
    entries: RwLock<HashMap<TypeCode, Arc<dyn std::any::Any + Send + Sync>>>,
    file_system: Arc<dyn crate::io::FileSystem>,
    compiler: Arc<dyn IntermediateCompiler>,
}

impl Dispatcher {
    /// Build a dispatcher over the given file system and compiler
    /// collaborators.
    pub fn new(file_system: Arc<dyn crate::io::FileSystem>, compiler: Arc<dyn IntermediateCompiler>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            file_system,
            compiler,
        }
    }

    /// Register `kind` as `T`'s constructor strategy, replacing any prior
    /// registration.
    pub fn register<T: AssetTypeId + Send + Sync + 'static>(&self, kind: ConstructorKind<T>) {
        self.entries.write().insert(T::type_code(), Arc::new(kind));
    }

    /// Run the registered constructor for `T` over `params`.
    pub fn dispatch<T: AssetTypeId + Send + Sync + 'static>(
        &self,
        params: ParamPack,
    ) -> Result<BoxFuture<'static, Result<T, MarkerFailure>>, DispatchError> {
        let code = T::type_code();
        let entry = self
            .entries
            .read()
            .get(&code)
            .cloned()
            .ok_or(DispatchError::NoEntry(code))?;
        let kind = entry
            .downcast::<ConstructorKind<T>>()
            .unwrap_or_else(|_| panic!("type code collision in dispatch table"));
        Ok(kind.invoke(params, self.file_system.clone(), self.compiler.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{InMemoryFileSystem, StubCompiler};

    #[derive(Debug, Clone, PartialEq)]
    struct Widget(String);

    impl AssetTypeId for Widget {
        const TYPE_NAME: &'static str = "test::dispatch::Widget";
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(InMemoryFileSystem::new()), Arc::new(StubCompiler::new()))
    }

    #[tokio::test]
    async fn direct_constructor_runs() {
        let dispatcher = dispatcher();
        dispatcher.register::<Widget>(ConstructorKind::Direct(Arc::new(|params| {
            Box::pin(async move { Ok(Widget(params.name)) })
        })));

        let registry = crate::depval::DepValRegistry::new();
        let params = ParamPack {
            name: "hello".to_string(),
            base_dir: String::new(),
            dep_val: registry.invalid_handle(),
        };
        let value = dispatcher.dispatch::<Widget>(params).unwrap().await.unwrap();
        assert_eq!(value, Widget("hello".to_string()));
    }

    struct TwoPartRequester;

    impl ChunkRequester<Widget> for TwoPartRequester {
        fn requested_chunks(&self, params: &ParamPack) -> Vec<String> {
            vec![format!("{}.head", params.name), format!("{}.tail", params.name)]
        }

        fn from_chunks(&self, params: ParamPack, chunks: Vec<Vec<u8>>) -> Result<Widget, MarkerFailure> {
            let head = String::from_utf8_lossy(&chunks[0]);
            let tail = String::from_utf8_lossy(&chunks[1]);
            Ok(Widget(format!("{}{}:{head}{tail}", params.name, params.name)))
        }
    }

    #[tokio::test]
    async fn chunked_requests_constructor_resolves_every_declared_chunk() {
        let fs = InMemoryFileSystem::new();
        fs.put("sprite.head", b"HEAD".to_vec());
        fs.put("sprite.tail", b"TAIL".to_vec());
        let dispatcher = Dispatcher::new(Arc::new(fs), Arc::new(StubCompiler::new()));
        dispatcher.register::<Widget>(ConstructorKind::ChunkedRequests(Arc::new(TwoPartRequester)));

        let registry = crate::depval::DepValRegistry::new();
        let params = ParamPack {
            name: "sprite".to_string(),
            base_dir: String::new(),
            dep_val: registry.invalid_handle(),
        };
        let value = dispatcher.dispatch::<Widget>(params).unwrap().await.unwrap();
        assert_eq!(value, Widget("spritesprite:HEADTAIL".to_string()));
    }

    #[tokio::test]
    async fn chunked_requests_constructor_reports_a_missing_chunk() {
        let fs = InMemoryFileSystem::new();
        fs.put("sprite.head", b"HEAD".to_vec());
        let dispatcher = Dispatcher::new(Arc::new(fs), Arc::new(StubCompiler::new()));
        dispatcher.register::<Widget>(ConstructorKind::ChunkedRequests(Arc::new(TwoPartRequester)));

        let registry = crate::depval::DepValRegistry::new();
        let params = ParamPack {
            name: "sprite".to_string(),
            base_dir: String::new(),
            dep_val: registry.invalid_handle(),
        };
        let err = dispatcher.dispatch::<Widget>(params).unwrap().await.unwrap_err();
        assert!(matches!(err.reason, ConstructionReason::MissingFile(ref path) if path == "sprite.tail"));
    }

    #[tokio::test]
    async fn missing_entry_reports_dispatch_error() {
        let dispatcher = dispatcher();
        let registry = crate::depval::DepValRegistry::new();
        let params = ParamPack {
            name: "x".to_string(),
            base_dir: String::new(),
            dep_val: registry.invalid_handle(),
        };
        assert!(matches!(
            dispatcher.dispatch::<Widget>(params),
            Err(DispatchError::NoEntry(_))
        ));
    }

    #[tokio::test]
    async fn text_document_constructor_reads_through_file_system() {
        let dispatcher = dispatcher();
        let fs = InMemoryFileSystem::new();
        fs.put("widget.txt", b"name = Sprocket".to_vec());
        let dispatcher = Dispatcher::new(Arc::new(fs), Arc::new(StubCompiler::new()));

        dispatcher.register::<Widget>(ConstructorKind::TextDocument(Arc::new(|_params, tokens| {
            for pair in tokens.windows(2) {
                if let (crate::io::Token::KeyedItem(key), crate::io::Token::Value(value)) = (&pair[0], &pair[1]) {
                    if key == "name" {
                        return Ok(Widget(value.clone()));
                    }
                }
            }
            Err(MarkerFailure {
                reason: ConstructionReason::FormatNotUnderstood,
                actualization_log: "no name key".to_string(),
                dep_val: crate::depval::DepValRegistry::new().invalid_handle(),
            })
        })));

        let registry = crate::depval::DepValRegistry::new();
        let params = ParamPack {
            name: "widget.txt".to_string(),
            base_dir: String::new(),
            dep_val: registry.invalid_handle(),
        };
        let value = dispatcher.dispatch::<Widget>(params).unwrap().await.unwrap();
        assert_eq!(value, Widget("Sprocket".to_string()));
    }
}
