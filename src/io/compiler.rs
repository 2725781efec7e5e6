//! Intermediate-compiler boundary
//!
//! Some asset types declare a compile-process type rather than building
//! directly from source: the resolver asks for an existing artifact first
//! (sync fast path), and if none exists, obtains a future and waits on it.
//! [`IntermediateCompiler`] is the trait that boundary is expressed through;
//! a real deployment's compiler runs out-of-process and is outside this
//! crate's scope, so only an in-process stub is provided here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::depval::DependencyValidation;
use crate::error::AssetResult;

/// A finished compile artifact: opaque bytes plus the dependency-validation
/// handle the compiler attached to them.
#[derive(Clone)]
pub struct CompileArtifact {
    /// Raw artifact bytes, interpreted by the constructor that requested it.
    pub bytes: Arc<Vec<u8>>,
    /// Dependency validation covering everything the compile step read.
    pub dep_val: DependencyValidation,
}

/// Identifies one compile process invocation: a process type name plus an
/// opaque initializer key (e.g. a source path or content hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompileRequest {
    /// Name of the compile process type (e.g. `"shader"`, `"mesh-bake"`).
    pub process_type: String,
    /// Initializer key identifying what to compile.
    pub key: String,
}

/// Out-of-band artifact production, keyed by (compile-process-type,
/// initializer pack).
#[async_trait]
pub trait IntermediateCompiler: Send + Sync {
    /// Return an already-produced artifact for `request`, if one exists,
    /// without starting a new compile.
    fn existing_artifact(&self, request: &CompileRequest) -> Option<CompileArtifact>;

    /// Compile `request`, producing a fresh artifact. Implementations may
    /// take arbitrarily long; callers wait on this through the continuation
    /// engine rather than blocking a worker thread.
    async fn compile(&self, request: CompileRequest) -> AssetResult<CompileArtifact>;
}

/// An in-process stub suitable for tests: `compile` runs a caller-supplied
/// closure synchronously and caches the result for subsequent
/// `existing_artifact` calls.
#[derive(Default)]
pub struct StubCompiler {
    cache: RwLock<HashMap<CompileRequest, CompileArtifact>>,
}

impl StubCompiler {
    /// Build an empty stub compiler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the cache, as if a compile had already run.
    pub fn seed(&self, request: CompileRequest, artifact: CompileArtifact) {
        self.cache.write().insert(request, artifact);
    }
}

#[async_trait]
impl IntermediateCompiler for StubCompiler {
    fn existing_artifact(&self, request: &CompileRequest) -> Option<CompileArtifact> {
        self.cache.read().get(request).cloned()
    }

    async fn compile(&self, request: CompileRequest) -> AssetResult<CompileArtifact> {
        if let Some(existing) = self.existing_artifact(&request) {
            return Ok(existing);
        }
        let artifact = CompileArtifact {
            bytes: Arc::new(request.key.clone().into_bytes()),
            dep_val: crate::depval::DepValRegistry::new().invalid_handle(),
        };
        self.cache.write().insert(request, artifact.clone());
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn compile_caches_result_for_existing_artifact() {
        let compiler = StubCompiler::new();
        let request = CompileRequest {
            process_type: "shader".to_string(),
            key: "toon.hlsl".to_string(),
        };
        assert!(compiler.existing_artifact(&request).is_none());

        let artifact = compiler.compile(request.clone()).await.unwrap();
        let cached = compiler.existing_artifact(&request).unwrap();
        assert_eq!(*cached.bytes, *artifact.bytes);
    }
}
