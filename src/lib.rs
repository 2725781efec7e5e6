//! # assetry
//!
//! A deferred-construction asset cache with dependency-aware invalidation,
//! built for interactive applications that need to request an asset by key,
//! get back an immediately-usable handle, and have its eventual construction
//! happen off the calling thread.
//!
//! ## Architecture
//!
//! - [`ids`]: identifier and type-registration conventions (`IdentifierCode`,
//!   `AssetTypeId`, `TypeCode`).
//! - [`error`]: the crate-wide `AssetError` taxonomy.
//! - [`marker`]: `Marker<T>`, the tri-state deferred handle every cached
//!   asset is stored as.
//! - [`heap`]: `AssetHeap`, the typed, sharded, concurrent asset store.
//! - [`depval`]: the dependency-validation graph backing invalidation.
//! - [`continuation`]: the multi-future continuation engine (`WhenAll2`,
//!   `PollToPromise`) and its owning executor.
//! - [`compound`]: compound-asset scaffold parsing and inheritance-tree
//!   resolution.
//! - [`dispatch`]: auto-construct dispatch across constructor kinds.
//! - [`io`]: external collaborators (file system, text tokenizer,
//!   intermediate compiler) the rest of the crate is built against as traits.
//! - [`operation_context`]: aggregate in-flight-operation progress tracking.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compound;
pub mod continuation;
pub mod depval;
pub mod dispatch;
pub mod error;
pub mod heap;
pub mod ids;
pub mod io;
pub mod marker;
pub mod operation_context;

pub use error::{AssetError, AssetResult};
pub use heap::AssetHeap;
pub use ids::{AssetTypeId, IdentifierCode, TypeCode};
pub use marker::Marker;
pub use operation_context::OperationContext;

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, as declared in `Cargo.toml`.
pub const NAME: &str = env!("CARGO_PKG_NAME");
