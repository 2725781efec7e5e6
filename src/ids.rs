//! Identifier and type-registration conventions shared across the crate
//!
//! Follows a newtype-over-integer identifier convention, and adds the
//! per-asset-type registration the heap needs to shard its table registry
//! without hashing language runtime type info at lookup time.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;

/// 64-bit key identifying a single asset within one type's table.
///
/// Sorted order of `IdentifierCode` is whatever order the caller's hash
/// function produces; the heap only requires that it be stable for a given
/// logical key (same file path, same parameter pack) across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentifierCode(pub u64);

impl IdentifierCode {
    /// Hash an arbitrary, `Hash`-implementing parameter pack into a code.
    pub fn from_hashable<T: Hash>(value: &T) -> Self {
        let mut hasher = blake3_hasher();
        value.hash(&mut hasher);
        IdentifierCode(hasher.finish())
    }

    /// Build a code directly from pre-hashed bytes (e.g. a blake3 digest).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let hash = blake3::hash(bytes);
        let b = hash.as_bytes();
        IdentifierCode(u64::from_le_bytes(b[0..8].try_into().unwrap()))
    }
}

impl std::fmt::Display for IdentifierCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn blake3_hasher() -> Blake3StdHasher {
    Blake3StdHasher::default()
}

/// Adapts `blake3` to the `std::hash::Hasher` interface so existing
/// `Hash`-deriving parameter structs can be fed straight into
/// [`IdentifierCode::from_hashable`] without a manual byte-buffer dance.
#[derive(Default)]
struct Blake3StdHasher {
    buf: Vec<u8>,
}

impl Hasher for Blake3StdHasher {
    fn finish(&self) -> u64 {
        let hash = blake3::hash(&self.buf);
        let b = hash.as_bytes();
        u64::from_le_bytes(b[0..8].try_into().unwrap())
    }

    fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// A 64-bit identifier for an asset *type*, used to shard the heap's table
/// registry without hashing a language runtime type at lookup time: every
/// asset type registers an explicit constant name once, which is hashed and
/// cached the first time it is needed.
///
/// # Example
/// ```
/// use assetry::ids::AssetTypeId;
///
/// struct Material;
/// impl AssetTypeId for Material {
///     const TYPE_NAME: &'static str = "Material";
/// }
///
/// assert_eq!(Material::type_code(), Material::type_code());
/// ```
pub trait AssetTypeId {
    /// Stable, globally-unique name for this asset type. Changing this
    /// string changes the type's shard and therefore invalidates any
    /// persisted table layout (there is none today, but keep it stable).
    const TYPE_NAME: &'static str;

    /// The cached 64-bit code for this type, computed once per process.
    fn type_code() -> TypeCode {
        type_code_for(Self::TYPE_NAME)
    }
}

/// The hashed form of an [`AssetTypeId::TYPE_NAME`], used directly as a
/// `DashMap` key by [`crate::heap::AssetHeap`]'s type-to-table registry
/// rather than as an index into a flat shard array — see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeCode(pub u64);

fn type_code_for(name: &'static str) -> TypeCode {
    static CACHE: OnceCell<dashmap::DashMap<&'static str, u64>> = OnceCell::new();
    let cache = CACHE.get_or_init(dashmap::DashMap::new);
    if let Some(existing) = cache.get(name) {
        return TypeCode(*existing);
    }
    let hash = blake3::hash(name.as_bytes());
    let b = hash.as_bytes();
    let code = u64::from_le_bytes(b[0..8].try_into().unwrap());
    cache.insert(name, code);
    TypeCode(code)
}

/// Monotonically increasing id vended by [`crate::heap::AssetHeap::visibility_barrier`]
/// and by the dependency-validation registry's global change counter.
pub type MonotonicId = u64;

/// A process-wide monotonic counter, shared by the heap's visibility barrier
/// and the dep-val registry's global change index.
#[derive(Debug, Default)]
pub struct MonotonicCounter(AtomicU64);

impl MonotonicCounter {
    /// Start the counter at zero.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Atomically advance and return the new value.
    pub fn advance(&self) -> MonotonicId {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Read the current value without advancing it.
    pub fn current(&self) -> MonotonicId {
        self.0.load(Ordering::SeqCst)
    }
}
