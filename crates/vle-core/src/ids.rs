use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::num::NonZeroU32;

/// Arena handle tagged with the kind of object it refers to.
///
/// Stored as index+1 in a `NonZeroU32`, so `Option<Id<K>>` costs nothing
/// extra. Handles of different kinds do not mix: a `VariableId` cannot index
/// the model table.
pub struct Id<K> {
    raw: NonZeroU32,
    kind: PhantomData<fn() -> K>,
}

/// Tag of variable handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {}

/// Tag of model handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {}

pub type VariableId = Id<VariableKind>;
pub type ModelId = Id<ModelKind>;

impl<K> Id<K> {
    pub fn from_index(index: u32) -> Self {
        Self {
            raw: NonZeroU32::MIN.saturating_add(index),
            kind: PhantomData,
        }
    }

    pub fn index(self) -> u32 {
        self.raw.get() - 1
    }

    /// Position in the owning arena.
    pub fn slot(self) -> usize {
        self.index() as usize
    }
}

// Manual impls keep `K` unbounded.
impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Id<K> {}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K> Eq for Id<K> {}

impl<K> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<K> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index())
    }
}

impl<K> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}
