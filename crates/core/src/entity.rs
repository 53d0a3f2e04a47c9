//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Entities reference each other by id only; there are no back-pointers to keep
/// in sync.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
