//! Binary size inference over the resolved type graph.
//!
//! The [`SizeTracker`] answers one question: how many bytes does a value of a given type
//! occupy in the target runtime's object layout? Answers drive padding calculations and
//! layout assertions in the emitted headers, so a wrong answer is worse than no answer.
//! Whenever the metadata does not pin the size down, the tracker returns
//! [`UNKNOWN_SIZE`] rather than guessing.
//!
//! # Offset trust
//!
//! Field offsets come straight from the source metadata and already include any enclosing
//! header or parent region, so a type's size is its last declared instance field's offset
//! plus that field's size. A recorded offset of `0` is only trusted when it is the sole
//! instance field and nothing precedes it (no parent, or a zero-sized parent region);
//! otherwise several fields claiming offset `0` would make the result meaningless.
//!
//! # Concurrency
//!
//! Results are memoized in a [`DashMap`] keyed by definition, and
//! [`SizeTracker::precompute`] walks the whole registry with `rayon` so later queries
//! during planning are lock-free lookups. All inputs are immutable, so the parallel pass
//! needs no coordination beyond the memo itself.

use dashmap::DashMap;
use rayon::prelude::*;

use crate::model::{
    registry::{DefinitionKey, TypeRegistry},
    types::{Refness, ResolvedType},
    TypeIdentityRc,
};

/// Sentinel for sizes the metadata does not determine.
pub const UNKNOWN_SIZE: i32 = -1;

/// Memoizing size calculator for a fixed pointer width.
pub struct SizeTracker {
    pointer_size: i32,
    memo: DashMap<DefinitionKey, i32>,
}

impl SizeTracker {
    /// Create a tracker for the given target pointer width in bytes.
    #[must_use]
    pub fn new(pointer_size: i32) -> Self {
        SizeTracker {
            pointer_size,
            memo: DashMap::new(),
        }
    }

    /// The configured pointer width in bytes.
    #[must_use]
    pub fn pointer_size(&self) -> i32 {
        self.pointer_size
    }

    /// Compute and memoize the instance size of every registered type in parallel.
    pub fn precompute(&self, registry: &TypeRegistry) {
        let types: Vec<_> = registry.iter().cloned().collect();
        types.par_iter().for_each(|ty| {
            let _ = self.instance_size(registry, ty);
        });
    }

    /// The size a field of type `ty` occupies within its containing instance.
    ///
    /// Arrays, pointers and reference types are stored as pointers; generic parameters and
    /// generic instances have no fixed layout and report [`UNKNOWN_SIZE`], as do references
    /// that fail to resolve.
    #[must_use]
    pub fn field_size(&self, registry: &TypeRegistry, ty: &TypeIdentityRc) -> i32 {
        if ty.is_array() || ty.is_pointer() {
            return self.pointer_size;
        }
        if ty.is_generic_parameter() || ty.is_generic_instance() {
            return UNKNOWN_SIZE;
        }
        let Some(resolved) = registry.resolve(ty) else {
            return UNKNOWN_SIZE;
        };
        if resolved.refness == Refness::ReferenceType {
            return self.pointer_size;
        }
        self.instance_size(registry, &resolved)
    }

    /// The full instance size of a definition, memoized.
    ///
    /// Rules, in order: the primitive table wins; generic templates are [`UNKNOWN_SIZE`];
    /// a type with no instance fields takes its parent's size (or `0` with no parent); any
    /// field of unknown size poisons the result, as does a parent of unknown size;
    /// otherwise the last declared field's trusted offset plus that field's size.
    #[must_use]
    pub fn instance_size(&self, registry: &TypeRegistry, ty: &ResolvedType) -> i32 {
        let key = DefinitionKey::of(&ty.identity);
        if let Some(cached) = self.memo.get(&key) {
            return *cached;
        }
        let size = self.compute(registry, ty);
        self.memo.insert(key, size);
        size
    }

    fn compute(&self, registry: &TypeRegistry, ty: &ResolvedType) -> i32 {
        if let Some(primitive) = self.primitive_size(ty) {
            return primitive;
        }
        if ty.identity.is_generic_template() {
            return UNKNOWN_SIZE;
        }

        let fields: Vec<_> = ty.instance_fields().collect();
        let Some(last) = fields.last() else {
            return match &ty.parent {
                Some(parent) => self.field_parent_size(registry, parent),
                None => 0,
            };
        };

        if fields
            .iter()
            .any(|f| self.field_size(registry, &f.ty) == UNKNOWN_SIZE)
        {
            return UNKNOWN_SIZE;
        }

        // Offset 0 is only trusted when nothing precedes the fields: either no parent at
        // all, or a parent region of size 0. An unknown parent size poisons the whole type.
        let mut accept_zero_offset = true;
        if let Some(parent) = &ty.parent {
            let parent_size = self.field_parent_size(registry, parent);
            if parent_size == UNKNOWN_SIZE {
                return UNKNOWN_SIZE;
            }
            accept_zero_offset = parent_size == 0;
        }

        // The last declared instance field closes the layout.
        if last.offset > 0 {
            let size = self.field_size(registry, &last.ty);
            if size <= 0 {
                return UNKNOWN_SIZE;
            }
            return last.offset + size;
        }
        if accept_zero_offset && fields.len() == 1 && last.offset == 0 {
            return self.field_size(registry, &last.ty);
        }
        UNKNOWN_SIZE
    }

    /// Size contributed by a parent reference when the type adds no fields of its own.
    fn field_parent_size(&self, registry: &TypeRegistry, parent: &TypeIdentityRc) -> i32 {
        match registry.resolve(parent) {
            Some(resolved) => self.instance_size(registry, &resolved),
            None => UNKNOWN_SIZE,
        }
    }

    /// Fixed sizes of the runtime's primitive types, by full name.
    fn primitive_size(&self, ty: &ResolvedType) -> Option<i32> {
        if ty.identity.namespace != "System" {
            return None;
        }
        match ty.identity.name.as_str() {
            "Byte" | "SByte" | "Boolean" => Some(1),
            "Char" | "Int16" | "UInt16" => Some(2),
            "Int32" | "UInt32" | "Single" => Some(4),
            "Int64" | "UInt64" | "Double" => Some(8),
            "IntPtr" | "UIntPtr" => Some(self.pointer_size),
            "Object" => Some(2 * self.pointer_size),
            "ValueType" => Some(0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{builder::TypeBuilder, identity::TypeIdentity, TypeRegistry};

    fn registry_with_primitives() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        for name in ["Object", "ValueType", "Int32", "Int64", "Byte", "Boolean"] {
            let identity = TypeIdentity::plain("System", name);
            let built = if name == "Object" {
                TypeBuilder::class(identity).build()
            } else {
                TypeBuilder::value_type(identity).build()
            };
            registry.insert(built).unwrap();
        }
        registry
    }

    #[test]
    fn test_primitive_table() {
        let registry = registry_with_primitives();
        let tracker = SizeTracker::new(8);
        let int32 = registry
            .resolve(&TypeIdentity::plain("System", "Int32"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &int32), 4);
        let object = registry
            .resolve(&TypeIdentity::plain("System", "Object"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &object), 16);
        let value_type = registry
            .resolve(&TypeIdentity::plain("System", "ValueType"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &value_type), 0);
    }

    #[test]
    fn test_last_offset_plus_field_size() {
        let mut registry = registry_with_primitives();
        let int32 = TypeIdentity::plain("System", "Int32");
        registry
            .insert(
                TypeBuilder::value_type(TypeIdentity::plain("Game", "Foo"))
                    .parent(TypeIdentity::plain("System", "ValueType"))
                    .field("value", int32, 0x8)
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let foo = registry
            .resolve(&TypeIdentity::plain("Game", "Foo"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &foo), 12);
    }

    #[test]
    fn test_single_field_at_zero_is_trusted() {
        let mut registry = registry_with_primitives();
        registry
            .insert(
                TypeBuilder::value_type(TypeIdentity::plain("Game", "Wrapper"))
                    .field("value", TypeIdentity::plain("System", "Int64"), 0)
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let wrapper = registry
            .resolve(&TypeIdentity::plain("Game", "Wrapper"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &wrapper), 8);
    }

    #[test]
    fn test_multiple_fields_at_zero_are_unknown() {
        let mut registry = registry_with_primitives();
        registry
            .insert(
                TypeBuilder::value_type(TypeIdentity::plain("Game", "Pair"))
                    .field("a", TypeIdentity::plain("System", "Int32"), 0)
                    .field("b", TypeIdentity::plain("System", "Int32"), 0)
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let pair = registry
            .resolve(&TypeIdentity::plain("Game", "Pair"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &pair), UNKNOWN_SIZE);
    }

    #[test]
    fn test_unknown_parent_size_poisons_fields() {
        let mut registry = registry_with_primitives();
        registry
            .insert(
                TypeBuilder::value_type(TypeIdentity::plain("Game", "Child"))
                    .parent(TypeIdentity::plain("Missing", "Parent"))
                    .field("value", TypeIdentity::plain("System", "Int32"), 0x8)
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let child = registry
            .resolve(&TypeIdentity::plain("Game", "Child"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &child), UNKNOWN_SIZE);
    }

    #[test]
    fn test_zero_offset_not_trusted_under_sized_parent() {
        let mut registry = registry_with_primitives();
        // System.Object occupies 16 bytes, so a field claiming offset 0 cannot be right.
        registry
            .insert(
                TypeBuilder::value_type(TypeIdentity::plain("Game", "Shadow"))
                    .parent(TypeIdentity::plain("System", "Object"))
                    .field("value", TypeIdentity::plain("System", "Int32"), 0)
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let shadow = registry
            .resolve(&TypeIdentity::plain("Game", "Shadow"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &shadow), UNKNOWN_SIZE);
    }

    #[test]
    fn test_last_declared_field_decides() {
        let mut registry = registry_with_primitives();
        // The last declared field has no recorded offset, so no earlier field can stand in
        // for it.
        registry
            .insert(
                TypeBuilder::value_type(TypeIdentity::plain("Game", "Ragged"))
                    .field("known", TypeIdentity::plain("System", "Int32"), 0x8)
                    .field("unplaced", TypeIdentity::plain("System", "Int32"), -1)
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let ragged = registry
            .resolve(&TypeIdentity::plain("Game", "Ragged"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &ragged), UNKNOWN_SIZE);
    }

    #[test]
    fn test_reference_fields_are_pointer_sized() {
        let mut registry = registry_with_primitives();
        // A and B hold each other by reference; the cycle must not recurse.
        registry
            .insert(
                TypeBuilder::class(TypeIdentity::plain("Game", "A"))
                    .field("other", TypeIdentity::plain("Game", "B"), 0x10)
                    .build(),
            )
            .unwrap();
        registry
            .insert(
                TypeBuilder::class(TypeIdentity::plain("Game", "B"))
                    .field("other", TypeIdentity::plain("Game", "A"), 0x10)
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let a = registry.resolve(&TypeIdentity::plain("Game", "A")).unwrap();
        let b = registry.resolve(&TypeIdentity::plain("Game", "B")).unwrap();
        assert_eq!(tracker.instance_size(&registry, &a), 0x18);
        assert_eq!(tracker.instance_size(&registry, &b), 0x18);
    }

    #[test]
    fn test_unknown_field_poisons_size() {
        let mut registry = registry_with_primitives();
        registry
            .insert(
                TypeBuilder::value_type(TypeIdentity::plain("Game", "Holder"))
                    .field("missing", TypeIdentity::plain("Game", "Nowhere"), 0x8)
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let holder = registry
            .resolve(&TypeIdentity::plain("Game", "Holder"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &holder), UNKNOWN_SIZE);
    }

    #[test]
    fn test_parent_only_types_take_parent_size() {
        let mut registry = registry_with_primitives();
        registry
            .insert(
                TypeBuilder::class(TypeIdentity::plain("Game", "Marker"))
                    .parent(TypeIdentity::plain("System", "Object"))
                    .build(),
            )
            .unwrap();
        let tracker = SizeTracker::new(8);
        let marker = registry
            .resolve(&TypeIdentity::plain("Game", "Marker"))
            .unwrap();
        assert_eq!(tracker.instance_size(&registry, &marker), 16);
    }

    #[test]
    fn test_shapes_and_generics() {
        let registry = registry_with_primitives();
        let tracker = SizeTracker::new(8);
        let int32 = TypeIdentity::plain("System", "Int32");
        assert_eq!(tracker.field_size(&registry, &TypeIdentity::array_of(int32.clone())), 8);
        assert_eq!(tracker.field_size(&registry, &TypeIdentity::pointer_to(int32.clone())), 8);
        assert_eq!(
            tracker.field_size(&registry, &TypeIdentity::generic_parameter("T", None)),
            UNKNOWN_SIZE
        );
        assert_eq!(tracker.field_size(&registry, &int32), 4);
    }

    #[test]
    fn test_precompute_is_idempotent() {
        let registry = registry_with_primitives();
        let tracker = SizeTracker::new(8);
        tracker.precompute(&registry);
        let int32 = registry
            .resolve(&TypeIdentity::plain("System", "Int32"))
            .unwrap();
        let first = tracker.instance_size(&registry, &int32);
        tracker.precompute(&registry);
        assert_eq!(tracker.instance_size(&registry, &int32), first);
    }
}
