//! Member and type classification.

use std::fmt;

use bitflags::bitflags;

/// The kind of member a listener targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberKind {
    /// A stored field, invoked by assigning its single argument.
    Field,
    /// A property, invoked through its setter.
    Property,
    /// A method, invoked with its full parameter list.
    Method,
}

impl MemberKind {
    /// The kind a field or property falls back to when it is not found.
    ///
    /// Methods have no fallback.
    pub fn settable_fallback(self) -> Option<MemberKind> {
        match self {
            MemberKind::Field => Some(MemberKind::Property),
            MemberKind::Property => Some(MemberKind::Field),
            MemberKind::Method => None,
        }
    }

    /// Get the lowercase name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            MemberKind::Field => "field",
            MemberKind::Property => "property",
            MemberKind::Method => "method",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Modifiers of a registered member.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u8 {
        /// Member is invoked without a target object.
        const STATIC = 0x01;
        /// Member is an implicit conversion operator from its owner type.
        const IMPLICIT_CONVERSION = 0x02;
    }
}

/// How values of a type are stored and passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Built-in numeric, boolean or string type.
    Primitive,
    /// Copied by value, stored inline in a `Dynamic::Native`.
    Value,
    /// Lives in the `ObjectHeap` and is passed by handle.
    Reference,
}

impl TypeKind {
    /// Check if values of this kind are passed by handle.
    pub fn is_reference(self) -> bool {
        matches!(self, TypeKind::Reference)
    }
}
