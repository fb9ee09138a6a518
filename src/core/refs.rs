//! Typed 32-bit reference handles.
//!
//! Long-lived objects are addressed by small copyable handles rather than
//! pointers. A handle is either invalid (sentinel) or points to a live object
//! for the lifetime of the owning compiler instance.

use std::fmt;

macro_rules! define_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub const INVALID: Self = Self(u32::MAX);

            #[inline]
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            pub fn get(self) -> u32 {
                self.0
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            #[inline]
            pub fn is_invalid(self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_invalid() {
                    write!(f, concat!(stringify!($name), "(invalid)"))
                } else {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }
        }
    };
}

define_ref!(
    /// Interned identifier handle.
    IdentifierRef
);
define_ref!(
    /// Canonical type handle; equality is semantic equality for concrete types.
    TypeRef
);
define_ref!(
    /// Canonical constant handle.
    ConstantRef
);
define_ref!(
    /// Symbol handle into the symbol store.
    SymbolRef
);
define_ref!(
    /// Token index within one source view.
    TokenRef
);
define_ref!(
    /// Source view handle (one per lexed file).
    SourceViewRef
);
define_ref!(
    /// Source file handle.
    FileRef
);

/// Number of AST shards. Any power of two >= 2 works; references carry the
/// shard in their top bits.
pub const SHARD_COUNT: usize = 8;
pub const SHARD_BITS: u32 = 3;
pub const SHARD_PAYLOAD_BITS: u32 = 32 - SHARD_BITS;
pub const SHARD_PAYLOAD_MASK: u32 = (1 << SHARD_PAYLOAD_BITS) - 1;

macro_rules! define_sharded_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Raw value 0 is the reserved invalid reference: shard 0 keeps
            /// its slot 0 occupied by a placeholder.
            pub const INVALID: Self = Self(0);

            #[inline]
            pub fn pack(shard: usize, index: u32) -> Self {
                debug_assert!(shard < SHARD_COUNT);
                debug_assert!(index <= SHARD_PAYLOAD_MASK);
                Self(((shard as u32) << SHARD_PAYLOAD_BITS) | index)
            }

            #[inline]
            pub fn shard(self) -> usize {
                (self.0 >> SHARD_PAYLOAD_BITS) as usize
            }

            #[inline]
            pub fn local(self) -> usize {
                (self.0 & SHARD_PAYLOAD_MASK) as usize
            }

            #[inline]
            pub fn get(self) -> u32 {
                self.0
            }

            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != 0
            }

            #[inline]
            pub fn is_invalid(self) -> bool {
                self.0 == 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_invalid() {
                    write!(f, concat!(stringify!($name), "(invalid)"))
                } else {
                    write!(
                        f,
                        concat!(stringify!($name), "({}:{})"),
                        self.shard(),
                        self.local()
                    )
                }
            }
        }
    };
}

define_sharded_ref!(
    /// AST node handle, `(shard:3, index:29)`.
    AstNodeRef
);
define_sharded_ref!(
    /// Handle to an ordered child list in a shard's span store.
    SpanRef
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sentinels() {
        assert!(TypeRef::INVALID.is_invalid());
        assert!(TypeRef::new(0).is_valid());
        assert!(AstNodeRef::INVALID.is_invalid());
        assert_eq!(AstNodeRef::INVALID.get(), 0);
    }

    #[test]
    fn shard_packing_round_trips() {
        let r = AstNodeRef::pack(5, 1234);
        assert_eq!(r.shard(), 5);
        assert_eq!(r.local(), 1234);
        let r = SpanRef::pack(7, SHARD_PAYLOAD_MASK);
        assert_eq!(r.shard(), 7);
        assert_eq!(r.local(), SHARD_PAYLOAD_MASK as usize);
    }
}
