//! Type values and the canonical type pool.
//!
//! `TypeRef` equality is semantic equality for concrete types: the pool
//! deduplicates by structural hash, so two equal `TypeInfo` values always
//! collapse to one reference. Numeric promotion is precomputed into an
//! N x N table over the closed set of concrete scalar numerics.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::core::{IdentifierRef, SymbolRef, TypeRef};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Sign {
    Signed,
    Unsigned,
    /// Decimal literals start with an unknown sign; concretization decides.
    Unknown,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PointerKind {
    Value,
    Block,
    Slice,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefKind {
    LValue,
    RValue,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AggregateKind {
    Struct,
    Union,
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeInfo {
    Void,
    Bool,
    String,
    Char,
    /// `bits == 0` marks an unsized literal integer.
    Int { bits: u8, sign: Sign },
    /// `bits == 0` marks an unsized literal float.
    Float { bits: u8 },
    Enum {
        sym: SymbolRef,
        underlying: TypeRef,
    },
    Alias {
        sym: SymbolRef,
        target: TypeRef,
    },
    Pointer {
        kind: PointerKind,
        elem: TypeRef,
    },
    Reference {
        kind: RefKind,
        elem: TypeRef,
    },
    Array {
        dim: u32,
        elem: TypeRef,
    },
    Aggregate {
        kind: AggregateKind,
        sym: SymbolRef,
        members: Box<[(IdentifierRef, TypeRef)]>,
    },
    Lambda {
        params: Box<[TypeRef]>,
        ret: TypeRef,
        variadic: bool,
    },
    /// A type used as a value (the result of a type expression).
    TypeValue { wraps: TypeRef },
    Variadic,
}

impl TypeInfo {
    pub fn is_int(&self) -> bool {
        matches!(self, TypeInfo::Int { .. })
    }

    pub fn is_int_unsized(&self) -> bool {
        matches!(self, TypeInfo::Int { bits: 0, .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, TypeInfo::Float { .. })
    }

    pub fn is_float_unsized(&self) -> bool {
        matches!(self, TypeInfo::Float { bits: 0 })
    }

    pub fn is_unsized(&self) -> bool {
        self.is_int_unsized() || self.is_float_unsized()
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, TypeInfo::Bool)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, TypeInfo::String)
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, TypeInfo::Enum { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeInfo::Pointer { .. })
    }

    pub fn is_scalar_numeric(&self) -> bool {
        self.is_int() || self.is_float()
    }

    pub fn is_type_value(&self) -> bool {
        matches!(self, TypeInfo::TypeValue { .. })
    }

    pub fn int_bits(&self) -> u8 {
        match self {
            TypeInfo::Int { bits, .. } => *bits,
            _ => 0,
        }
    }

    pub fn int_sign(&self) -> Sign {
        match self {
            TypeInfo::Int { sign, .. } => *sign,
            _ => Sign::Unknown,
        }
    }

    pub fn float_bits(&self) -> u8 {
        match self {
            TypeInfo::Float { bits } => *bits,
            _ => 0,
        }
    }

    /// Byte size of a concrete type, for the `@sizeof` intrinsic.
    pub fn byte_size(&self, pool: &TypePool) -> Option<u64> {
        match self {
            TypeInfo::Void => Some(0),
            TypeInfo::Bool => Some(1),
            TypeInfo::Char => Some(4),
            TypeInfo::String => Some(16),
            TypeInfo::Int { bits, .. } if *bits != 0 => Some(*bits as u64 / 8),
            TypeInfo::Float { bits } if *bits != 0 => Some(*bits as u64 / 8),
            TypeInfo::Enum { underlying, .. } => pool.get(*underlying).byte_size(pool),
            TypeInfo::Alias { target, .. } => pool.get(*target).byte_size(pool),
            TypeInfo::Pointer { .. } | TypeInfo::Lambda { .. } => Some(8),
            TypeInfo::Reference { .. } => Some(8),
            TypeInfo::Array { dim, elem } => {
                pool.get(*elem).byte_size(pool).map(|s| s * *dim as u64)
            }
            TypeInfo::Aggregate { kind, members, .. } => {
                let mut total = 0u64;
                for (_, m) in members.iter() {
                    let s = pool.get(*m).byte_size(pool)?;
                    match kind {
                        AggregateKind::Struct => total += s,
                        AggregateKind::Union => total = total.max(s),
                    }
                }
                Some(total)
            }
            _ => None,
        }
    }

    /// Strips aliases down to the target type.
    pub fn unalias(pool: &TypePool, type_ref: TypeRef) -> TypeRef {
        let mut cur = type_ref;
        loop {
            match pool.get(cur) {
                TypeInfo::Alias { target, .. } => cur = target,
                _ => return cur,
            }
        }
    }
}

/// Index of a concrete numeric in the promotion table.
fn numeric_index(info: &TypeInfo) -> Option<usize> {
    match info {
        TypeInfo::Int { bits: 8, sign: Sign::Signed } => Some(0),
        TypeInfo::Int { bits: 16, sign: Sign::Signed } => Some(1),
        TypeInfo::Int { bits: 32, sign: Sign::Signed } => Some(2),
        TypeInfo::Int { bits: 64, sign: Sign::Signed } => Some(3),
        TypeInfo::Int { bits: 8, sign: Sign::Unsigned } => Some(4),
        TypeInfo::Int { bits: 16, sign: Sign::Unsigned } => Some(5),
        TypeInfo::Int { bits: 32, sign: Sign::Unsigned } => Some(6),
        TypeInfo::Int { bits: 64, sign: Sign::Unsigned } => Some(7),
        TypeInfo::Float { bits: 32 } => Some(8),
        TypeInfo::Float { bits: 64 } => Some(9),
        _ => None,
    }
}

const NUMERIC_COUNT: usize = 10;

fn numeric_info(index: usize) -> TypeInfo {
    match index {
        0 => TypeInfo::Int { bits: 8, sign: Sign::Signed },
        1 => TypeInfo::Int { bits: 16, sign: Sign::Signed },
        2 => TypeInfo::Int { bits: 32, sign: Sign::Signed },
        3 => TypeInfo::Int { bits: 64, sign: Sign::Signed },
        4 => TypeInfo::Int { bits: 8, sign: Sign::Unsigned },
        5 => TypeInfo::Int { bits: 16, sign: Sign::Unsigned },
        6 => TypeInfo::Int { bits: 32, sign: Sign::Unsigned },
        7 => TypeInfo::Int { bits: 64, sign: Sign::Unsigned },
        8 => TypeInfo::Float { bits: 32 },
        9 => TypeInfo::Float { bits: 64 },
        _ => unreachable!(),
    }
}

// Table rules: floats dominate ints, wider dominates narrower, same width
// same signedness wins, mixed signedness promotes to the next wider signed
// type or fails when none exists.
fn compute_promotion(a: &TypeInfo, b: &TypeInfo) -> Option<TypeInfo> {
    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (TypeInfo::Float { bits: fa }, TypeInfo::Float { bits: fb }) => {
            Some(TypeInfo::Float { bits: (*fa).max(*fb) })
        }
        (TypeInfo::Float { bits }, TypeInfo::Int { .. })
        | (TypeInfo::Int { .. }, TypeInfo::Float { bits }) => Some(TypeInfo::Float { bits: *bits }),
        (
            TypeInfo::Int { bits: ba, sign: sa },
            TypeInfo::Int { bits: bb, sign: sb },
        ) => {
            if sa == sb {
                return Some(TypeInfo::Int {
                    bits: (*ba).max(*bb),
                    sign: *sa,
                });
            }
            // Mixed signedness: if the signed side is strictly wider it can
            // represent the unsigned side; otherwise go one step wider.
            let (signed_bits, unsigned_bits) = if *sa == Sign::Signed {
                (*ba, *bb)
            } else {
                (*bb, *ba)
            };
            if signed_bits > unsigned_bits {
                return Some(TypeInfo::Int {
                    bits: signed_bits,
                    sign: Sign::Signed,
                });
            }
            let wider = unsigned_bits.checked_mul(2).filter(|b| *b <= 64)?;
            Some(TypeInfo::Int {
                bits: wider,
                sign: Sign::Signed,
            })
        }
        _ => None,
    }
}

struct PoolInner {
    map: FxHashMap<TypeInfo, TypeRef>,
    items: Vec<TypeInfo>,
}

/// Deduplicating type pool with predefined references and the promotion
/// table.
pub struct TypePool {
    inner: RwLock<PoolInner>,
    promote_table: Vec<Option<TypeRef>>,

    ty_void: TypeRef,
    ty_bool: TypeRef,
    ty_string: TypeRef,
    ty_char: TypeRef,
    ty_int: [TypeRef; 8],
    ty_f32: TypeRef,
    ty_f64: TypeRef,
    ty_int_unsized_signed: TypeRef,
    ty_int_unsized_unsigned: TypeRef,
    ty_int_unsized_unknown: TypeRef,
    ty_float_unsized: TypeRef,
}

impl TypePool {
    pub fn new() -> Self {
        let mut inner = PoolInner {
            map: FxHashMap::default(),
            items: Vec::new(),
        };
        let mut add = |info: TypeInfo| -> TypeRef {
            let r = TypeRef::new(inner.items.len() as u32);
            inner.map.insert(info.clone(), r);
            inner.items.push(info);
            r
        };

        let ty_void = add(TypeInfo::Void);
        let ty_bool = add(TypeInfo::Bool);
        let ty_string = add(TypeInfo::String);
        let ty_char = add(TypeInfo::Char);
        let mut ty_int = [TypeRef::INVALID; 8];
        for i in 0..8 {
            ty_int[i] = add(numeric_info(i));
        }
        let ty_f32 = add(TypeInfo::Float { bits: 32 });
        let ty_f64 = add(TypeInfo::Float { bits: 64 });
        let ty_int_unsized_signed = add(TypeInfo::Int { bits: 0, sign: Sign::Signed });
        let ty_int_unsized_unsigned = add(TypeInfo::Int { bits: 0, sign: Sign::Unsigned });
        let ty_int_unsized_unknown = add(TypeInfo::Int { bits: 0, sign: Sign::Unknown });
        let ty_float_unsized = add(TypeInfo::Float { bits: 0 });

        // Precompute the promotion table.
        let mut promote_table = vec![None; NUMERIC_COUNT * NUMERIC_COUNT];
        for a in 0..NUMERIC_COUNT {
            for b in 0..NUMERIC_COUNT {
                if let Some(info) = compute_promotion(&numeric_info(a), &numeric_info(b)) {
                    let r = inner.map.get(&info).copied().unwrap_or_else(|| {
                        let r = TypeRef::new(inner.items.len() as u32);
                        inner.map.insert(info.clone(), r);
                        inner.items.push(info);
                        r
                    });
                    promote_table[a * NUMERIC_COUNT + b] = Some(r);
                }
            }
        }

        Self {
            inner: RwLock::new(inner),
            promote_table,
            ty_void,
            ty_bool,
            ty_string,
            ty_char,
            ty_int,
            ty_f32,
            ty_f64,
            ty_int_unsized_signed,
            ty_int_unsized_unsigned,
            ty_int_unsized_unknown,
            ty_float_unsized,
        }
    }

    /// Canonicalizes a type. Equal inputs yield equal references; the
    /// double-checked lookup collapses insertion races.
    pub fn add(&self, info: TypeInfo) -> TypeRef {
        if let Some(r) = self.inner.read().map.get(&info) {
            return *r;
        }
        let mut inner = self.inner.write();
        if let Some(r) = inner.map.get(&info) {
            return *r;
        }
        let r = TypeRef::new(inner.items.len() as u32);
        inner.map.insert(info.clone(), r);
        inner.items.push(info);
        r
    }

    pub fn get(&self, type_ref: TypeRef) -> TypeInfo {
        self.inner.read().items[type_ref.index()].clone()
    }

    pub fn ty_void(&self) -> TypeRef {
        self.ty_void
    }

    pub fn ty_bool(&self) -> TypeRef {
        self.ty_bool
    }

    pub fn ty_string(&self) -> TypeRef {
        self.ty_string
    }

    pub fn ty_char(&self) -> TypeRef {
        self.ty_char
    }

    pub fn ty_int(&self, bits: u8, sign: Sign) -> TypeRef {
        match sign {
            Sign::Signed => match bits {
                8 => self.ty_int[0],
                16 => self.ty_int[1],
                32 => self.ty_int[2],
                _ => self.ty_int[3],
            },
            _ => match bits {
                8 => self.ty_int[4],
                16 => self.ty_int[5],
                32 => self.ty_int[6],
                _ => self.ty_int[7],
            },
        }
    }

    pub fn ty_float(&self, bits: u8) -> TypeRef {
        if bits == 32 {
            self.ty_f32
        } else {
            self.ty_f64
        }
    }

    pub fn ty_int_unsized(&self, sign: Sign) -> TypeRef {
        match sign {
            Sign::Signed => self.ty_int_unsized_signed,
            Sign::Unsigned => self.ty_int_unsized_unsigned,
            Sign::Unknown => self.ty_int_unsized_unknown,
        }
    }

    pub fn ty_float_unsized(&self) -> TypeRef {
        self.ty_float_unsized
    }

    /// Common type of two numeric operands. Returns `None` when no valid
    /// promotion exists (including non-numeric inputs).
    pub fn promote(&self, lhs: TypeRef, rhs: TypeRef) -> Option<TypeRef> {
        if lhs == rhs {
            return Some(lhs);
        }
        let a = self.get(TypeInfo::unalias(self, lhs));
        let b = self.get(TypeInfo::unalias(self, rhs));

        // Unsized literals adopt the other side.
        match (a.is_unsized(), b.is_unsized()) {
            (true, false) => {
                if (a.is_float() || a.is_int()) && b.is_scalar_numeric() {
                    // int literal with float operand promotes to the float
                    if a.is_float() && b.is_int() {
                        return Some(self.ty_f32);
                    }
                    return Some(TypeInfo::unalias(self, rhs));
                }
                return None;
            }
            (false, true) => {
                if (b.is_float() || b.is_int()) && a.is_scalar_numeric() {
                    if b.is_float() && a.is_int() {
                        return Some(self.ty_f32);
                    }
                    return Some(TypeInfo::unalias(self, lhs));
                }
                return None;
            }
            (true, true) => {
                // Two literals: float dominates, otherwise merge signs.
                if a.is_float() || b.is_float() {
                    return Some(self.ty_float_unsized);
                }
                let sign = match (a.int_sign(), b.int_sign()) {
                    (Sign::Signed, _) | (_, Sign::Signed) => Sign::Signed,
                    (Sign::Unsigned, Sign::Unsigned) => Sign::Unsigned,
                    _ => Sign::Unknown,
                };
                return Some(self.ty_int_unsized(sign));
            }
            (false, false) => {}
        }

        let ia = numeric_index(&a)?;
        let ib = numeric_index(&b)?;
        self.promote_table[ia * NUMERIC_COUNT + ib]
    }

    /// Display name used in diagnostics.
    pub fn name(&self, type_ref: TypeRef) -> String {
        if type_ref.is_invalid() {
            return "<invalid>".to_string();
        }
        match self.get(type_ref) {
            TypeInfo::Void => "void".into(),
            TypeInfo::Bool => "bool".into(),
            TypeInfo::String => "string".into(),
            TypeInfo::Char => "char".into(),
            TypeInfo::Int { bits: 0, .. } => "untyped int".into(),
            TypeInfo::Int { bits, sign } => match sign {
                Sign::Unsigned => format!("u{}", bits),
                _ => format!("s{}", bits),
            },
            TypeInfo::Float { bits: 0 } => "untyped float".into(),
            TypeInfo::Float { bits } => format!("f{}", bits),
            TypeInfo::Enum { underlying, .. } => format!("enum({})", self.name(underlying)),
            TypeInfo::Alias { target, .. } => self.name(target),
            TypeInfo::Pointer { elem, .. } => format!("*{}", self.name(elem)),
            TypeInfo::Reference { elem, .. } => format!("&{}", self.name(elem)),
            TypeInfo::Array { dim, elem } => format!("[{}]{}", dim, self.name(elem)),
            TypeInfo::Aggregate { kind, members, .. } => {
                let inner: Vec<String> =
                    members.iter().map(|(_, t)| self.name(*t)).collect();
                match kind {
                    AggregateKind::Struct => format!("struct{{{}}}", inner.join(", ")),
                    AggregateKind::Union => format!("union{{{}}}", inner.join(", ")),
                }
            }
            TypeInfo::Lambda { params, ret, .. } => {
                let inner: Vec<String> = params.iter().map(|t| self.name(*t)).collect();
                format!("func({}) -> {}", inner.join(", "), self.name(ret))
            }
            TypeInfo::TypeValue { wraps } => format!("type({})", self.name(wraps)),
            TypeInfo::Variadic => "...".into(),
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let pool = TypePool::new();
        let a = pool.add(TypeInfo::Int { bits: 32, sign: Sign::Signed });
        let b = pool.add(TypeInfo::Int { bits: 32, sign: Sign::Signed });
        assert_eq!(a, b);
        assert_eq!(a, pool.ty_int(32, Sign::Signed));
    }

    #[test]
    fn promote_is_symmetric() {
        let pool = TypePool::new();
        let all = [
            pool.ty_int(8, Sign::Signed),
            pool.ty_int(16, Sign::Signed),
            pool.ty_int(32, Sign::Signed),
            pool.ty_int(64, Sign::Signed),
            pool.ty_int(8, Sign::Unsigned),
            pool.ty_int(16, Sign::Unsigned),
            pool.ty_int(32, Sign::Unsigned),
            pool.ty_int(64, Sign::Unsigned),
            pool.ty_float(32),
            pool.ty_float(64),
        ];
        for &a in &all {
            for &b in &all {
                assert_eq!(pool.promote(a, b), pool.promote(b, a));
            }
        }
    }

    #[test]
    fn promotion_rules() {
        let pool = TypePool::new();
        let s8 = pool.ty_int(8, Sign::Signed);
        let s16 = pool.ty_int(16, Sign::Signed);
        let s32 = pool.ty_int(32, Sign::Signed);
        let s64 = pool.ty_int(64, Sign::Signed);
        let u8_ = pool.ty_int(8, Sign::Unsigned);
        let u32_ = pool.ty_int(32, Sign::Unsigned);
        let u64_ = pool.ty_int(64, Sign::Unsigned);
        let f32_ = pool.ty_float(32);
        let f64_ = pool.ty_float(64);

        // Same type.
        assert_eq!(pool.promote(s32, s32), Some(s32));
        // Wider dominates.
        assert_eq!(pool.promote(s8, s32), Some(s32));
        // Floats dominate ints.
        assert_eq!(pool.promote(s64, f32_), Some(f32_));
        assert_eq!(pool.promote(f32_, f64_), Some(f64_));
        // Mixed signedness widens to signed.
        assert_eq!(pool.promote(u8_, s8), Some(s16));
        assert_eq!(pool.promote(u32_, s32), Some(s64));
        // No wider signed type exists.
        assert_eq!(pool.promote(u64_, s64), None);
    }

    #[test]
    fn unsized_adopts_other_side() {
        let pool = TypePool::new();
        let lit = pool.ty_int_unsized(Sign::Unknown);
        let s32 = pool.ty_int(32, Sign::Signed);
        assert_eq!(pool.promote(lit, s32), Some(s32));
        assert_eq!(pool.promote(s32, lit), Some(s32));
        assert_eq!(pool.promote(lit, lit), Some(lit));
    }
}
