//! Constant values, the deduplicating constant pool, and the small
//! fixed-width integer arithmetic used by constant folding.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::core::{ConstantRef, TypeRef};
use crate::sema::types::{Sign, TypeInfo, TypePool};

/// Integer scratch value for folding. The payload is a 64-bit two's
/// complement pattern; `signed` selects the interpretation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct IntValue {
    pub v: u64,
    pub signed: bool,
}

impl IntValue {
    pub fn unsigned(v: u64) -> Self {
        Self { v, signed: false }
    }

    pub fn signed(v: i64) -> Self {
        Self {
            v: v as u64,
            signed: true,
        }
    }

    pub fn as_i64(self) -> i64 {
        self.v as i64
    }

    pub fn is_zero(self) -> bool {
        self.v == 0
    }

    pub fn is_negative(self) -> bool {
        self.signed && (self.v as i64) < 0
    }

    pub fn add(self, rhs: Self) -> (Self, bool) {
        if self.signed {
            let (v, o) = (self.v as i64).overflowing_add(rhs.v as i64);
            (Self::signed(v), o)
        } else {
            let (v, o) = self.v.overflowing_add(rhs.v);
            (Self::unsigned(v), o)
        }
    }

    pub fn sub(self, rhs: Self) -> (Self, bool) {
        if self.signed {
            let (v, o) = (self.v as i64).overflowing_sub(rhs.v as i64);
            (Self::signed(v), o)
        } else {
            let (v, o) = self.v.overflowing_sub(rhs.v);
            (Self::unsigned(v), o)
        }
    }

    pub fn mul(self, rhs: Self) -> (Self, bool) {
        if self.signed {
            let (v, o) = (self.v as i64).overflowing_mul(rhs.v as i64);
            (Self::signed(v), o)
        } else {
            let (v, o) = self.v.overflowing_mul(rhs.v);
            (Self::unsigned(v), o)
        }
    }

    /// Caller rejects zero divisors first.
    pub fn div(self, rhs: Self) -> (Self, bool) {
        debug_assert!(!rhs.is_zero());
        if self.signed {
            let (v, o) = (self.v as i64).overflowing_div(rhs.v as i64);
            (Self::signed(v), o)
        } else {
            (Self::unsigned(self.v / rhs.v), false)
        }
    }

    pub fn rem(self, rhs: Self) -> (Self, bool) {
        debug_assert!(!rhs.is_zero());
        if self.signed {
            let (v, o) = (self.v as i64).overflowing_rem(rhs.v as i64);
            (Self::signed(v), o)
        } else {
            (Self::unsigned(self.v % rhs.v), false)
        }
    }

    pub fn neg(self) -> (Self, bool) {
        let (v, o) = (self.v as i64).overflowing_neg();
        (Self::signed(v), o)
    }

    pub fn bit_and(self, rhs: Self) -> Self {
        Self { v: self.v & rhs.v, ..self }
    }

    pub fn bit_or(self, rhs: Self) -> Self {
        Self { v: self.v | rhs.v, ..self }
    }

    pub fn bit_xor(self, rhs: Self) -> Self {
        Self { v: self.v ^ rhs.v, ..self }
    }

    pub fn bit_not(self) -> Self {
        Self { v: !self.v, ..self }
    }

    pub fn shl(self, amount: u64) -> (Self, bool) {
        if amount >= 64 {
            return (Self { v: 0, ..self }, true);
        }
        let lost = self.v.leading_zeros() < amount as u32;
        (
            Self {
                v: self.v << amount,
                ..self
            },
            lost,
        )
    }

    pub fn shr(self, amount: u64) -> (Self, bool) {
        if amount >= 64 {
            return (Self { v: 0, ..self }, true);
        }
        let v = if self.signed {
            ((self.v as i64) >> amount) as u64
        } else {
            self.v >> amount
        };
        (Self { v, ..self }, false)
    }

    /// Truncates to `bits`, sign-extending when the destination is signed.
    pub fn normalize_to(self, bits: u8, signed: bool) -> Self {
        if bits == 0 || bits >= 64 {
            return Self { v: self.v, signed };
        }
        let mask = (1u64 << bits) - 1;
        let mut v = self.v & mask;
        if signed && (v >> (bits - 1)) & 1 == 1 {
            v |= !mask;
        }
        Self { v, signed }
    }

    /// True when the value fits in `bits` with the given destination
    /// signedness. `bits == 0` (unsized) always fits.
    pub fn fits(self, bits: u8, dst_signed: bool) -> bool {
        if bits == 0 {
            return true;
        }
        if dst_signed {
            let min = -(1i128 << (bits - 1));
            let max = (1i128 << (bits - 1)) - 1;
            let val = if self.signed {
                self.v as i64 as i128
            } else {
                self.v as i128
            };
            val >= min && val <= max
        } else {
            if self.is_negative() {
                return false;
            }
            if bits == 64 {
                return true;
            }
            self.v < (1u64 << bits)
        }
    }
}

/// Value-typed constant union. Cases parallel `TypeInfo`; unsized
/// integer/float cases carry literals whose width is not yet chosen.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ConstantValue {
    Bool(bool),
    /// `bits == 0` marks an unsized literal. The payload is a two's
    /// complement bit pattern.
    Int { bits: u8, sign: Sign, v: u64 },
    /// Bit pattern of an f64; 32-bit constants are rounded before storage so
    /// dedup compares canonical values.
    Float { bits: u8, repr: u64 },
    Str(Box<str>),
    Char(char),
    Aggregate {
        type_ref: TypeRef,
        members: Box<[ConstantRef]>,
    },
    TypeValue(TypeRef),
    EnumValue {
        enum_type: TypeRef,
        value: ConstantRef,
    },
    Null,
    Undefined,
}

impl ConstantValue {
    pub fn make_int(value: IntValue, bits: u8, sign: Sign) -> Self {
        ConstantValue::Int {
            bits,
            sign,
            v: value.v,
        }
    }

    pub fn make_int_unsized(value: IntValue, sign: Sign) -> Self {
        ConstantValue::Int {
            bits: 0,
            sign,
            v: value.v,
        }
    }

    pub fn make_float(value: f64, bits: u8) -> Self {
        let repr = if bits == 32 {
            ((value as f32) as f64).to_bits()
        } else {
            value.to_bits()
        };
        ConstantValue::Float { bits, repr }
    }

    pub fn make_float_unsized(value: f64) -> Self {
        ConstantValue::Float {
            bits: 0,
            repr: value.to_bits(),
        }
    }

    pub fn make_string(s: &str) -> Self {
        ConstantValue::Str(s.into())
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, ConstantValue::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, ConstantValue::Int { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ConstantValue::Float { .. })
    }

    pub fn is_string(&self) -> bool {
        matches!(self, ConstantValue::Str(_))
    }

    pub fn get_bool(&self) -> bool {
        match self {
            ConstantValue::Bool(b) => *b,
            _ => false,
        }
    }

    pub fn get_int(&self) -> IntValue {
        match self {
            ConstantValue::Int { sign, v, .. } => IntValue {
                v: *v,
                signed: *sign == Sign::Signed,
            },
            ConstantValue::Bool(b) => IntValue::unsigned(*b as u64),
            ConstantValue::Char(c) => IntValue::unsigned(*c as u64),
            _ => IntValue::unsigned(0),
        }
    }

    pub fn get_float(&self) -> f64 {
        match self {
            ConstantValue::Float { repr, .. } => f64::from_bits(*repr),
            _ => 0.0,
        }
    }

    pub fn get_string(&self) -> &str {
        match self {
            ConstantValue::Str(s) => s,
            _ => "",
        }
    }

    /// The type implied by a constant. Invariant: adding this type twice
    /// yields the same reference, so `from_constant(type_of(c)) == type_of(c)`.
    pub fn type_of(&self, types: &TypePool) -> TypeRef {
        match self {
            ConstantValue::Bool(_) => types.ty_bool(),
            ConstantValue::Int { bits: 0, sign, .. } => types.ty_int_unsized(*sign),
            ConstantValue::Int { bits, sign, .. } => types.ty_int(*bits, *sign),
            ConstantValue::Float { bits: 0, .. } => types.ty_float_unsized(),
            ConstantValue::Float { bits, .. } => types.ty_float(*bits),
            ConstantValue::Str(_) => types.ty_string(),
            ConstantValue::Char(_) => types.ty_char(),
            ConstantValue::Aggregate { type_ref, .. } => *type_ref,
            ConstantValue::TypeValue(wraps) => types.add(TypeInfo::TypeValue { wraps: *wraps }),
            ConstantValue::EnumValue { enum_type, .. } => *enum_type,
            ConstantValue::Null | ConstantValue::Undefined => types.ty_void(),
        }
    }

    /// Rendering used for diagnostic arguments and `++` folding.
    pub fn to_display_string(&self, pool: &ConstantPool) -> String {
        match self {
            ConstantValue::Bool(b) => b.to_string(),
            ConstantValue::Int { sign, v, .. } => {
                if *sign == Sign::Signed && (*v as i64) < 0 {
                    (*v as i64).to_string()
                } else {
                    v.to_string()
                }
            }
            ConstantValue::Float { repr, .. } => f64::from_bits(*repr).to_string(),
            ConstantValue::Str(s) => s.to_string(),
            ConstantValue::Char(c) => c.to_string(),
            ConstantValue::Aggregate { members, .. } => {
                let inner: Vec<String> = members
                    .iter()
                    .map(|m| pool.get(*m).to_display_string(pool))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            ConstantValue::TypeValue(_) => "<type>".into(),
            ConstantValue::EnumValue { value, .. } => pool.get(*value).to_display_string(pool),
            ConstantValue::Null => "null".into(),
            ConstantValue::Undefined => "undefined".into(),
        }
    }
}

struct PoolInner {
    map: FxHashMap<ConstantValue, ConstantRef>,
    items: Vec<ConstantValue>,
}

/// Deduplicating constant pool with predefined singletons.
pub struct ConstantPool {
    inner: RwLock<PoolInner>,
    cst_true: ConstantRef,
    cst_false: ConstantRef,
    cst_null: ConstantRef,
    cst_undefined: ConstantRef,
}

impl ConstantPool {
    pub fn new() -> Self {
        let mut inner = PoolInner {
            map: FxHashMap::default(),
            items: Vec::new(),
        };
        let mut add = |value: ConstantValue| -> ConstantRef {
            let r = ConstantRef::new(inner.items.len() as u32);
            inner.map.insert(value.clone(), r);
            inner.items.push(value);
            r
        };
        let cst_true = add(ConstantValue::Bool(true));
        let cst_false = add(ConstantValue::Bool(false));
        let cst_null = add(ConstantValue::Null);
        let cst_undefined = add(ConstantValue::Undefined);
        Self {
            inner: RwLock::new(inner),
            cst_true,
            cst_false,
            cst_null,
            cst_undefined,
        }
    }

    pub fn add(&self, value: ConstantValue) -> ConstantRef {
        if let Some(r) = self.inner.read().map.get(&value) {
            return *r;
        }
        let mut inner = self.inner.write();
        if let Some(r) = inner.map.get(&value) {
            return *r;
        }
        let r = ConstantRef::new(inner.items.len() as u32);
        inner.map.insert(value.clone(), r);
        inner.items.push(value);
        r
    }

    pub fn get(&self, cst: ConstantRef) -> ConstantValue {
        self.inner.read().items[cst.index()].clone()
    }

    pub fn cst_bool(&self, v: bool) -> ConstantRef {
        if v {
            self.cst_true
        } else {
            self.cst_false
        }
    }

    pub fn cst_true(&self) -> ConstantRef {
        self.cst_true
    }

    pub fn cst_false(&self) -> ConstantRef {
        self.cst_false
    }

    pub fn cst_null(&self) -> ConstantRef {
        self.cst_null
    }

    pub fn cst_undefined(&self) -> ConstantRef {
        self.cst_undefined
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_dedups() {
        let pool = ConstantPool::new();
        let a = pool.add(ConstantValue::make_int(IntValue::unsigned(7), 32, Sign::Signed));
        let b = pool.add(ConstantValue::make_int(IntValue::unsigned(7), 32, Sign::Signed));
        assert_eq!(a, b);
        assert_ne!(a, pool.cst_true());
    }

    #[test]
    fn float_dedup_by_bits() {
        let pool = ConstantPool::new();
        let a = pool.add(ConstantValue::make_float(1.5, 64));
        let b = pool.add(ConstantValue::make_float(1.5, 64));
        assert_eq!(a, b);
        // f32 rounding canonicalizes before dedup.
        let c = pool.add(ConstantValue::make_float(0.1, 32));
        let d = pool.add(ConstantValue::make_float(0.1f32 as f64, 32));
        assert_eq!(c, d);
    }

    #[test]
    fn type_of_round_trips() {
        let types = TypePool::new();
        let c = ConstantValue::make_int(IntValue::unsigned(1), 32, Sign::Signed);
        assert_eq!(c.type_of(&types), types.ty_int(32, Sign::Signed));
        let c = ConstantValue::make_float_unsized(2.0);
        assert_eq!(c.type_of(&types), types.ty_float_unsized());
    }

    #[test]
    fn int_value_fits() {
        assert!(IntValue::unsigned(127).fits(8, true));
        assert!(!IntValue::unsigned(128).fits(8, true));
        assert!(IntValue::unsigned(200).fits(8, false));
        assert!(!IntValue::unsigned(256).fits(8, false));
        assert!(IntValue::signed(-128).fits(8, true));
        assert!(!IntValue::signed(-129).fits(8, true));
        assert!(!IntValue::signed(-1).fits(32, false));
        assert!(IntValue::unsigned(u64::MAX).fits(64, false));
        assert!(!IntValue::unsigned(u64::MAX).fits(64, true));
    }

    #[test]
    fn shift_detects_lost_bits() {
        let (v, over) = IntValue::unsigned(1).shl(63);
        assert!(!over);
        assert_eq!(v.v, 1u64 << 63);
        let (_, over) = IntValue::unsigned(3).shl(63);
        assert!(over);
        let (_, over) = IntValue::unsigned(1).shl(64);
        assert!(over);
    }
}
