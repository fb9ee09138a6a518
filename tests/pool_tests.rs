//! Pool canonicalization invariants across the shared stores.

use swgc::compiler::{CompileOptions, Compiler};
use swgc::sema::constants::{ConstantValue, IntValue};
use swgc::sema::types::{Sign, TypeInfo};

fn compiler() -> std::sync::Arc<Compiler> {
    Compiler::new(CompileOptions::default())
}

#[test]
fn type_pool_is_idempotent() {
    let c = compiler();
    let t1 = c.types().add(TypeInfo::Int {
        bits: 16,
        sign: Sign::Unsigned,
    });
    let t2 = c.types().add(TypeInfo::Int {
        bits: 16,
        sign: Sign::Unsigned,
    });
    assert_eq!(t1, t2);
}

#[test]
fn constant_pool_is_idempotent() {
    let c = compiler();
    let a = c.constants().add(ConstantValue::make_int(
        IntValue::unsigned(5),
        32,
        Sign::Signed,
    ));
    let b = c.constants().add(ConstantValue::make_int(
        IntValue::unsigned(5),
        32,
        Sign::Signed,
    ));
    assert_eq!(a, b);
}

#[test]
fn identifier_pool_is_idempotent() {
    let c = compiler();
    assert_eq!(
        c.identifiers().intern("symbol"),
        c.identifiers().intern("symbol")
    );
}

#[test]
fn constant_type_round_trips() {
    // from_constant(type_of(c)) == type_of(c) for every constant case.
    let c = compiler();
    let cases = vec![
        ConstantValue::Bool(true),
        ConstantValue::make_int(IntValue::unsigned(1), 8, Sign::Unsigned),
        ConstantValue::make_int_unsized(IntValue::unsigned(1), Sign::Unknown),
        ConstantValue::make_float(2.0, 64),
        ConstantValue::make_float_unsized(2.0),
        ConstantValue::make_string("s"),
        ConstantValue::Char('c'),
        ConstantValue::Null,
    ];
    for value in cases {
        let t1 = value.type_of(c.types());
        let info = c.types().get(t1);
        let t2 = c.types().add(info);
        assert_eq!(t1, t2, "{value:?}");
    }
}

#[test]
fn concurrent_interning_collapses() {
    let c = compiler();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let c = c.clone();
        handles.push(std::thread::spawn(move || {
            let mut id_refs = Vec::new();
            let mut type_refs = Vec::new();
            for i in 0..100 {
                id_refs.push(c.identifiers().intern(&format!("ident_{i}")));
                type_refs.push(c.types().add(TypeInfo::Int {
                    bits: 32,
                    sign: Sign::Signed,
                }));
            }
            (id_refs, type_refs)
        }));
    }
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for window in results.windows(2) {
        assert_eq!(window[0].0, window[1].0);
        assert_eq!(window[0].1, window[1].1);
    }
}

#[test]
fn promote_symmetry_holds_for_unsized_too() {
    let c = compiler();
    let types = c.types();
    let all = [
        types.ty_int(8, Sign::Signed),
        types.ty_int(64, Sign::Unsigned),
        types.ty_float(32),
        types.ty_int_unsized(Sign::Unknown),
        types.ty_int_unsized(Sign::Unsigned),
        types.ty_float_unsized(),
    ];
    for &a in &all {
        for &b in &all {
            assert_eq!(types.promote(a, b), types.promote(b, a));
        }
    }
}
