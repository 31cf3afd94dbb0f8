use core::cell::RefCell;
use core::net::{IpAddr, Ipv4Addr};

use pretty_assertions::assert_eq;

use super::*;
use crate::types::{self, Type};
use crate::{Rc, ToString, Vec, format, vec};

fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

#[test]
fn test_subnet_masks_host_bits() {
    let net = Subnet::new(v4(10, 1, 2, 3), 16);
    assert_eq!(net.prefix, v4(10, 1, 0, 0));
    assert!(net.contains(&v4(10, 1, 200, 7)));
    assert!(!net.contains(&v4(10, 2, 0, 1)));
    assert_eq!(net.size(), 65536.0);
}

#[test]
fn test_zero_width_subnet_contains_everything() {
    let net = Subnet::new(v4(192, 168, 0, 1), 0);
    assert!(net.contains(&v4(8, 8, 8, 8)));
}

#[test]
fn test_managed_variants() {
    assert!(!Val::Int(3).is_managed());
    assert!(!Val::Addr(v4(1, 2, 3, 4)).is_managed());
    assert!(Val::str("x").is_managed());
    assert!(Val::vector(types::count(), vec![]).is_managed());
}

#[test]
fn test_deep_clone_does_not_share_storage() {
    let original = Val::vector(types::count(), vec![Val::Count(1), Val::Count(2)]);
    let copy = original.deep_clone();
    if let Val::Vector(v) = &copy {
        v.borrow_mut().push(Val::Count(3));
    }
    assert!(!original.same_as(&copy));
    assert_eq!(format!("{}", original), "[1, 2]");
    assert_eq!(format!("{}", copy), "[1, 2, 3]");
}

#[test]
fn test_vector_holes() {
    let mut v = VectorVal::new(types::string());
    v.set(2, Val::str("c"));
    assert_eq!(v.len(), 3);
    assert!(v.get(0).is_none());
    assert_eq!(v.get(2), Some(&Val::str("c")));
}

#[test]
fn test_table_keeps_insertion_order_across_removals() {
    let mut t = TableVal::new(types::table_of(vec![types::string()], types::count()));
    for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
        t.insert(TableKey::single(Val::str(name)), Val::Count(i as u64));
    }
    t.remove(&TableKey::single(Val::str("b")));
    let keys: Vec<_> = t.keys().iter().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["a", "c", "d"]);
    assert_eq!(t.get(&TableKey::single(Val::str("d"))), Some(&Val::Count(3)));
}

#[test]
fn test_multi_index_key_round_trips_through_list() {
    let key = TableKey::from_val(&Val::list(vec![Val::Addr(v4(1, 1, 1, 1)), Val::Port(Port::tcp(80))]));
    assert_eq!(key.0.len(), 2);
    assert_eq!(key.to_string(), "[1.1.1.1, 80/tcp]");
}

#[test]
fn test_record_defaults() {
    let rt = types::record(
        "conn",
        vec![
            types::FieldDecl {
                name: "orig".into(),
                ty: types::addr(),
                default: None,
                optional: false,
            },
            types::FieldDecl {
                name: "hits".into(),
                ty: types::count(),
                default: Some(Val::Count(0)),
                optional: false,
            },
        ],
    );
    let Some(Val::Record(r)) = empty_aggregate(&rt) else {
        panic!("expected record");
    };
    assert!(r.borrow().get(0).is_none());
    assert_eq!(r.borrow().get(1), Some(&Val::Count(0)));
}

#[test]
fn test_conforms_to_checks_record_name() {
    let rt = types::record("a", vec![]);
    let Type::Record(inner) = &*rt else { unreachable!() };
    let val = Val::Record(Rc::new(RefCell::new(RecordVal::with_defaults(inner.clone()))));
    assert!(val.conforms_to(&rt));
    assert!(!val.conforms_to(&types::record("b", vec![])));
    assert!(Val::Int(1).conforms_to(&types::any()));
    assert!(!Val::Int(1).conforms_to(&types::count()));
}
