//! Resolved types attached to tree nodes, values and instructions.
//!
//! Type checking happens before trees reach this crate; what lives here is
//! only what reduction, folding and slot allocation need to know about a
//! type: its internal representation, whether its values are managed, and
//! its element or field layout.

mod types;

pub use types::{
    FieldDecl, FuncFlavor, FuncType, InternalType, RecordType, Type, TypeRef, TypeTag,
};

use crate::{Rc, String, Vec};

pub fn void() -> TypeRef {
    Rc::new(Type::Void)
}

pub fn bool() -> TypeRef {
    Rc::new(Type::Bool)
}

pub fn int() -> TypeRef {
    Rc::new(Type::Int)
}

pub fn count() -> TypeRef {
    Rc::new(Type::Count)
}

pub fn double() -> TypeRef {
    Rc::new(Type::Double)
}

pub fn time() -> TypeRef {
    Rc::new(Type::Time)
}

pub fn interval() -> TypeRef {
    Rc::new(Type::Interval)
}

pub fn port() -> TypeRef {
    Rc::new(Type::Port)
}

pub fn addr() -> TypeRef {
    Rc::new(Type::Addr)
}

pub fn subnet() -> TypeRef {
    Rc::new(Type::Subnet)
}

pub fn string() -> TypeRef {
    Rc::new(Type::String)
}

pub fn pattern() -> TypeRef {
    Rc::new(Type::Pattern)
}

pub fn any() -> TypeRef {
    Rc::new(Type::Any)
}

pub fn timer() -> TypeRef {
    Rc::new(Type::Timer)
}

pub fn error() -> TypeRef {
    Rc::new(Type::Error)
}

pub fn vector_of(elem: TypeRef) -> TypeRef {
    Rc::new(Type::Vector(elem))
}

pub fn set_of(indices: Vec<TypeRef>) -> TypeRef {
    Rc::new(Type::Table {
        indices,
        yield_type: None,
    })
}

pub fn table_of(indices: Vec<TypeRef>, yield_type: TypeRef) -> TypeRef {
    Rc::new(Type::Table {
        indices,
        yield_type: Some(yield_type),
    })
}

pub fn list_of(elems: Vec<TypeRef>) -> TypeRef {
    Rc::new(Type::List(elems))
}

pub fn record(name: &str, fields: Vec<FieldDecl>) -> TypeRef {
    Rc::new(Type::Record(Rc::new(RecordType {
        name: String::from(name),
        fields,
    })))
}

pub fn function(params: Vec<(String, TypeRef)>, yield_type: TypeRef) -> TypeRef {
    Rc::new(Type::Func(Rc::new(FuncType {
        flavor: FuncFlavor::Function,
        params,
        yield_type,
    })))
}

pub fn event(params: Vec<(String, TypeRef)>) -> TypeRef {
    Rc::new(Type::Func(Rc::new(FuncType {
        flavor: FuncFlavor::Event,
        params,
        yield_type: void(),
    })))
}

/// Structural type equality, ignoring field defaults.
pub fn same_type(t1: &Type, t2: &Type) -> bool {
    match (t1, t2) {
        (Type::Vector(e1), Type::Vector(e2)) => same_type(e1, e2),
        (
            Type::Table {
                indices: i1,
                yield_type: y1,
            },
            Type::Table {
                indices: i2,
                yield_type: y2,
            },
        ) => {
            i1.len() == i2.len()
                && i1.iter().zip(i2).all(|(a, b)| same_type(a, b))
                && match (y1, y2) {
                    (Some(a), Some(b)) => same_type(a, b),
                    (None, None) => true,
                    _ => false,
                }
        }
        (Type::Record(r1), Type::Record(r2)) => {
            Rc::ptr_eq(r1, r2)
                || (r1.name == r2.name
                    && r1.fields.len() == r2.fields.len()
                    && r1
                        .fields
                        .iter()
                        .zip(&r2.fields)
                        .all(|(a, b)| a.name == b.name && same_type(&a.ty, &b.ty)))
        }
        (Type::List(l1), Type::List(l2)) => {
            l1.len() == l2.len() && l1.iter().zip(l2).all(|(a, b)| same_type(a, b))
        }
        (Type::Func(f1), Type::Func(f2)) => {
            f1.flavor == f2.flavor
                && same_type(&f1.yield_type, &f2.yield_type)
                && f1.params.len() == f2.params.len()
                && f1
                    .params
                    .iter()
                    .zip(&f2.params)
                    .all(|(a, b)| same_type(&a.1, &b.1))
        }
        _ => t1.tag() == t2.tag() && t1.tag() != TypeTag::Error,
    }
}
