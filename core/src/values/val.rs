use core::cell::RefCell;
use core::fmt::{self, Display};
use core::hash::{Hash, Hasher};
use core::net::IpAddr;

use crate::types::{Type, TypeRef, TypeTag};
use crate::values::{Func, RecordVal, TableVal, VectorVal};
use crate::{Rc, String, Vec};

/// A script value.
///
/// Variants holding an `Rc` are the managed ones: a frame slot holding one
/// keeps the underlying data alive until the slot is released or
/// overwritten. Everything else is plain data and copies freely.
#[derive(Debug, Clone)]
pub enum Val {
    Void,
    Bool(bool),
    Int(i64),
    Count(u64),
    Double(f64),
    Time(f64),
    Interval(f64),
    Port(Port),
    Enum(i64),
    Addr(IpAddr),
    Subnet(Subnet),
    Timer(u64),
    Str(Rc<str>),
    /// Pattern source text. Patterns compose and compare, they never match.
    Pattern(Rc<str>),
    Vector(Rc<RefCell<VectorVal>>),
    Table(Rc<RefCell<TableVal>>),
    Record(Rc<RefCell<RecordVal>>),
    List(Rc<[Val]>),
    Func(Rc<Func>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Proto {
    Unknown,
    Tcp,
    Udp,
    Icmp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port {
    pub proto: Proto,
    pub number: u16,
}

impl Port {
    pub fn tcp(number: u16) -> Self {
        Port {
            proto: Proto::Tcp,
            number,
        }
    }

    pub fn udp(number: u16) -> Self {
        Port {
            proto: Proto::Udp,
            number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    pub prefix: IpAddr,
    pub width: u8,
}

impl Subnet {
    /// Build a subnet, masking host bits off `addr`.
    pub fn new(addr: IpAddr, width: u8) -> Self {
        let bits = addr_bits(&addr);
        let width = width.min(bits);
        let prefix = mask_addr(addr, width);
        Subnet {
            prefix,
            width,
        }
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (addr, &self.prefix) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask_addr(*addr, self.width) == self.prefix
            }
            _ => false,
        }
    }

    /// Number of addresses covered.
    pub fn size(&self) -> f64 {
        let host_bits = u32::from(addr_bits(&self.prefix) - self.width);
        match 1u128.checked_shl(host_bits) {
            Some(n) if host_bits < 128 => n as f64,
            _ => u128::MAX as f64 + 1.0,
        }
    }
}

/// The 16-byte form addresses compare by. IPv4 maps into `::ffff:0:0/96`,
/// so `10.0.0.1` equals `::ffff:10.0.0.1` and sorts above `::1`.
pub(crate) fn addr_key(addr: &IpAddr) -> [u8; 16] {
    match addr {
        IpAddr::V4(a) => a.to_ipv6_mapped().octets(),
        IpAddr::V6(a) => a.octets(),
    }
}

pub(crate) fn addr_bits(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_addr(addr: IpAddr, width: u8) -> IpAddr {
    match addr {
        IpAddr::V4(a) => {
            let mask = u32::MAX.checked_shl(32 - u32::from(width)).unwrap_or(0);
            IpAddr::V4((a.to_bits() & mask).into())
        }
        IpAddr::V6(a) => {
            let mask = u128::MAX.checked_shl(128 - u32::from(width)).unwrap_or(0);
            IpAddr::V6((a.to_bits() & mask).into())
        }
    }
}

impl Val {
    pub fn str(s: &str) -> Val {
        Val::Str(Rc::from(s))
    }

    pub fn pattern(text: &str) -> Val {
        Val::Pattern(Rc::from(text))
    }

    pub fn list(vals: Vec<Val>) -> Val {
        Val::List(Rc::from(vals))
    }

    pub fn vector(elem_type: TypeRef, elems: Vec<Val>) -> Val {
        Val::Vector(Rc::new(RefCell::new(VectorVal::from_vals(elem_type, elems))))
    }

    /// Default value of an unmanaged type, or `None` if the type has no
    /// natural zero.
    pub fn zero_of(ty: &Type) -> Option<Val> {
        Some(match ty {
            Type::Bool => Val::Bool(false),
            Type::Int => Val::Int(0),
            Type::Count => Val::Count(0),
            Type::Double => Val::Double(0.0),
            Type::Time => Val::Time(0.0),
            Type::Interval => Val::Interval(0.0),
            _ => return None,
        })
    }

    /// Wrap a floating-point result in the variant matching `ty`.
    pub fn from_double(ty: &Type, d: f64) -> Val {
        match ty {
            Type::Time => Val::Time(d),
            Type::Interval => Val::Interval(d),
            _ => Val::Double(d),
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(
            self,
            Val::Str(_)
                | Val::Pattern(_)
                | Val::Vector(_)
                | Val::Table(_)
                | Val::Record(_)
                | Val::List(_)
                | Val::Func(_)
        )
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Val::Void => TypeTag::Void,
            Val::Bool(_) => TypeTag::Bool,
            Val::Int(_) => TypeTag::Int,
            Val::Count(_) => TypeTag::Count,
            Val::Double(_) => TypeTag::Double,
            Val::Time(_) => TypeTag::Time,
            Val::Interval(_) => TypeTag::Interval,
            Val::Port(_) => TypeTag::Port,
            Val::Enum(_) => TypeTag::Enum,
            Val::Addr(_) => TypeTag::Addr,
            Val::Subnet(_) => TypeTag::Subnet,
            Val::Timer(_) => TypeTag::Timer,
            Val::Str(_) => TypeTag::String,
            Val::Pattern(_) => TypeTag::Pattern,
            Val::Vector(_) => TypeTag::Vector,
            Val::Table(_) => TypeTag::Table,
            Val::Record(_) => TypeTag::Record,
            Val::List(_) => TypeTag::List,
            Val::Func(_) => TypeTag::Func,
        }
    }

    /// Whether a value that passed through `any` can be viewed as `ty`.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (_, Type::Any) => true,
            (Val::Record(r), Type::Record(rt)) => r.borrow().ty.name == rt.name,
            (Val::Vector(v), Type::Vector(elem)) => {
                crate::types::same_type(&v.borrow().elem_type, elem)
            }
            (Val::Table(t), Type::Table { .. }) => crate::types::same_type(&t.borrow().ty, ty),
            _ => self.tag() == ty.tag(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Val::Bool(b) => *b,
            other => internal_error!("expected bool value, found {:?}", other),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Val::Int(i) | Val::Enum(i) => *i,
            Val::Bool(b) => i64::from(*b),
            other => internal_error!("expected int value, found {:?}", other),
        }
    }

    pub fn as_count(&self) -> u64 {
        match self {
            Val::Count(c) | Val::Timer(c) => *c,
            Val::Port(p) => u64::from(p.number),
            other => internal_error!("expected count value, found {:?}", other),
        }
    }

    pub fn as_double(&self) -> f64 {
        match self {
            Val::Double(d) | Val::Time(d) | Val::Interval(d) => *d,
            other => internal_error!("expected double value, found {:?}", other),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Val::Str(s) | Val::Pattern(s) => s,
            other => internal_error!("expected string value, found {:?}", other),
        }
    }

    /// Index value usable as a vector position.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Val::Int(i) => Some(*i),
            Val::Count(c) => i64::try_from(*c).ok(),
            _ => None,
        }
    }

    /// Copy that shares no aggregate storage with `self`.
    pub fn deep_clone(&self) -> Val {
        match self {
            Val::Vector(v) => Val::Vector(Rc::new(RefCell::new(v.borrow().deep_clone()))),
            Val::Table(t) => Val::Table(Rc::new(RefCell::new(t.borrow().deep_clone()))),
            Val::Record(r) => Val::Record(Rc::new(RefCell::new(r.borrow().deep_clone()))),
            Val::List(l) => {
                let elems: Vec<Val> = l.iter().map(Val::deep_clone).collect();
                Val::List(Rc::from(elems))
            }
            other => other.clone(),
        }
    }

    /// Whether two values are the same object (for aggregates) or equal.
    pub fn same_as(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Vector(a), Val::Vector(b)) => Rc::ptr_eq(a, b),
            (Val::Table(a), Val::Table(b)) => Rc::ptr_eq(a, b),
            (Val::Record(a), Val::Record(b)) => Rc::ptr_eq(a, b),
            (Val::Func(a), Val::Func(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Void, Val::Void) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Int(a), Val::Int(b)) | (Val::Enum(a), Val::Enum(b)) => a == b,
            (Val::Count(a), Val::Count(b)) | (Val::Timer(a), Val::Timer(b)) => a == b,
            (Val::Double(a), Val::Double(b))
            | (Val::Time(a), Val::Time(b))
            | (Val::Interval(a), Val::Interval(b)) => a.to_bits() == b.to_bits(),
            (Val::Port(a), Val::Port(b)) => a == b,
            (Val::Addr(a), Val::Addr(b)) => addr_key(a) == addr_key(b),
            (Val::Subnet(a), Val::Subnet(b)) => a == b,
            (Val::Str(a), Val::Str(b)) | (Val::Pattern(a), Val::Pattern(b)) => a == b,
            (Val::Vector(a), Val::Vector(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().elems == b.borrow().elems
            }
            (Val::Table(a), Val::Table(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Val::Record(a), Val::Record(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().fields == b.borrow().fields
            }
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Func(a), Val::Func(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Val {}

impl Hash for Val {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            Val::Bool(b) => b.hash(state),
            Val::Int(i) | Val::Enum(i) => i.hash(state),
            Val::Count(c) | Val::Timer(c) => c.hash(state),
            Val::Double(d) | Val::Time(d) | Val::Interval(d) => d.to_bits().hash(state),
            Val::Port(p) => p.hash(state),
            Val::Addr(a) => addr_key(a).hash(state),
            Val::Subnet(s) => s.hash(state),
            Val::Str(s) | Val::Pattern(s) => s.hash(state),
            Val::List(l) => l.hash(state),
            // Aggregates hash by kind only; equality sorts them out.
            _ => {}
        }
    }
}

impl Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proto::Unknown => write!(f, "unknown"),
            Proto::Tcp => write!(f, "tcp"),
            Proto::Udp => write!(f, "udp"),
            Proto::Icmp => write!(f, "icmp"),
        }
    }
}

impl Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Void => write!(f, "<void>"),
            Val::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Val::Int(i) | Val::Enum(i) => write!(f, "{}", i),
            Val::Count(c) | Val::Timer(c) => write!(f, "{}", c),
            Val::Double(d) | Val::Time(d) => write!(f, "{:?}", d),
            Val::Interval(d) => write!(f, "{:?} secs", d),
            Val::Port(p) => write!(f, "{}/{}", p.number, p.proto),
            Val::Addr(a) => write!(f, "{}", a),
            Val::Subnet(s) => write!(f, "{}/{}", s.prefix, s.width),
            Val::Str(s) => write!(f, "{}", s),
            Val::Pattern(p) => write!(f, "/{}/", p),
            Val::Vector(v) => {
                write!(f, "[")?;
                for (i, elem) in v.borrow().elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match elem {
                        Some(val) => write!(f, "{}", val)?,
                        None => write!(f, "<hole>")?,
                    }
                }
                write!(f, "]")
            }
            Val::Table(t) => {
                let t = t.borrow();
                write!(f, "{{")?;
                for (i, (key, val)) in t.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", key)?;
                    if !t.is_set() {
                        write!(f, " = {}", val)?;
                    }
                }
                write!(f, "}}")
            }
            Val::Record(r) => {
                let r = r.borrow();
                write!(f, "[")?;
                let mut first = true;
                for (decl, val) in r.ty.fields.iter().zip(&r.fields) {
                    if let Some(val) = val {
                        if !first {
                            write!(f, ", ")?;
                        }
                        first = false;
                        write!(f, "{}={}", decl.name, val)?;
                    }
                }
                write!(f, "]")
            }
            Val::List(l) => {
                for (i, elem) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                Ok(())
            }
            Val::Func(func) => write!(f, "{}", func.name()),
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<i64> for Val {
    fn from(i: i64) -> Self {
        Val::Int(i)
    }
}

impl From<u64> for Val {
    fn from(c: u64) -> Self {
        Val::Count(c)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::str(s)
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(Rc::from(s.as_str()))
    }
}
