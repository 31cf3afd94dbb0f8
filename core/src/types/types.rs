use core::fmt::{self, Display};

use crate::values::Val;
use crate::{Rc, String, Vec};

/// Shared handle to a resolved type.
///
/// Types are immutable once built and compared structurally, so handing
/// out clones of the `Rc` is how nodes, values and instructions share them.
pub type TypeRef = Rc<Type>;

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Bool,
    Int,
    Count,
    Double,
    Time,
    Interval,
    Port,
    Addr,
    Subnet,
    String,
    Pattern,
    Enum(Rc<str>),
    Vector(TypeRef),
    /// A table, or a set when `yield_type` is `None`.
    Table {
        indices: Vec<TypeRef>,
        yield_type: Option<TypeRef>,
    },
    Record(Rc<RecordType>),
    /// Type of a bare expression list (index lists, call arguments, the
    /// result of indexing an `any` aggregate).
    List(Vec<TypeRef>),
    Func(Rc<FuncType>),
    Any,
    Timer,
    /// Sentinel for nodes whose type resolution failed.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Val>,
    /// `&optional` fields may be absent without a default.
    pub optional: bool,
}

impl FieldDecl {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        FieldDecl {
            name: String::from(name),
            ty,
            default: None,
            optional: false,
        }
    }

    pub fn with_default(mut self, default: Val) -> Self {
        self.default = Some(default);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncFlavor {
    Function,
    Event,
    Hook,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub flavor: FuncFlavor,
    pub params: Vec<(String, TypeRef)>,
    pub yield_type: TypeRef,
}

/// Flat discriminant of `Type`, for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Void,
    Bool,
    Int,
    Count,
    Double,
    Time,
    Interval,
    Port,
    Addr,
    Subnet,
    String,
    Pattern,
    Enum,
    Vector,
    Table,
    Record,
    List,
    Func,
    Any,
    Timer,
    Error,
}

/// Machine representation used when folding and executing arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalType {
    /// Signed 64-bit: int, bool, enum.
    Int,
    /// Unsigned 64-bit: count, port, timer.
    Unsigned,
    /// Floating point: double, time, interval.
    Double,
    String,
    Addr,
    Subnet,
    Other,
    Void,
    Error,
}

impl Type {
    pub fn tag(&self) -> TypeTag {
        match self {
            Type::Void => TypeTag::Void,
            Type::Bool => TypeTag::Bool,
            Type::Int => TypeTag::Int,
            Type::Count => TypeTag::Count,
            Type::Double => TypeTag::Double,
            Type::Time => TypeTag::Time,
            Type::Interval => TypeTag::Interval,
            Type::Port => TypeTag::Port,
            Type::Addr => TypeTag::Addr,
            Type::Subnet => TypeTag::Subnet,
            Type::String => TypeTag::String,
            Type::Pattern => TypeTag::Pattern,
            Type::Enum(_) => TypeTag::Enum,
            Type::Vector(_) => TypeTag::Vector,
            Type::Table { .. } => TypeTag::Table,
            Type::Record(_) => TypeTag::Record,
            Type::List(_) => TypeTag::List,
            Type::Func(_) => TypeTag::Func,
            Type::Any => TypeTag::Any,
            Type::Timer => TypeTag::Timer,
            Type::Error => TypeTag::Error,
        }
    }

    pub fn internal_type(&self) -> InternalType {
        match self {
            Type::Bool | Type::Int | Type::Enum(_) => InternalType::Int,
            Type::Count | Type::Port | Type::Timer => InternalType::Unsigned,
            Type::Double | Type::Time | Type::Interval => InternalType::Double,
            Type::String => InternalType::String,
            Type::Addr => InternalType::Addr,
            Type::Subnet => InternalType::Subnet,
            Type::Void => InternalType::Void,
            Type::Error => InternalType::Error,
            _ => InternalType::Other,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Values of managed types own heap data and need explicit release
    /// when their frame slot is overwritten or torn down.
    pub fn is_managed(&self) -> bool {
        matches!(
            self,
            Type::String
                | Type::Pattern
                | Type::Vector(_)
                | Type::Table { .. }
                | Type::Record(_)
                | Type::List(_)
                | Type::Func(_)
                | Type::Any
        )
    }

    /// Scalar types whose values can be folded into constants.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self.internal_type(),
            InternalType::Int
                | InternalType::Unsigned
                | InternalType::Double
                | InternalType::String
                | InternalType::Addr
                | InternalType::Subnet
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Count | Type::Double | Type::Time | Type::Interval
        )
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Vector(_) | Type::Table { .. } | Type::Record(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(
            self,
            Type::Table {
                yield_type: None,
                ..
            }
        )
    }

    /// Element type of a vector, yield of a table or function.
    pub fn yield_type(&self) -> Option<&TypeRef> {
        match self {
            Type::Vector(elem) => Some(elem),
            Type::Table { yield_type, .. } => yield_type.as_ref(),
            Type::Func(ft) => Some(&ft.yield_type),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Rc<RecordType>> {
        match self {
            Type::Record(rt) => Some(rt),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&Rc<FuncType>> {
        match self {
            Type::Func(ft) => Some(ft),
            _ => None,
        }
    }
}

impl RecordType {
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Count => write!(f, "count"),
            Type::Double => write!(f, "double"),
            Type::Time => write!(f, "time"),
            Type::Interval => write!(f, "interval"),
            Type::Port => write!(f, "port"),
            Type::Addr => write!(f, "addr"),
            Type::Subnet => write!(f, "subnet"),
            Type::String => write!(f, "string"),
            Type::Pattern => write!(f, "pattern"),
            Type::Enum(name) => write!(f, "{}", name),
            Type::Vector(elem) => write!(f, "vector of {}", elem),
            Type::Table {
                indices,
                yield_type,
            } => {
                let kind = if yield_type.is_some() { "table" } else { "set" };
                write!(f, "{}[", kind)?;
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", index)?;
                }
                write!(f, "]")?;
                if let Some(y) = yield_type {
                    write!(f, " of {}", y)?;
                }
                Ok(())
            }
            Type::Record(rt) => write!(f, "record {}", rt.name),
            Type::List(elems) => {
                write!(f, "list(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ")")
            }
            Type::Func(ft) => {
                let kind = match ft.flavor {
                    FuncFlavor::Function => "function",
                    FuncFlavor::Event => "event",
                    FuncFlavor::Hook => "hook",
                };
                write!(f, "{}(", kind)?;
                for (i, (name, ty)) in ft.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, ")")?;
                if !ft.yield_type.is_void() {
                    write!(f, ": {}", ft.yield_type)?;
                }
                Ok(())
            }
            Type::Any => write!(f, "any"),
            Type::Timer => write!(f, "timer"),
            Type::Error => write!(f, "error"),
        }
    }
}

impl Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Void => "void",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Count => "count",
            TypeTag::Double => "double",
            TypeTag::Time => "time",
            TypeTag::Interval => "interval",
            TypeTag::Port => "port",
            TypeTag::Addr => "addr",
            TypeTag::Subnet => "subnet",
            TypeTag::String => "string",
            TypeTag::Pattern => "pattern",
            TypeTag::Enum => "enum",
            TypeTag::Vector => "vector",
            TypeTag::Table => "table",
            TypeTag::Record => "record",
            TypeTag::List => "list",
            TypeTag::Func => "function",
            TypeTag::Any => "any",
            TypeTag::Timer => "timer",
            TypeTag::Error => "error",
        };
        f.write_str(name)
    }
}
