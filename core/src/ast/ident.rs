use core::cell::{Cell, RefCell};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;

use crate::types::TypeRef;
use crate::values::Val;
use crate::{Rc, String};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Local,
    Param,
    /// Introduced by reduction; assigned exactly once.
    Temp,
    /// A global whose value never changes after initialization.
    Const,
}

/// A named storage location.
#[derive(Debug)]
pub struct Id {
    pub name: String,
    pub scope: Scope,
    pub ty: TypeRef,
    /// Current value of a global or constant.
    pub value: RefCell<Option<Val>>,
    /// Interpreter frame slot for locals, params and temporaries.
    offset: Cell<usize>,
    /// Constants declared `&redef` may change between script loads, so
    /// their value is not safe to fold.
    pub redefinable: bool,
}

impl Id {
    pub fn new(name: &str, scope: Scope, ty: TypeRef) -> Self {
        Id {
            name: String::from(name),
            scope,
            ty,
            value: RefCell::new(None),
            offset: Cell::new(0),
            redefinable: false,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self.scope, Scope::Global | Scope::Const)
    }

    pub fn is_temp(&self) -> bool {
        self.scope == Scope::Temp
    }

    pub fn offset(&self) -> usize {
        self.offset.get()
    }

    pub fn set_offset(&self, offset: usize) {
        self.offset.set(offset);
    }

    pub fn value(&self) -> Option<Val> {
        self.value.borrow().clone()
    }

    pub fn set_value(&self, val: Val) {
        *self.value.borrow_mut() = Some(val);
    }

    /// Value to substitute for references to this id during reduction.
    pub fn folded_constant(&self) -> Option<Val> {
        if self.scope != Scope::Const || self.redefinable || !self.ty.is_atomic() {
            return None;
        }
        self.value()
    }
}

/// Shared handle to an `Id`, compared and hashed by identity.
///
/// Two distinct locals may share a name (a shadowing inner block, or
/// temporaries from separate reduction rounds); analysis must keep them
/// apart.
#[derive(Clone)]
pub struct IdPtr(pub Rc<Id>);

impl IdPtr {
    pub fn new(id: Id) -> Self {
        IdPtr(Rc::new(id))
    }

    fn addr(&self) -> *const Id {
        Rc::as_ptr(&self.0)
    }
}

impl Deref for IdPtr {
    type Target = Id;

    fn deref(&self) -> &Id {
        &self.0
    }
}

impl PartialEq for IdPtr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for IdPtr {}

impl Hash for IdPtr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl PartialOrd for IdPtr {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by name first so dumps are stable; identity breaks ties.
impl Ord for IdPtr {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.addr().cmp(&other.addr()))
    }
}

impl fmt::Debug for IdPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for IdPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
