//! Storage behind the managed aggregate values.

use core::fmt::{self, Display};

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::types::{RecordType, Type, TypeRef};
use crate::values::Val;
use crate::{Rc, Vec};

#[derive(Debug, Clone)]
pub struct VectorVal {
    pub elem_type: TypeRef,
    /// Assigning past the end leaves holes.
    pub elems: Vec<Option<Val>>,
}

impl VectorVal {
    pub fn new(elem_type: TypeRef) -> Self {
        VectorVal {
            elem_type,
            elems: Vec::new(),
        }
    }

    pub fn from_vals(elem_type: TypeRef, vals: Vec<Val>) -> Self {
        VectorVal {
            elem_type,
            elems: vals.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Val> {
        self.elems.get(index).and_then(Option::as_ref)
    }

    pub fn set(&mut self, index: usize, val: Val) {
        if index >= self.elems.len() {
            self.elems.resize(index + 1, None);
        }
        self.elems[index] = Some(val);
    }

    pub fn push(&mut self, val: Val) {
        self.elems.push(Some(val));
    }

    pub fn deep_clone(&self) -> Self {
        VectorVal {
            elem_type: self.elem_type.clone(),
            elems: self
                .elems
                .iter()
                .map(|e| e.as_ref().map(Val::deep_clone))
                .collect(),
        }
    }
}

/// Index of a table entry. Single-index tables still use a one-element key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey(pub SmallVec<[Val; 2]>);

impl TableKey {
    pub fn single(val: Val) -> Self {
        let mut vals = SmallVec::new();
        vals.push(val);
        TableKey(vals)
    }

    /// Key for an index expression's value: lists spread into components.
    pub fn from_val(val: &Val) -> Self {
        match val {
            Val::List(items) => TableKey(items.iter().cloned().collect()),
            other => TableKey::single(other.clone()),
        }
    }

    /// The value a loop variable over this table sees.
    pub fn to_val(&self) -> Val {
        match self.0.as_slice() {
            [single] => single.clone(),
            many => Val::list(many.to_vec()),
        }
    }
}

impl Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() > 1 {
            write!(f, "[")?;
        }
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        if self.0.len() > 1 {
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// A table or set.
///
/// Entries keep insertion order so iteration and printing are stable.
/// Deletion leaves a tombstone; `compact` runs once tombstones dominate.
#[derive(Debug, Clone)]
pub struct TableVal {
    pub ty: TypeRef,
    entries: Vec<Option<(TableKey, Val)>>,
    index: HashMap<TableKey, usize>,
}

impl TableVal {
    pub fn new(ty: TypeRef) -> Self {
        TableVal {
            ty,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.ty.is_set()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &TableKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &TableKey) -> Option<&Val> {
        let pos = *self.index.get(key)?;
        self.entries[pos].as_ref().map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: TableKey, val: Val) {
        if let Some(&pos) = self.index.get(&key) {
            self.entries[pos] = Some((key, val));
            return;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push(Some((key, val)));
    }

    /// Add a set member.
    pub fn add(&mut self, key: TableKey) {
        self.insert(key, Val::Void);
    }

    pub fn remove(&mut self, key: &TableKey) -> Option<Val> {
        let pos = self.index.remove(key)?;
        let removed = self.entries[pos].take().map(|(_, v)| v);
        if self.entries.len() > 8 && self.index.len() * 2 < self.entries.len() {
            self.compact();
        }
        removed
    }

    fn compact(&mut self) {
        self.entries.retain(Option::is_some);
        self.index.clear();
        for (pos, entry) in self.entries.iter().enumerate() {
            if let Some((key, _)) = entry {
                self.index.insert(key.clone(), pos);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &Val)> {
        self.entries
            .iter()
            .filter_map(|e| e.as_ref().map(|(k, v)| (k, v)))
    }

    /// Snapshot of the keys, for loops that may modify the table.
    pub fn keys(&self) -> Vec<TableKey> {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn deep_clone(&self) -> Self {
        let mut copy = TableVal::new(self.ty.clone());
        for (key, val) in self.iter() {
            copy.insert(key.clone(), val.deep_clone());
        }
        copy
    }

    /// New table of the same type holding entries that satisfy `keep`.
    pub fn filtered(&self, mut keep: impl FnMut(&TableKey) -> bool) -> Self {
        let mut result = TableVal::new(self.ty.clone());
        for (key, val) in self.iter() {
            if keep(key) {
                result.insert(key.clone(), val.clone());
            }
        }
        result
    }

    pub fn is_subset_of(&self, other: &TableVal) -> bool {
        self.index.keys().all(|k| other.contains(k))
    }
}

impl PartialEq for TableVal {
    fn eq(&self, other: &TableVal) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

#[derive(Debug, Clone)]
pub struct RecordVal {
    pub ty: Rc<RecordType>,
    pub fields: Vec<Option<Val>>,
}

impl RecordVal {
    /// A record with every field at its declared default (or unset).
    pub fn with_defaults(ty: Rc<RecordType>) -> Self {
        let fields = ty.fields.iter().map(|f| f.default.clone()).collect();
        RecordVal { ty, fields }
    }

    pub fn get(&self, field: usize) -> Option<&Val> {
        self.fields.get(field).and_then(Option::as_ref)
    }

    pub fn set(&mut self, field: usize, val: Val) {
        self.fields[field] = Some(val);
    }

    pub fn deep_clone(&self) -> Self {
        RecordVal {
            ty: self.ty.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| f.as_ref().map(Val::deep_clone))
                .collect(),
        }
    }
}

pub fn empty_aggregate(ty: &TypeRef) -> Option<Val> {
    use core::cell::RefCell;
    match &**ty {
        Type::Vector(elem) => Some(Val::Vector(Rc::new(RefCell::new(VectorVal::new(
            elem.clone(),
        ))))),
        Type::Table { .. } => Some(Val::Table(Rc::new(RefCell::new(TableVal::new(
            ty.clone(),
        ))))),
        Type::Record(rt) => Some(Val::Record(Rc::new(RefCell::new(
            RecordVal::with_defaults(rt.clone()),
        )))),
        _ => None,
    }
}
