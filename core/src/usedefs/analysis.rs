use alloc::collections::BTreeSet;
use core::fmt;

use hashbrown::HashMap;
use tracing::debug;

use crate::ast::{Expr, ExprKind, IdPtr, Scope, Stmt, StmtKey, StmtKind};
use crate::{Rc, Vec};

/// Identifiers live at one program point.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UseDefSet {
    ids: BTreeSet<IdPtr>,
}

/// A use-def set shared between every point it describes.
pub type UDs = Rc<UseDefSet>;

impl UseDefSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &IdPtr) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdPtr> {
        self.ids.iter()
    }
}

impl fmt::Display for UseDefSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// `a ∪ b`, reusing whichever operand already holds the result.
fn union(a: &UDs, b: &UDs) -> UDs {
    if Rc::ptr_eq(a, b) || b.ids.is_subset(&a.ids) {
        return a.clone();
    }
    if a.ids.is_subset(&b.ids) {
        return b.clone();
    }
    let mut out = (**a).clone();
    out.ids.extend(b.ids.iter().cloned());
    Rc::new(out)
}

fn without(uds: &UDs, id: &IdPtr) -> UDs {
    if !uds.contains(id) {
        return uds.clone();
    }
    let mut out = (**uds).clone();
    out.ids.remove(id);
    Rc::new(out)
}

/// Identifiers an expression reads. Constants are not storage and never
/// appear.
fn expr_uds(e: &Expr<'_>) -> UDs {
    let mut set = UseDefSet::new();
    add_uses(e, &mut set);
    Rc::new(set)
}

fn add_uses(e: &Expr<'_>, set: &mut UseDefSet) {
    match &e.kind {
        ExprKind::Name(id) => {
            if id.scope != Scope::Const {
                set.ids.insert(id.clone());
            }
        }
        _ => {
            for c in e.children() {
                add_uses(c, set);
            }
        }
    }
}

/// The identifier a plain `x = rhs` statement defines, with its value.
pub(crate) fn assigned_id<'e, 'a>(e: &'e Expr<'a>) -> Option<(&'e IdPtr, &'a Expr<'a>)> {
    let ExprKind::Assign { lhs, rhs, .. } = &e.kind else {
        return None;
    };
    match &lhs.kind {
        ExprKind::Ref(target) => target.as_name().map(|id| (id, *rhs)),
        _ => None,
    }
}

/// A place liveness is recorded: a statement, or the test of a loop or
/// `when`, which runs between iterations without being a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Point {
    Stmt(StmtKey),
    Cond(StmtKey),
}

/// Where `break`, `next` and `fallthrough` lead from the innermost
/// enclosing loop or switch.
struct Exit {
    brk: UDs,
    next: Option<UDs>,
    fall: Option<UDs>,
}

/// Where a `return` inside an inlined body leads.
struct ReturnTarget {
    after: UDs,
    ret_var: Option<IdPtr>,
}

/// Liveness for one body.
pub struct UseDefs<'a> {
    usage: HashMap<Point, UDs>,
    stmts: Vec<&'a Stmt<'a>>,
    successor: HashMap<StmtKey, Point>,
    /// Second successor of the last statement of a loop body: whatever
    /// follows the loop.
    successor2: HashMap<StmtKey, Point>,
    exits: Vec<Exit>,
    returns: Vec<ReturnTarget>,
}

impl<'a> UseDefs<'a> {
    pub fn analyze(body: &'a Stmt<'a>) -> Self {
        let mut ud = UseDefs {
            usage: HashMap::new(),
            stmts: Vec::new(),
            successor: HashMap::new(),
            successor2: HashMap::new(),
            exits: Vec::new(),
            returns: Vec::new(),
        };
        let empty = Rc::new(UseDefSet::new());
        let live_in = ud.propagate(body, &empty, None, false);
        debug!(
            statements = ud.stmts.len(),
            live_in = %live_in,
            "analyzed use-defs"
        );
        ud
    }

    /// Every statement of the body, in the order first visited.
    pub fn statements(&self) -> &[&'a Stmt<'a>] {
        &self.stmts
    }

    /// Identifiers live on entry to `s`.
    pub fn usage(&self, s: &Stmt<'_>) -> Option<&UDs> {
        self.usage.get(&Point::Stmt(s.key()))
    }

    /// Identifiers live once `s` completes, for statements that record a
    /// successor.
    pub fn live_after(&self, s: &Stmt<'_>) -> Option<UDs> {
        let key = s.key();
        let first = self.successor.get(&key).and_then(|p| self.usage.get(p));
        let second = self.successor2.get(&key).and_then(|p| self.usage.get(p));
        match (first, second) {
            (Some(a), Some(b)) => Some(union(a, b)),
            (Some(a), None) | (None, Some(a)) => Some(a.clone()),
            (None, None) => None,
        }
    }

    /// Whether the value `s` leaves in `id` can be read later.
    pub fn is_live_after(&self, s: &Stmt<'_>, id: &IdPtr) -> bool {
        id.is_global() || self.live_after(s).is_some_and(|uds| uds.contains(id))
    }

    fn record(&mut self, s: &Stmt<'_>, uds: UDs) -> UDs {
        self.usage.insert(Point::Stmt(s.key()), uds.clone());
        uds
    }

    fn note_successor(&mut self, s: &Stmt<'_>, succ: Option<Point>) {
        if let Some(p) = succ {
            self.successor.insert(s.key(), p);
        }
    }

    fn propagate(
        &mut self,
        s: &'a Stmt<'a>,
        succ_uds: &UDs,
        succ: Option<Point>,
        second_pass: bool,
    ) -> UDs {
        if !second_pass {
            self.stmts.push(s);
        }
        match &s.kind {
            StmtKind::List(stmts) => {
                let mut uds = succ_uds.clone();
                for (i, st) in stmts.iter().enumerate().rev() {
                    let next = if i + 1 == stmts.len() {
                        if let Some(p) = self.successor2.get(&s.key()).copied() {
                            self.successor2.insert(st.key(), p);
                        }
                        succ
                    } else {
                        Some(Point::Stmt(stmts[i + 1].key()))
                    };
                    uds = self.propagate(st, &uds, next, second_pass);
                }
                self.record(s, uds)
            }
            StmtKind::Expr(e) => {
                self.note_successor(s, succ);
                let uds = match assigned_id(e) {
                    Some((id, rhs)) => union(&without(succ_uds, id), &expr_uds(rhs)),
                    None => union(succ_uds, &expr_uds(e)),
                };
                self.record(s, uds)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let t = self.propagate(then_branch, succ_uds, succ, second_pass);
                let f = self.propagate(else_branch, succ_uds, succ, second_pass);
                let uds = union(&union(&expr_uds(cond), &t), &f);
                self.record(s, uds)
            }
            StmtKind::While {
                cond,
                cond_stmt,
                body,
            } => {
                let loop_back = match cond_stmt {
                    Some(cs) => Point::Stmt(cs.key()),
                    None => Point::Cond(s.key()),
                };
                if let Some(p) = succ {
                    self.successor2.insert(body.key(), p);
                }
                let cond_uses = expr_uds(cond);

                let first_next = union(&cond_uses, succ_uds);
                let body_uds = self.loop_body(body, succ_uds, first_next, loop_back, second_pass);
                let mut top = self.loop_test(s, cond_stmt, &cond_uses, &body_uds, succ_uds, second_pass);

                // Around again: whatever is live at the top is live at
                // the bottom of the previous iteration.
                let bottom = union(&top, succ_uds);
                let body_uds = self.loop_body(body, succ_uds, bottom, loop_back, true);
                top = self.loop_test(s, cond_stmt, &cond_uses, &body_uds, succ_uds, true);

                // The loop might not run at all.
                self.record(s, union(&top, succ_uds))
            }
            StmtKind::For {
                vars,
                value_var,
                over,
                body,
            } => {
                // The step to the next element: either another pass over
                // the body or leaving the loop.
                let step = Point::Cond(s.key());
                if let Some(p) = succ {
                    self.successor2.insert(body.key(), p);
                }
                let body_uds = self.loop_body(body, succ_uds, succ_uds.clone(), step, second_pass);
                let at_step = union(&body_uds, succ_uds);

                let body_uds = self.loop_body(body, succ_uds, at_step, step, true);
                let at_step = union(&body_uds, succ_uds);
                self.usage.insert(step, at_step.clone());

                let mut f_uds = union(&expr_uds(over), &at_step);
                for id in vars.iter().chain(value_var.iter()) {
                    f_uds = without(&f_uds, id);
                }
                self.record(s, f_uds)
            }
            StmtKind::Switch {
                expr,
                cases,
                default,
            } => {
                let next = self.exits.last().and_then(|e| e.next.clone());
                let mut sw_uds = expr_uds(expr);
                let mut following = succ_uds.clone();
                for case in cases.iter().rev() {
                    self.exits.push(Exit {
                        brk: succ_uds.clone(),
                        next: next.clone(),
                        fall: Some(following.clone()),
                    });
                    let mut uds = self.propagate(case.body, succ_uds, succ, second_pass);
                    self.exits.pop();
                    for e in case.exprs.iter() {
                        uds = union(&uds, &expr_uds(e));
                    }
                    for (binding, _) in case.types.iter() {
                        if let Some(b) = binding {
                            uds = without(&uds, b);
                        }
                    }
                    sw_uds = union(&sw_uds, &uds);
                    following = uds;
                }
                if default.is_none() {
                    sw_uds = union(&sw_uds, succ_uds);
                }
                self.record(s, sw_uds)
            }
            StmtKind::Return(value) => {
                let uses = match value {
                    Some(e) => expr_uds(e),
                    None => Rc::new(UseDefSet::new()),
                };
                let uds = match self.returns.last() {
                    Some(target) => {
                        let after = match &target.ret_var {
                            Some(v) => without(&target.after, v),
                            None => target.after.clone(),
                        };
                        union(&after, &uses)
                    }
                    None => uses,
                };
                self.record(s, uds)
            }
            StmtKind::Break => {
                let uds = self
                    .exits
                    .last()
                    .map_or_else(|| succ_uds.clone(), |e| e.brk.clone());
                self.record(s, uds)
            }
            StmtKind::Next => {
                let uds = self
                    .exits
                    .iter()
                    .rev()
                    .find_map(|e| e.next.clone())
                    .unwrap_or_else(|| succ_uds.clone());
                self.record(s, uds)
            }
            StmtKind::Fallthrough => {
                let uds = self
                    .exits
                    .last()
                    .and_then(|e| e.fall.clone())
                    .unwrap_or_else(|| succ_uds.clone());
                self.record(s, uds)
            }
            StmtKind::Null => self.record(s, succ_uds.clone()),
            StmtKind::Print(args) => {
                let mut uds = succ_uds.clone();
                for a in args.iter() {
                    uds = union(&uds, &expr_uds(a));
                }
                self.record(s, uds)
            }
            StmtKind::Event(e) | StmtKind::Add(e) | StmtKind::Delete(e) => {
                let uds = union(succ_uds, &expr_uds(e));
                self.record(s, uds)
            }
            StmtKind::CheckAnyLen { expr, .. } => {
                let uds = union(succ_uds, &expr_uds(expr));
                self.record(s, uds)
            }
            StmtKind::Init(_) => {
                self.note_successor(s, succ);
                self.record(s, succ_uds.clone())
            }
            StmtKind::CatchReturn { body, ret_var } => {
                self.returns.push(ReturnTarget {
                    after: succ_uds.clone(),
                    ret_var: ret_var.clone(),
                });
                let uds = self.propagate(body, succ_uds, succ, second_pass);
                self.returns.pop();
                self.record(s, uds)
            }
            StmtKind::When {
                cond,
                cond_stmt,
                body,
            } => {
                // An unmet condition suspends, and resuming evaluates the
                // condition again, so the test loops back on itself.
                let body_uds = self.propagate(body, succ_uds, succ, second_pass);
                let cond_uses = expr_uds(cond);
                let mut top = self.loop_test(s, cond_stmt, &cond_uses, &body_uds, succ_uds, second_pass);
                if cond_stmt.is_some() {
                    let again = union(&top, &body_uds);
                    top = self.loop_test(s, cond_stmt, &cond_uses, &again, succ_uds, true);
                }
                self.record(s, top)
            }
        }
    }

    /// One pass over a loop body, with `break` leading past the loop and
    /// `next` to `bottom`.
    fn loop_body(
        &mut self,
        body: &'a Stmt<'a>,
        after: &UDs,
        bottom: UDs,
        loop_back: Point,
        second_pass: bool,
    ) -> UDs {
        self.exits.push(Exit {
            brk: after.clone(),
            next: Some(bottom.clone()),
            fall: None,
        });
        let uds = self.propagate(body, &bottom, Some(loop_back), second_pass);
        self.exits.pop();
        uds
    }

    /// Liveness at the test of loop or `when` statement `s`, and at the
    /// start of its condition prefix if it has one.
    fn loop_test(
        &mut self,
        s: &Stmt<'_>,
        cond_stmt: &Option<&'a Stmt<'a>>,
        cond_uses: &UDs,
        body_uds: &UDs,
        after: &UDs,
        second_pass: bool,
    ) -> UDs {
        let at_test = union(&union(cond_uses, body_uds), after);
        let cond_pt = Point::Cond(s.key());
        self.usage.insert(cond_pt, at_test.clone());
        match cond_stmt {
            Some(cs) => self.propagate(cs, &at_test, Some(cond_pt), second_pass),
            None => at_test,
        }
    }
}
