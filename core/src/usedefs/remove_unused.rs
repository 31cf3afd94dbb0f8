use tracing::{debug, trace};

use crate::api::CompilationOptions;
use crate::ast::{ExprKind, IdPtr, Stmt, StmtKind};
use crate::reduce::Reducer;
use crate::usedefs::analysis::assigned_id;
use crate::usedefs::UseDefs;
use crate::{Vec, format};

/// Drop assignments to locals that nothing reads, along with `init`
/// entries for aggregates that are never used.
///
/// Each removal can make other values dead, so the body is reduced and
/// analyzed again until a round finds nothing more to drop. Usage
/// warnings, when enabled, come from the first round only, before any
/// removal could have caused them.
pub fn remove_unused<'a>(
    reducer: &Reducer<'a, '_>,
    body: &'a Stmt<'a>,
    options: &CompilationOptions,
) -> &'a Stmt<'a> {
    let mut body = body;
    for round in 1..=options.max_reduction_passes {
        let ud = UseDefs::analyze(body);
        let report = round == 1 && options.usage_warnings;
        let marked = ud.mark_unused(reducer, report);
        if marked == 0 {
            break;
        }
        debug!(round, marked, "removing unused assignments");
        body = reducer.reduce_body(body);
        if reducer.t.reporter.has_errors() {
            break;
        }
    }
    body
}

impl<'a> UseDefs<'a> {
    /// Schedule every removable statement with the reducer, returning how
    /// many were scheduled.
    pub fn mark_unused(&self, reducer: &Reducer<'a, '_>, report: bool) -> usize {
        let mut marked = 0;
        for s in self.statements() {
            match &s.kind {
                StmtKind::Init(ids) => {
                    let kept: Vec<IdPtr> = ids
                        .iter()
                        .filter(|id| id.ty.is_atomic() || self.is_live_after(s, id))
                        .cloned()
                        .collect();
                    if kept.len() < ids.len() {
                        trace!(stmt = %s, kept = kept.len(), "trimming init");
                        reducer.trim_init(s.key(), kept);
                        marked += 1;
                    }
                }
                StmtKind::Expr(e) => {
                    let Some((id, rhs)) = assigned_id(e) else {
                        continue;
                    };
                    // Impure calls, events and schedules must still run.
                    if reducer.has_side_effects(rhs) {
                        continue;
                    }
                    let degenerate = matches!(&rhs.kind, ExprKind::Name(r) if r == id);
                    if degenerate || self.unused(s, id, reducer, report) {
                        trace!(stmt = %s, "omitting");
                        reducer.omit(s.key());
                        marked += 1;
                    }
                }
                _ => {}
            }
        }
        marked
    }

    fn unused(&self, s: &Stmt<'_>, id: &IdPtr, reducer: &Reducer<'a, '_>, report: bool) -> bool {
        if self.is_live_after(s, id) {
            return false;
        }
        if report && !id.is_temp() {
            let StmtKind::Expr(e) = &s.kind else {
                return true;
            };
            reducer
                .t
                .reporter
                .warning(s.span, format!("{} assignment unused: {}", id.name, e));
        }
        true
    }
}
