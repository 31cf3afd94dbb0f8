//! Built-in sample functions, with the script text their trees stand for.

use std::rc::Rc;

use zam::ast::{BinaryOp, Stmt, Tree, declare_func, new_local};
use zam::types;
use zam::values::{Builtins, ScriptFunc, Val};

pub type Build = for<'a> fn(Tree<'a>, &Builtins) -> (Rc<ScriptFunc>, &'a Stmt<'a>);

pub struct Sample {
    pub name: &'static str,
    pub about: &'static str,
    pub source: &'static str,
    pub build: Build,
    /// Arguments used when none are given on the command line.
    pub default_args: &'static [u64],
}

pub const SAMPLES: &[Sample] = &[
    Sample {
        name: "sum",
        about: "while loop accumulating into a local",
        source: SUM,
        build: sum,
        default_args: &[10],
    },
    Sample {
        name: "chain",
        about: "temporaries and locals that end up sharing one slot",
        source: CHAIN,
        build: chain,
        default_args: &[4],
    },
    Sample {
        name: "dead",
        about: "dead stores, folded built-ins and an unread clock",
        source: DEAD,
        build: dead,
        default_args: &[7],
    },
    Sample {
        name: "ratio",
        about: "division that fails at run time for d = 0",
        source: RATIO,
        build: ratio,
        default_args: &[0],
    },
    Sample {
        name: "kind",
        about: "type switch, which stays with the interpreter",
        source: KIND,
        build: kind,
        default_args: &[1],
    },
];

pub fn find(name: &str) -> Option<&'static Sample> {
    SAMPLES.iter().find(|s| s.name == name)
}

/// Builder whose nodes point at the first occurrence of `needle`.
fn at<'a>(t: Tree<'a>, source: &str, needle: &str) -> Tree<'a> {
    match source.find(needle) {
        Some(start) => t.at(start, start + needle.len()),
        None => t,
    }
}

const SUM: &str = "\
function sum_to(n: count): count
    {
    local total = 0;
    while ( n > 0 )
        {
        total += n;
        --n;
        }
    return total;
    }
";

fn sum<'a>(t: Tree<'a>, _: &Builtins) -> (Rc<ScriptFunc>, &'a Stmt<'a>) {
    let f = declare_func("sum_to", &[("n", types::count())], types::count());
    let n = &f.params[0];
    let total = new_local(&f, "total", types::count());
    let body = t.block(&[
        t.assign_stmt(t.name(&total), t.count(0)),
        t.while_loop(
            t.binary(BinaryOp::Gt, t.name(n), t.count(0)),
            t.block(&[
                t.expr_stmt(t.add_to(t.name(&total), t.name(n))),
                t.expr_stmt(t.decr(t.name(n))),
            ]),
        ),
        t.return_stmt(Some(t.name(&total))),
    ]);
    (f, body)
}

const CHAIN: &str = "\
function chain(a: count): count
    {
    local x = a * 2 + 1;
    local y = x * 3 + 2;
    return y;
    }
";

fn chain<'a>(t: Tree<'a>, _: &Builtins) -> (Rc<ScriptFunc>, &'a Stmt<'a>) {
    let f = declare_func("chain", &[("a", types::count())], types::count());
    let a = &f.params[0];
    let x = new_local(&f, "x", types::count());
    let y = new_local(&f, "y", types::count());
    let body = t.block(&[
        t.assign_stmt(
            t.name(&x),
            t.binary(BinaryOp::Add, t.binary(BinaryOp::Times, t.name(a), t.count(2)), t.count(1)),
        ),
        t.assign_stmt(
            t.name(&y),
            t.binary(BinaryOp::Add, t.binary(BinaryOp::Times, t.name(&x), t.count(3)), t.count(2)),
        ),
        t.return_stmt(Some(t.name(&y))),
    ]);
    (f, body)
}

const DEAD: &str = "\
function dead(a: count): count
    {
    local stamp = network_time();
    local width = strlen(to_upper(\"zeek\"));
    local scratch = a * width;
    return a + width;
    }
";

fn dead<'a>(t: Tree<'a>, builtins: &Builtins) -> (Rc<ScriptFunc>, &'a Stmt<'a>) {
    let f = declare_func("dead", &[("a", types::count())], types::count());
    let a = &f.params[0];
    let stamp = new_local(&f, "stamp", types::time());
    let width = new_local(&f, "width", types::count());
    let scratch = new_local(&f, "scratch", types::count());
    let mut stmts = Vec::new();
    if let Some(now) = builtins.id("network_time") {
        stmts.push(t.assign_stmt(t.name(&stamp), t.call_global(&now, &[])));
    }
    let len = match (builtins.id("strlen"), builtins.id("to_upper")) {
        (Some(strlen), Some(upper)) => {
            t.call_global(&strlen, &[t.call_global(&upper, &[t.string("zeek")])])
        }
        _ => t.count(4),
    };
    stmts.push(t.assign_stmt(t.name(&width), len));
    stmts.push(t.assign_stmt(
        t.name(&scratch),
        t.binary(BinaryOp::Times, t.name(a), t.name(&width)),
    ));
    stmts.push(t.return_stmt(Some(t.binary(BinaryOp::Add, t.name(a), t.name(&width)))));
    (f, t.block(&stmts))
}

const RATIO: &str = "\
function ratio(d: count): count
    {
    return 100 / d;
    }
";

fn ratio<'a>(t: Tree<'a>, _: &Builtins) -> (Rc<ScriptFunc>, &'a Stmt<'a>) {
    let f = declare_func("ratio", &[("d", types::count())], types::count());
    let d = &f.params[0];
    let div = at(t, RATIO, "100 / d");
    let body = at(t, RATIO, "return 100 / d;")
        .return_stmt(Some(div.binary(BinaryOp::Divide, div.count(100), div.name(d))));
    (f, body)
}

const KIND: &str = "\
function kind(v: any)
    {
    switch ( v )
        {
        case type count: print \"count\";
        case type string: print \"string\";
        }
    }
";

fn kind<'a>(t: Tree<'a>, _: &Builtins) -> (Rc<ScriptFunc>, &'a Stmt<'a>) {
    let f = declare_func("kind", &[("v", types::any())], types::void());
    let v = &f.params[0];
    let body = at(t, KIND, "switch ( v )").switch(
        t.name(v),
        vec![
            t.type_case(&[(None, types::count())], t.print(&[t.string("count")])),
            t.type_case(&[(None, types::string())], t.print(&[t.string("string")])),
        ],
        None,
    );
    (f, body)
}

/// Command-line arguments as values of the sample's parameter types.
pub fn args_for(func: &ScriptFunc, raw: &[u64]) -> Vec<Val> {
    func.params
        .iter()
        .zip(raw)
        .map(|(param, n)| match param.ty.tag() {
            types::TypeTag::Int => Val::Int(*n as i64),
            _ => Val::Count(*n),
        })
        .collect()
}
