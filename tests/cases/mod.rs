//! Shared helpers for the end-to-end tests.
#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use zam::values::{Body, BuiltinFunc, Builtins, ScriptFunc, Val};
use zam::vm::ZBody;
use zam::{Engine, EngineOptions, types};

/// Counts how often the impure `hit()` built-in ran.
#[derive(Clone, Default)]
pub struct Hits(pub Rc<Cell<u64>>);

impl Hits {
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

/// An engine with the standard library plus `hit()` (impure, returns the
/// running count) and `square(x)` (pure, never folded).
pub fn engine<'a>() -> (Engine<'a>, Hits) {
    let hits = Hits::default();
    let counter = hits.clone();
    let engine = Engine::new(EngineOptions::default(), move |b: &mut Builtins| {
        zam::stdlib::register_stdlib(b, &zam::stdlib::NetworkClock::new());
        b.register(BuiltinFunc::new(
            "hit",
            types::function(vec![], types::count()),
            move |_| {
                counter.0.set(counter.0.get() + 1);
                Ok(Val::Count(counter.0.get()))
            },
        ));
        b.register(
            BuiltinFunc::new(
                "square",
                types::function(vec![("x".to_string(), types::count())], types::count()),
                |args| match &args[0] {
                    Val::Count(c) => Ok(Val::Count(c * c)),
                    _ => Ok(Val::Count(0)),
                },
            )
            .pure(),
        );
    });
    (engine, hits)
}

/// The bytecode attached as body `index` of `f`.
pub fn bytecode(f: &ScriptFunc, index: usize) -> Rc<ZBody> {
    match &f.bodies()[index] {
        Body::Compiled(z) => z.clone(),
        Body::Interpreted => panic!("{} body {} was not compiled", f.name, index),
    }
}
