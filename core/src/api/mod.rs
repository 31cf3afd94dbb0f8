//! Public API for compiling and running script function bodies.
//!
//! A body goes through four stages:
//!
//! 1. **Reduction**: the tree is rewritten into reduced form, folding
//!    constants and spilling complex operands to temporaries.
//! 2. **RemoveUnused** (optional): assignments nobody reads are dropped.
//! 3. **Code generation**: the reduced tree becomes intermediate bytecode.
//! 4. **Optimization** (optional): peephole passes and frame-slot sharing,
//!    then compaction into an executable body.
//!
//! [`Engine`] runs the pipeline and keeps the interpreter fallback for
//! bodies the code generator cannot express.

pub mod engine;
pub mod error;
pub mod options;

#[cfg(test)]
mod engine_test;

pub use engine::{CompiledFunc, Engine, FuncDecl, compile_function};
pub use error::{Diagnostic, Error, RelatedInfo, Severity, Span};
pub use options::{CompilationOptions, EngineOptions, ExecutionOptions};
