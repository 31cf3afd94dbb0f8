//! Configuration options for the ZAM engine.

/// Configuration options for compiling a function body.
///
/// These options control which stages of the pipeline run.
///
/// # Example
///
/// ```
/// use zam_core::api::CompilationOptions;
///
/// let options = CompilationOptions {
///     optimize: false,
///     ..CompilationOptions::default()
/// };
/// assert!(options.remove_unused);
/// ```
#[derive(Debug, Clone)]
pub struct CompilationOptions {
    /// Run liveness analysis and drop assignments whose values are never read.
    ///
    /// Default: true
    pub remove_unused: bool,

    /// Run the peephole optimizer and share frame slots.
    ///
    /// With this off, the body executes exactly as generated, one slot
    /// per identifier.
    ///
    /// Default: true
    pub optimize: bool,

    /// Warn about assignments to user variables that are never used.
    ///
    /// Default: false
    pub usage_warnings: bool,

    /// Fold calls to pure built-ins whose arguments are all constants.
    ///
    /// Default: true
    pub fold_builtins: bool,

    /// Upper bound on reduce/analyze rounds in `RemoveUnused`.
    ///
    /// Each round removes at least one statement, so the bound only
    /// matters for pathological bodies.
    ///
    /// Default: 50
    pub max_reduction_passes: usize,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self {
            remove_unused: true,
            optimize: true,
            usage_warnings: false,
            fold_builtins: true,
            max_reduction_passes: 50,
        }
    }
}

/// Configuration options for executing compiled bodies.
///
/// # Example
///
/// ```
/// use zam_core::api::ExecutionOptions;
///
/// let options = ExecutionOptions {
///     max_depth: 50,
///     max_iterations: Some(10_000),
///     profile: false,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Maximum nesting of script function calls.
    ///
    /// Default: 200
    pub max_depth: usize,

    /// Maximum number of backward branches per invocation (if Some).
    ///
    /// Default: None
    pub max_iterations: Option<usize>,

    /// Count how often each instruction executes.
    ///
    /// Default: false
    pub profile: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_depth: 200,
            max_iterations: None,
            profile: false,
        }
    }
}

/// Default options for an `Engine`.
///
/// # Example
///
/// ```
/// use zam_core::api::{CompilationOptions, EngineOptions, ExecutionOptions};
///
/// let options = EngineOptions {
///     default_compilation_options: CompilationOptions::default(),
///     default_execution_options: ExecutionOptions {
///         max_depth: 32,
///         ..ExecutionOptions::default()
///     },
/// };
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Default options for compilation.
    pub default_compilation_options: CompilationOptions,

    /// Default options for execution.
    pub default_execution_options: ExecutionOptions,
}
