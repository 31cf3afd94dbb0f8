mod samples;

use std::rc::Rc;

use bumpalo::Bump;
use clap::Parser;
use miette::{Result, bail};
use zam::ast::Tree;
use zam::codegen::generate;
use zam::diagnostics::Reporter;
use zam::interp::{Interpreter, Runtime};
use zam::optimizer::{compact, optimize};
use zam::reduce::Reducer;
use zam::stdlib::{NetworkClock, register_stdlib};
use zam::usedefs::remove_unused;
use zam::values::{Body, Builtins, EventLog};
use zam::{CompilationOptions, Error, ExecutionOptions, render_error};

/// ZAM - compile and run sample script functions, showing each stage
#[derive(Parser, Debug)]
#[command(name = "zam")]
#[command(about = "Run a sample function through the ZAM pipeline", long_about = None)]
struct Args {
    /// Sample to run (omit to list them)
    sample: Option<String>,

    /// Arguments for the sample's parameters
    args: Vec<u64>,

    /// Print the tree after reduction
    #[arg(long)]
    debug_reduce: bool,

    /// Print the bytecode before and after optimization
    #[arg(long)]
    debug_bytecode: bool,

    /// Keep assignments whose values are never read
    #[arg(long)]
    no_remove_unused: bool,

    /// Skip the peephole passes and slot sharing
    #[arg(long)]
    no_optimize: bool,

    /// Warn about unused assignments to named variables
    #[arg(long)]
    usage_warnings: bool,

    /// Print per-instruction execution counts
    #[arg(long)]
    profile: bool,

    /// Maximum loop iterations per invocation
    #[arg(long)]
    max_iterations: Option<usize>,
}

fn list_samples() {
    println!("Samples:");
    for s in samples::SAMPLES {
        println!("  {:8} {}", s.name, s.about);
    }
}

fn run_sample(sample: &samples::Sample, args: &Args) -> Result<()> {
    let arena = Bump::new();
    let reporter = Reporter::new();
    let t = Tree::new(&arena, &reporter);
    let clock = NetworkClock::new();
    let mut builtins = Builtins::new();
    register_stdlib(&mut builtins, &clock);

    let (func, body) = (sample.build)(t, &builtins);
    let options = CompilationOptions {
        remove_unused: !args.no_remove_unused,
        optimize: !args.no_optimize,
        usage_warnings: args.usage_warnings,
        ..CompilationOptions::default()
    };

    let reducer = Reducer::new(t, &builtins, &func, &options);
    let mut reduced = reducer.reduce_body(body);
    if options.remove_unused {
        reduced = remove_unused(&reducer, reduced, &options);
    }
    let diagnostics = reporter.take();
    if diagnostics.iter().any(|d| d.severity == zam::Severity::Error) {
        render_error(&Error::Compilation { diagnostics }, sample.source);
        bail!("{} did not compile", sample.name);
    }
    if !diagnostics.is_empty() {
        render_error(&Error::Compilation { diagnostics }, sample.source);
    }
    if args.debug_reduce {
        println!("=== Reduced ===");
        print!("{}", reduced);
        println!();
    }

    let interpreter = Interpreter::new();
    let index = interpreter.attach(&func, reduced);
    match generate(&func, reduced) {
        Ok(mut code) => {
            if args.debug_bytecode {
                println!("=== Generated ===");
                print!("{}", code);
                println!();
            }
            if options.optimize {
                let stats = optimize(&mut code);
                if args.debug_bytecode {
                    println!("=== Optimized ({:?}) ===", stats);
                    print!("{}", code);
                    println!();
                }
            }
            let zbody = compact(code);
            if args.debug_bytecode {
                println!("=== Final ===");
                print!("{:?}", zbody);
                println!();
            }
            func.replace_body(index, Body::Compiled(Rc::new(zbody)));
        }
        Err(e) => {
            tracing::info!(func = %func.name, "running interpreted: {}", e);
            let diagnostics = vec![e.to_diagnostic()];
            render_error(&Error::Compilation { diagnostics }, sample.source);
        }
    }

    let raw = if args.args.is_empty() {
        sample.default_args
    } else {
        &args.args[..]
    };
    let values = samples::args_for(&func, raw);
    let events = EventLog::new();
    let rt = Runtime::new(&builtins, &events)
        .with_options(ExecutionOptions {
            max_iterations: args.max_iterations,
            profile: args.profile,
            ..ExecutionOptions::default()
        })
        .with_trees(&interpreter);

    let result = rt.invoke(&func, values);
    for line in events.printed() {
        println!("{}", line);
    }
    match result {
        Ok(v) => println!("{} => {}", func.name, v),
        Err(e) => {
            render_error(&e.into(), sample.source);
            bail!("{} failed", sample.name);
        }
    }

    if args.profile {
        if let Body::Compiled(z) = &func.bodies()[index] {
            println!("=== Profile ===");
            for (pc, (inst, count)) in z.insts.iter().zip(z.profile()).enumerate() {
                println!("  {:4} {:8}  {}", pc, count, inst);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    use tracing_subscriber::{EnvFilter, fmt};

    // RUST_LOG controls the level; default to WARN if not set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let Some(name) = &args.sample else {
        list_samples();
        return Ok(());
    };
    let Some(sample) = samples::find(name) else {
        list_samples();
        bail!("unknown sample '{}'", name);
    };
    run_sample(sample, &args)
}
