//! A small worked example wiring `flagtree` end to end: a global inline flag
//! set, a custom text-unmarshaled field, default rules, and two levels of
//! subcommand descent.
//!
//! Not part of the library's public contract — this binary exists to show
//! one reasonable way to assemble [`Runtime`], map its errors to exit codes,
//! and read program arguments, the same role the origin implementation left
//! to its own top-level application object.

#![forbid(unsafe_code)]

use flagtree::error::FieldError;
use flagtree::{impl_param_value_from_text, ExecuteError, FromParamText, HandlerError, Params, Runtime, Severity};

#[allow(unused_imports)]
use log::{debug, error, warn};

/// A custom text-unmarshaled type: a loudness percentage, `"0%"..="100%"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Volume(f32);

impl FromParamText for Volume {
    fn from_param_text(s: &str) -> Result<Self, FieldError> {
        let trimmed = s.strip_suffix('%').unwrap_or(s);
        let pct: f32 = trimmed
            .parse()
            .map_err(|e| FieldError::Invalid {
                reason: format!("`{s}` is not a volume percentage: {e}"),
            })?;
        if !(0.0..=100.0).contains(&pct) {
            return Err(FieldError::Invalid {
                reason: format!("volume `{s}` must be between 0% and 100%"),
            });
        }
        Ok(Volume(pct))
    }
}

impl_param_value_from_text!(Volume);

/// Flags shared by every command, inlined (with no prefix) into each leaf's
/// own parameter record so they're parseable at every level of descent.
#[derive(Default, Debug, Params)]
struct GlobalParams {
    #[flagtree(flag = "verbose v")]
    verbose: bool,
}

#[derive(Default, Debug, Params)]
struct GreetParams {
    #[flagtree(inline = "")]
    global: GlobalParams,
    #[flagtree(flag = "times")]
    times: u32,
    #[flagtree(flag = "volume")]
    volume: Volume,
    #[flagtree(arg = "0:")]
    names: Vec<String>,
}

/// `greet loud` re-inlines `greet`'s own params (which in turn re-inlines
/// `GlobalParams`), adding one more flag of its own, so all three levels'
/// flags get folded into this leaf's ancestor nodes.
#[derive(Default, Debug, Params)]
struct LoudGreetParams {
    #[flagtree(inline = "")]
    base: GreetParams,
    #[flagtree(flag = "repeat")]
    repeat: u32,
}

fn handle_greet(p: GreetParams) -> Result<(), HandlerError> {
    let who = if p.names.is_empty() {
        vec!["world".to_string()]
    } else {
        p.names
    };
    for _ in 0..p.times.max(1) {
        for name in &who {
            if p.global.verbose {
                debug!("greeting {name} at volume {:?}", p.volume);
            }
            println!("Hello, {name}! ({}% volume)", p.volume.0);
        }
    }
    Ok(())
}

fn handle_greet_loud(p: LoudGreetParams) -> Result<(), HandlerError> {
    let who: Vec<String> = if p.base.names.is_empty() {
        vec!["WORLD".to_string()]
    } else {
        p.base.names.iter().map(|n| n.to_uppercase()).collect()
    };
    for _ in 0..p.repeat.max(1) {
        for name in &who {
            if p.base.global.verbose {
                debug!("loudly greeting {name} at volume {:?}", p.base.volume);
            }
            println!("{name}!!! ({}% volume)", p.base.volume.0);
        }
    }
    Ok(())
}

fn build_runtime() -> Result<Runtime<()>, flagtree::MuxError> {
    let mut runtime: Runtime<()> = Runtime::new();
    runtime.register_rule::<GreetParams>(|g| g.volume = Volume(50.0));
    runtime.register_exec(&["greet"], handle_greet)?;
    runtime.register_exec(&["greet", "loud"], handle_greet_loud)?;
    Ok(runtime)
}

fn exit_code_for(err: &ExecuteError) -> i32 {
    match err.severity() {
        Severity::User => 1,
        Severity::Developer => 2,
        Severity::Internal => 70,
    }
}

fn main() {
    env_logger::init();

    let runtime = match build_runtime() {
        Ok(r) => r,
        Err(e) => {
            error!("failed to build command tree: {e}");
            std::process::exit(2);
        }
    };

    let values: Vec<String> = std::env::args().collect();
    debug!("argv = {values:?}");

    if let Err(e) = runtime.execute(values) {
        match e.severity() {
            Severity::User => eprintln!("error: {e}"),
            Severity::Developer | Severity::Internal => error!("{e}"),
        }
        std::process::exit(exit_code_for(&e));
    }
}
