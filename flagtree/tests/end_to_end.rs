//! Exercises the derive macro and the four core subsystems together, the way
//! an embedder actually uses them: a record tagged with `#[derive(Params)]`,
//! wired into a `Runtime`, driven by a raw argument vector.

use flagtree::error::{ConflictKind, FieldError};
use flagtree::{impl_param_value_from_text, FromParamText, Params, Runtime, SpecError};

fn values(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[derive(Default, Debug, Params)]
struct Simple {
    #[flagtree(flag = "n")]
    n: i32,
    #[flagtree(arg = "0:")]
    rest: Vec<String>,
}

#[test]
fn simple_flag_and_positional_residue() {
    let mut runtime: Runtime<()> = Runtime::new();
    let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
    let seen_in_handler = seen.clone();
    runtime
        .register_exec(&[], move |p: Simple| {
            *seen_in_handler.lock().unwrap() = Some((p.n, p.rest));
            Ok(())
        })
        .unwrap();
    runtime.execute(values(&["prog", "--n", "3", "a", "b"])).unwrap();
    let (n, rest) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(n, 3);
    assert_eq!(rest, vec!["a".to_string(), "b".to_string()]);
}

#[derive(Default, Debug, Params)]
struct Elidable {
    #[flagtree(flag = "v")]
    v: bool,
}

#[derive(Default, Debug, Params)]
struct AfterElide {
    #[flagtree(arg = "0:")]
    rest: Vec<String>,
}

#[test]
fn elided_bool_flag_leaves_following_token_as_a_subcommand() {
    // A bare flag-routing check (no decode): an elidable bool consumes no
    // value, so the following `STRING` token is free to be read as the next
    // subcommand name rather than the flag's value.
    let mut mux: flagtree::Mux<()> = flagtree::Mux::new();
    mux.register_exec(&[], |_: Elidable| Ok(())).unwrap();
    mux.register_exec(&["target"], |_: AfterElide| Ok(())).unwrap();
    let (input, node) = mux.route(values(&["prog", "-v", "target"])).unwrap();
    assert_eq!(input.flags, vec![("v".to_string(), "true".to_string())]);
    assert_eq!(input.target, vec!["target".to_string()]);
    assert!(node.has_exec());
}

#[derive(Default, Debug, Params)]
struct RootFlags {
    #[flagtree(flag = "g")]
    g: String,
}

#[derive(Default, Debug, Params)]
struct SubFlags {
    #[flagtree(inline = "")]
    root: RootFlags,
    #[flagtree(flag = "s")]
    s: String,
}

#[test]
fn subcommand_descent_records_flags_in_encounter_order() {
    let mut runtime: Runtime<()> = Runtime::new();
    runtime.register_exec(&[], |_: RootFlags| Ok(())).unwrap();
    let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
    let seen_in_sub = seen.clone();
    runtime
        .register_exec(&["sub"], move |p: SubFlags| {
            *seen_in_sub.lock().unwrap() = Some((p.root.g, p.s));
            Ok(())
        })
        .unwrap();
    runtime
        .execute(values(&["prog", "--g", "X", "sub", "--s", "Y"]))
        .unwrap();
    assert_eq!(
        seen.lock().unwrap().clone().unwrap(),
        ("X".to_string(), "Y".to_string())
    );
}

#[test]
fn unknown_flag_is_reported_as_a_parse_error() {
    let mut runtime: Runtime<()> = Runtime::new();
    runtime.register_exec(&[], |_: Simple| Ok(())).unwrap();
    let err = runtime.execute(values(&["prog", "--wat"])).unwrap_err();
    assert!(matches!(
        err,
        flagtree::ExecuteError::Parse(flagtree::ParseError::UnknownFlag { name }) if name == "wat"
    ));
}

#[derive(Default, Debug, Params)]
struct ConflictingRanges {
    #[flagtree(arg = ":5")]
    head: Vec<String>,
    #[flagtree(arg = "4:")]
    tail: Vec<String>,
}

#[test]
fn intersecting_argument_ranges_fail_spec_construction() {
    let err = flagtree::ParamSpec::<ConflictingRanges>::get().unwrap_err();
    match err {
        SpecError::Conflict(ConflictKind::Arg, conflict) => {
            assert!(conflict.original.contains(":5"));
            assert!(conflict.update.contains("4:"));
        }
        other => panic!("expected an argument conflict, got {other:?}"),
    }
}

#[derive(Default, Debug, Params)]
struct SelfReferential {
    #[flagtree(inline = "")]
    again: Option<Box<SelfReferential>>,
}

#[test]
fn self_inline_cycle_is_rejected() {
    let err = flagtree::ParamSpec::<SelfReferential>::get().unwrap_err();
    assert!(matches!(err, SpecError::Conflict(ConflictKind::Inline, _)));
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Instant(u64);

impl FromParamText for Instant {
    fn from_param_text(s: &str) -> Result<Self, FieldError> {
        // Accepts a bare epoch-seconds integer; good enough to exercise the
        // custom-text-unmarshal dispatch path without pulling in a date crate.
        s.parse::<u64>()
            .map(Instant)
            .map_err(|e| FieldError::Invalid {
                reason: format!("`{s}` is not a valid instant: {e}"),
            })
    }
}

impl_param_value_from_text!(Instant);

#[derive(Default, Debug, Params)]
struct Timestamped {
    #[flagtree(flag = "t")]
    t: Instant,
}

#[test]
fn custom_text_unmarshal_round_trips_through_its_own_equality() {
    let mut runtime: Runtime<()> = Runtime::new();
    let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
    let seen_in_handler = seen.clone();
    runtime
        .register_exec(&[], move |p: Timestamped| {
            *seen_in_handler.lock().unwrap() = Some(p.t);
            Ok(())
        })
        .unwrap();
    runtime.execute(values(&["prog", "--t", "482197250"])).unwrap();
    assert_eq!(seen.lock().unwrap().unwrap(), Instant(482_197_250));
}

#[derive(Default, Debug, Params)]
struct Q {
    x: i32,
}

#[derive(Default, Debug, Params)]
struct P {
    #[flagtree(inline = "")]
    inner: Q,
}

#[test]
fn outer_rule_wins_over_inner_rule_because_outer_runs_last() {
    let mut runtime: Runtime<()> = Runtime::new();
    runtime.register_rule::<Q>(|q| q.x = 42);
    runtime.register_rule::<P>(|p| p.inner.x = 7);
    let input = flagtree::Input {
        program: "prog".to_string(),
        target: Vec::new(),
        args: Vec::new(),
        flags: Vec::new(),
    };
    let p: P = runtime.materialize(&input).unwrap();
    assert_eq!(p.inner.x, 7);
}

#[derive(Default, Debug, Params)]
struct Global {
    #[flagtree(flag = "verbose")]
    verbose: bool,
}

#[derive(Default, Debug, Params)]
struct Mid {
    #[flagtree(inline = "")]
    global: Global,
    #[flagtree(flag = "mid")]
    mid: u32,
}

#[derive(Default, Debug, Params)]
struct Outer {
    #[flagtree(inline = "")]
    mid: Mid,
    #[flagtree(flag = "outer")]
    outer: u32,
}

#[test]
fn three_level_inline_chain_initializes_bottom_up() {
    let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::<&'static str>::new()));
    let mut runtime: Runtime<()> = Runtime::new();
    let o1 = order.clone();
    runtime.register_rule::<Global>(move |_| o1.lock().unwrap().push("global"));
    let o2 = order.clone();
    runtime.register_rule::<Mid>(move |_| o2.lock().unwrap().push("mid"));
    let o3 = order.clone();
    runtime.register_rule::<Outer>(move |_| o3.lock().unwrap().push("outer"));
    let input = flagtree::Input {
        program: "prog".to_string(),
        target: Vec::new(),
        args: Vec::new(),
        flags: Vec::new(),
    };
    let _: Outer = runtime.materialize(&input).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["global", "mid", "outer"]);
}

fn looks_like_a_duration(s: &str) -> bool {
    s.ends_with('s') || s.ends_with('m') || s.ends_with('h')
}

#[derive(Default, Debug, Params)]
struct CustomElide {
    #[flagtree(flag = "timeout", elide_with = "looks_like_a_duration")]
    timeout: String,
}

#[test]
fn elide_with_installs_the_named_consumable() {
    let spec = flagtree::ParamSpec::<CustomElide>::get().unwrap();
    let flag = spec.flag_by_name("timeout").unwrap();
    assert!(flag.elide.allow);
    assert!((flag.elide.consumable)("30s"));
    assert!(!(flag.elide.consumable)("nope"));
}

#[derive(Default, Debug, Params)]
struct BareElide {
    #[flagtree(flag = "tag", elide)]
    tag: String,
}

#[test]
fn bare_elide_marker_allows_a_non_bool_flag_to_elide() {
    let spec = flagtree::ParamSpec::<BareElide>::get().unwrap();
    let flag = spec.flag_by_name("tag").unwrap();
    assert!(flag.elide.allow);
}

#[test]
fn inline_flags_are_reachable_with_prefix_concatenation() {
    #[derive(Default, Debug, Params)]
    struct Inner {
        #[flagtree(flag = "x")]
        x: i32,
    }
    #[derive(Default, Debug, Params)]
    struct Outer2 {
        #[flagtree(inline = "inner-")]
        inner: Inner,
    }
    let spec = flagtree::ParamSpec::<Outer2>::get().unwrap();
    assert!(spec.flag_by_name("inner-x").is_some());
    assert!(spec.flag_by_name("x").is_none());
}
