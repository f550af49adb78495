//! A trie of commands keyed by target path, with per-node flag inheritance,
//! conflict policies, and an execute loop that interleaves flag-consumption
//! with subcommand descent.
//!
//! Registering a handler at `a/b/c` also folds its flags into the flag tables
//! at `a` and `a/b`, so the execute loop can parse leading flags before it has
//! decided which subcommand is actually being invoked.

use std::collections::HashMap;

use log::trace;

use crate::decode::DecodeConfig;
use crate::error::{ExecuteError, HandlerError, MuxError};
use crate::parser::{FlagTable, FlagTableEntry, Parser, TokenKind};
use crate::rules::Rules;
use crate::spec::{ParamSpec, Params, SpecConfig};

/// What a handler actually receives: the resolved command path, the raw
/// positional residue, and the flags encountered along the way to it, in the
/// order they appeared on the original token stream.
#[derive(Debug, Clone, Default)]
pub struct Input {
    pub program: String,
    pub target: Vec<String>,
    pub args: Vec<String>,
    pub flags: Vec<(String, String)>,
}

/// Type-erased binding stored at a trie node: resolves `Input` into a
/// concrete `P`, by way of [`Rules::process`] then [`crate::decode::Decoder::decode`],
/// then calls the user's closure on it.
trait ExecBinding<I>: Send + Sync {
    fn call(
        &self,
        input: &Input,
        rules: &Rules,
        spec_config: &SpecConfig,
        decode_config: &DecodeConfig,
    ) -> Result<(), HandlerError>;
}

struct HandlerBinding<P, F> {
    handler: F,
    _marker: std::marker::PhantomData<fn(P)>,
}

impl<I, P, F> ExecBinding<I> for HandlerBinding<P, F>
where
    P: Params + Default,
    F: Fn(P) -> Result<(), HandlerError> + Send + Sync,
{
    fn call(
        &self,
        input: &Input,
        rules: &Rules,
        spec_config: &SpecConfig,
        decode_config: &DecodeConfig,
    ) -> Result<(), HandlerError> {
        let spec = ParamSpec::<P>::get_with_config(spec_config)?;
        let mut value = P::default();
        rules.process(spec, &mut value);
        crate::decode::Decoder::decode_with_config(input, spec, &mut value, decode_config)?;
        (self.handler)(value)
    }
}

/// A single node of the command trie. Carries the union of every flag
/// declared anywhere at-or-below this node's path, so the execute loop can
/// parse leading flags without yet knowing which descendant will be chosen.
pub struct Node<I> {
    children: HashMap<String, Node<I>>,
    exec: Option<Box<dyn ExecBinding<I>>>,
    info: Option<I>,
    flags: FlagTable,
}

impl<I> Default for Node<I> {
    fn default() -> Self {
        Node {
            children: HashMap::new(),
            exec: None,
            info: None,
            flags: FlagTable::new(),
        }
    }
}

impl<I> Node<I> {
    pub fn flags(&self) -> &FlagTable {
        &self.flags
    }

    pub fn info(&self) -> Option<&I> {
        self.info.as_ref()
    }

    pub fn has_exec(&self) -> bool {
        self.exec.is_some()
    }
}

/// Whether an ancestor's flag table may be re-declared verbatim by a
/// descendant. Mirrors the source's "most configurations tolerate exact
/// matches"; [`MuxConfig::strict`] additionally requires the declared field
/// type to match before tolerating the repeat.
///
/// Also carries the two other functional-options knobs the origin
/// `ukcore.MuxConfig`/`ukcoreopt` option set exposes alongside flag-check
/// strictness: `allow_overwrite` (origin `AllowOverwrite`/`MuxOverwrite`) lets
/// a later `register_exec`/`register_info` replace an already-installed
/// binding instead of failing with a conflict, and `default_exec`
/// (origin `DefaultCommand`/`ExecDefault`) installs the handler `execute`
/// falls back to at a node nothing was ever registered at, in place of
/// `MuxError::TargetNotExist`.
pub struct MuxConfig<I = ()> {
    pub strict: bool,
    pub allow_overwrite: bool,
    default_exec: Option<Box<dyn ExecBinding<I>>>,
}

impl<I> Default for MuxConfig<I> {
    fn default() -> Self {
        MuxConfig {
            strict: false,
            allow_overwrite: false,
            default_exec: None,
        }
    }
}

impl<I> MuxConfig<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Installs the handler `execute` invokes at any node that was reached
    /// by routing but never had a handler registered at it, in place of
    /// `MuxError::TargetNotExist`. Mirrors the origin `muxHandleUnspecified`
    /// default being overridable via `ukcoreopt.ExecDefault`.
    pub fn with_default_exec<P>(
        mut self,
        handler: impl Fn(P) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Self
    where
        P: Params + Default,
        I: 'static,
    {
        self.default_exec = Some(Box::new(HandlerBinding {
            handler,
            _marker: std::marker::PhantomData,
        }));
        self
    }
}

/// The command trie plus its configuration. Mutated only during registration
/// (`&mut self` methods); read-only during [`Mux::route`] (`&self`).
pub struct Mux<I = ()> {
    root: Node<I>,
    config: MuxConfig<I>,
    spec_config: SpecConfig,
    decode_config: DecodeConfig,
}

impl<I> Default for Mux<I> {
    fn default() -> Self {
        Mux {
            root: Node::default(),
            config: MuxConfig::default(),
            spec_config: SpecConfig::default(),
            decode_config: DecodeConfig::default(),
        }
    }
}

fn flag_table_for<T>(spec: &ParamSpec<T>) -> FlagTable {
    let mut table = FlagTable::new();
    for flag in spec.flags() {
        for name in &flag.names {
            table.insert(
                name.clone(),
                FlagTableEntry {
                    elide: flag.elide.clone(),
                    field_type: flag.field_type,
                },
            );
        }
    }
    table
}

impl<I> Mux<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MuxConfig<I>) -> Self {
        Mux {
            root: Node::default(),
            config,
            spec_config: SpecConfig::default(),
            decode_config: DecodeConfig::default(),
        }
    }

    pub fn with_spec_config(spec_config: SpecConfig) -> Self {
        Mux {
            spec_config,
            ..Self::default()
        }
    }

    pub fn with_decode_config(decode_config: DecodeConfig) -> Self {
        Mux {
            decode_config,
            ..Self::default()
        }
    }

    /// Builds a `Mux` with every configuration knob supplied explicitly.
    pub fn configured(config: MuxConfig<I>, spec_config: SpecConfig, decode_config: DecodeConfig) -> Self {
        Mux {
            root: Node::default(),
            config,
            spec_config,
            decode_config,
        }
    }

    pub fn spec_config(&self) -> &SpecConfig {
        &self.spec_config
    }

    pub fn decode_config(&self) -> &DecodeConfig {
        &self.decode_config
    }

    fn walk_mut(&mut self, target: &[&str], flags: &FlagTable) -> Result<&mut Node<I>, MuxError> {
        let mut node = &mut self.root;
        merge_flags(node, flags, self.config.strict, &[])?;
        let mut so_far: Vec<String> = Vec::new();
        for segment in target {
            so_far.push((*segment).to_string());
            node = node.children.entry((*segment).to_string()).or_default();
            merge_flags(node, flags, self.config.strict, &so_far)?;
        }
        Ok(node)
    }

    /// Registers a handler for `P` at `target`, folding `P`'s flags into every
    /// ancestor node's flag table along the way. Fails with
    /// [`MuxError::ExecConflict`] if `target` already has a handler, unless
    /// [`MuxConfig::allow_overwrite`] is set, in which case the existing
    /// handler is replaced.
    pub fn register_exec<P>(
        &mut self,
        target: &[&str],
        handler: impl Fn(P) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Result<(), MuxError>
    where
        P: Params + Default,
        I: 'static,
    {
        let spec = ParamSpec::<P>::get_with_config(&self.spec_config).map_err(|source| MuxError::Spec {
            target: target.iter().map(|s| s.to_string()).collect(),
            source,
        })?;
        let table = flag_table_for(spec);
        let allow_overwrite = self.config.allow_overwrite;
        let node = self.walk_mut(target, &table)?;
        if node.exec.is_some() && !allow_overwrite {
            return Err(MuxError::ExecConflict {
                target: target.iter().map(|s| s.to_string()).collect(),
            });
        }
        node.exec = Some(Box::new(HandlerBinding {
            handler,
            _marker: std::marker::PhantomData,
        }));
        Ok(())
    }

    /// Installs opaque metadata at `target`, for help/meta collaborators.
    pub fn register_info(&mut self, target: &[&str], info: I) -> Result<(), MuxError> {
        let empty = FlagTable::new();
        let allow_overwrite = self.config.allow_overwrite;
        let node = self.walk_mut(target, &empty)?;
        if node.info.is_some() && !allow_overwrite {
            return Err(MuxError::InfoConflict {
                target: target.iter().map(|s| s.to_string()).collect(),
            });
        }
        node.info = Some(info);
        Ok(())
    }

    /// Looks up the node at `target`, failing if any segment of the path is
    /// unregistered.
    pub fn meta(&self, target: &[&str]) -> Result<&Node<I>, MuxError> {
        let mut node = &self.root;
        for segment in target {
            node = node.children.get(*segment).ok_or_else(|| MuxError::TargetNotExist {
                target: target.iter().map(|s| s.to_string()).collect(),
            })?;
        }
        Ok(node)
    }

    /// Runs the parse/descend loop over `values`, returning the resolved
    /// `Input` together with the trie node it settled on (which may carry no
    /// handler, if nothing was registered at that exact path).
    pub fn route(&self, values: Vec<String>) -> Result<(Input, &Node<I>), ExecuteError> {
        let mut values = values.into_iter();
        let program = values.next().ok_or(MuxError::EmptyValues)?;
        let mut parser = Parser::new(values.collect());
        let mut input = Input {
            program,
            target: Vec::new(),
            args: Vec::new(),
            flags: Vec::new(),
        };
        let mut node = &self.root;
        loop {
            let flags = parser.consume_flags(&node.flags)?;
            input.flags.extend(flags);
            let tok = parser.consume_token();
            match tok.kind {
                TokenKind::Delim | TokenKind::Eof => break,
                TokenKind::Str => {
                    if let Some(child) = node.children.get(&tok.value) {
                        trace!("mux: descending into `{}`", tok.value);
                        input.target.push(tok.value);
                        node = child;
                        continue;
                    }
                    input.args.push(tok.value);
                    break;
                }
                _ => {
                    return Err(ExecuteError::Internal(format!(
                        "parser returned unexpected token kind {:?} after consume_flags",
                        tok.kind
                    )))
                }
            }
        }
        input.args.extend(parser.drain_residue());
        Ok((input, node))
    }

    /// Routes `values`, then invokes the resolved node's handler, falling
    /// back to [`MuxConfig::with_default_exec`]'s handler (if one was
    /// configured) when the node has none of its own.
    pub fn execute(&self, values: Vec<String>, rules: &Rules) -> Result<(), ExecuteError>
    where
        I: 'static,
    {
        let (input, node) = self.route(values)?;
        let exec = node
            .exec
            .as_deref()
            .or_else(|| self.config.default_exec.as_deref());
        match exec {
            Some(exec) => exec
                .call(&input, rules, &self.spec_config, &self.decode_config)
                .map_err(|e| match e {
                    HandlerError::Decode(d) => ExecuteError::Decode(d),
                    other => ExecuteError::Handler(other.to_string()),
                }),
            None => Err(ExecuteError::Mux(MuxError::TargetNotExist {
                target: input.target,
            })),
        }
    }
}

fn merge_flags<I>(node: &mut Node<I>, incoming: &FlagTable, strict: bool, at: &[String]) -> Result<(), MuxError> {
    node.flags.merge_from(incoming, strict).map_err(|name| MuxError::FlagConflict {
        target: at.to_vec(),
        name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ParamSpec as Spec, SpecBuilder};
    use std::any::TypeId;
    use std::sync::{Mutex, OnceLock};

    #[derive(Default, Debug, Clone, PartialEq, Eq)]
    struct RootParams {
        g: String,
    }

    impl Params for RootParams {
        fn type_name() -> &'static str {
            "RootParams"
        }

        fn build_spec(
            _trail: &mut Vec<(TypeId, &'static str)>,
            config: &crate::spec::SpecConfig,
        ) -> Result<Spec<Self>, crate::error::SpecError> {
            let mut b = SpecBuilder::new("RootParams");
            b.add_flag(crate::spec::FlagSpec {
                field_name: "g",
                field_type: "String",
                names: vec!["g".to_string()],
                elide: crate::spec::Elide::none(config),
                set: Box::new(|v: &mut RootParams, src| {
                    use crate::decode::ParamValue;
                    v.g.decode_value(src)
                }),
            })?;
            Ok(b.build())
        }

        fn __spec_cell() -> &'static OnceLock<Spec<Self>> {
            static CELL: OnceLock<Spec<RootParams>> = OnceLock::new();
            &CELL
        }
    }

    #[derive(Default, Debug, Clone, PartialEq, Eq)]
    struct SubParams {
        s: String,
    }

    impl Params for SubParams {
        fn type_name() -> &'static str {
            "SubParams"
        }

        fn build_spec(
            _trail: &mut Vec<(TypeId, &'static str)>,
            config: &crate::spec::SpecConfig,
        ) -> Result<Spec<Self>, crate::error::SpecError> {
            let mut b = SpecBuilder::new("SubParams");
            b.add_flag(crate::spec::FlagSpec {
                field_name: "s",
                field_type: "String",
                names: vec!["s".to_string()],
                elide: crate::spec::Elide::none(config),
                set: Box::new(|v: &mut SubParams, src| {
                    use crate::decode::ParamValue;
                    v.s.decode_value(src)
                }),
            })?;
            Ok(b.build())
        }

        fn __spec_cell() -> &'static OnceLock<Spec<Self>> {
            static CELL: OnceLock<Spec<SubParams>> = OnceLock::new();
            &CELL
        }
    }

    #[test]
    fn subcommand_descent_interleaves_per_level_flags() {
        let mut mux: Mux<()> = Mux::new();
        mux.register_exec(&[], |_: RootParams| Ok(())).unwrap();
        let captured: &'static Mutex<Option<SubParams>> = Box::leak(Box::new(Mutex::new(None)));
        mux.register_exec(&["sub"], move |p: SubParams| {
            *captured.lock().unwrap() = Some(p);
            Ok(())
        })
        .unwrap();

        let rules = Rules::new();
        let values = vec!["prog", "--g", "X", "sub", "--s", "Y"]
            .into_iter()
            .map(String::from)
            .collect();
        let (input, node) = mux.route(values).unwrap();
        assert_eq!(input.target, vec!["sub".to_string()]);
        assert_eq!(
            input.flags,
            vec![("g".to_string(), "X".to_string()), ("s".to_string(), "Y".to_string())]
        );
        assert!(node.has_exec());
    }

    #[test]
    fn unregistered_target_is_reported() {
        let mux: Mux<()> = Mux::new();
        let values = vec!["prog", "nope"].into_iter().map(String::from).collect();
        let err = mux.execute(values, &Rules::new()).unwrap_err();
        assert!(matches!(err, ExecuteError::Mux(MuxError::TargetNotExist { .. })));
    }

    #[test]
    fn conflicting_exec_registration_is_rejected() {
        let mut mux: Mux<()> = Mux::new();
        mux.register_exec(&["a"], |_: RootParams| Ok(())).unwrap();
        let err = mux.register_exec(&["a"], |_: RootParams| Ok(())).unwrap_err();
        assert!(matches!(err, MuxError::ExecConflict { .. }));
    }

    #[test]
    fn allow_overwrite_lets_a_later_registration_replace_an_earlier_one() {
        let mut mux: Mux<()> = Mux::with_config(MuxConfig::new().with_allow_overwrite(true));
        mux.register_exec(&["a"], |_: RootParams| Ok(())).unwrap();
        let seen: &'static Mutex<bool> = Box::leak(Box::new(Mutex::new(false)));
        mux.register_exec(&["a"], move |_: RootParams| {
            *seen.lock().unwrap() = true;
            Ok(())
        })
        .unwrap();
        mux.execute(
            vec!["prog".to_string(), "a".to_string()],
            &Rules::new(),
        )
        .unwrap();
        assert!(*seen.lock().unwrap());
    }

    #[test]
    fn default_exec_handles_a_node_with_no_registered_handler() {
        let seen: &'static Mutex<bool> = Box::leak(Box::new(Mutex::new(false)));
        let config = MuxConfig::<()>::new().with_default_exec(move |_: RootParams| {
            *seen.lock().unwrap() = true;
            Ok(())
        });
        let mut mux: Mux<()> = Mux::with_config(config);
        // Nothing is registered at root itself (only at "sub"); invoking with
        // no subcommand at all reaches root with `node.exec` unset.
        mux.register_exec(&["sub"], |_: SubParams| Ok(())).unwrap();
        mux.execute(vec!["prog".to_string()], &Rules::new()).unwrap();
        assert!(*seen.lock().unwrap());
    }
}
