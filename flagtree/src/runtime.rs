//! Composes [`crate::mux::Mux`] and [`crate::rules::Rules`] into the single
//! object an embedder actually builds against: registration methods that
//! install handlers/info, plus `execute` to drive one invocation end to end.

use std::sync::Arc;

use crate::decode::{DecodeConfig, Decoder};
use crate::error::{ExecuteError, HandlerError, MuxError};
use crate::mux::{Input, Mux, MuxConfig};
use crate::rules::Rules;
use crate::spec::{ParamSpec, Params, SpecConfig};

/// The top-level object an embedder owns: a command trie plus a default-rule
/// registry. Registration methods take `&mut self`; [`Runtime::execute`] takes
/// `&self`, matching the read/write split of its two constituents.
pub struct Runtime<I = ()> {
    mux: Mux<I>,
    rules: Rules,
}

impl<I> Default for Runtime<I> {
    fn default() -> Self {
        Runtime {
            mux: Mux::new(),
            rules: Rules::new(),
        }
    }
}

impl<I> Runtime<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mux_config(config: MuxConfig<I>) -> Self {
        Runtime {
            mux: Mux::with_config(config),
            rules: Rules::new(),
        }
    }

    pub fn with_spec_config(spec_config: SpecConfig) -> Self {
        Runtime {
            mux: Mux::with_spec_config(spec_config),
            rules: Rules::new(),
        }
    }

    pub fn with_decode_config(decode_config: DecodeConfig) -> Self {
        Runtime {
            mux: Mux::with_decode_config(decode_config),
            rules: Rules::new(),
        }
    }

    /// Builds a `Runtime` with every configuration knob supplied explicitly.
    pub fn with_configs(mux_config: MuxConfig<I>, spec_config: SpecConfig, decode_config: DecodeConfig) -> Self {
        Runtime {
            mux: Mux::configured(mux_config, spec_config, decode_config),
            rules: Rules::new(),
        }
    }

    /// Registers a handler for `P` at `target`.
    pub fn register_exec<P>(
        &mut self,
        target: &[&str],
        handler: impl Fn(P) -> Result<(), HandlerError> + Send + Sync + 'static,
    ) -> Result<(), MuxError>
    where
        P: Params + Default,
        I: 'static,
    {
        self.mux.register_exec(target, handler)
    }

    /// Installs opaque metadata at `target`.
    pub fn register_info(&mut self, target: &[&str], info: I) -> Result<(), MuxError> {
        self.mux.register_info(target, info)
    }

    /// Appends a default-assignment closure for `T`, run during materialization
    /// of any record (or inline) of that type.
    pub fn register_rule<T: 'static>(&mut self, f: impl Fn(&mut T) + Send + Sync + 'static) {
        self.rules.register(f);
    }

    pub fn meta(&self, target: &[&str]) -> Result<&crate::mux::Node<I>, MuxError> {
        self.mux.meta(target)
    }

    /// Runs the default-rule pass then the decode pass for `P` against
    /// `input`, exactly as an installed handler does internally. Exposed so a
    /// handler (or a test) can materialize a parameter value without going
    /// through a full `execute` call.
    pub fn materialize<P>(&self, input: &Input) -> Result<P, HandlerError>
    where
        P: Params + Default,
    {
        let spec = ParamSpec::<P>::get_with_config(self.mux.spec_config())?;
        let mut value = P::default();
        self.rules.process(spec, &mut value);
        Decoder::decode_with_config(input, spec, &mut value, self.mux.decode_config())?;
        Ok(value)
    }

    /// Parses `values`, descends the command trie, and invokes the resolved
    /// node's handler (if any).
    pub fn execute(&self, values: Vec<String>) -> Result<(), ExecuteError>
    where
        I: 'static,
    {
        self.mux.execute(values, &self.rules)
    }

    /// Consumes this runtime into an `Arc`-able, execute-only handle for
    /// embedders that drive `execute` from multiple threads.
    pub fn freeze(self) -> FrozenRuntime<I> {
        FrozenRuntime(Arc::new(self))
    }
}

/// A thread-shareable, execute-only handle onto a [`Runtime`]. No interior
/// mutability is needed: nothing on the `execute` path mutates shared state.
#[derive(Clone)]
pub struct FrozenRuntime<I = ()>(Arc<Runtime<I>>);

impl<I> std::ops::Deref for FrozenRuntime<I> {
    type Target = Runtime<I>;

    fn deref(&self) -> &Runtime<I> {
        &self.0
    }
}
