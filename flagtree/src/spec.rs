//! Derives, from a parameter record type, a structured description of its flags,
//! positional-argument slots, and inlined sub-records.
//!
//! The structural walk that the origin implementation performed at registration
//! time via reflection happens here at compile time instead: [`Params::build_spec`]
//! is generated per concrete type by `#[derive(Params)]`, and recurses into inline
//! fields through ordinary monomorphized calls. The only runtime work left is
//! conflict accumulation and ancestor-trail cycle detection, both of which
//! inherently depend on which concrete types get composed together.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{ConflictKind, FieldError, SpecConflict, SpecError};
use crate::rules::Rules;

/// A field-value predicate deciding whether a following token should be treated
/// as a flag's elided value or left alone as the next positional/flag.
pub type Consumable = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A composable field setter: decodes `src` onto the (possibly nested) field
/// this entry was built for.
pub type Setter<T> = Box<dyn Fn(&mut T, &str) -> Result<(), FieldError> + Send + Sync>;

/// May this flag be given with no following value, and which strings actually
/// consume the following token as that value.
#[derive(Clone)]
pub struct Elide {
    pub allow: bool,
    pub consumable: Consumable,
}

impl Elide {
    pub fn none(config: &SpecConfig) -> Self {
        Elide {
            allow: false,
            consumable: config.default_consumable.clone(),
        }
    }

    pub fn allow(config: &SpecConfig) -> Self {
        Elide {
            allow: true,
            consumable: config.default_consumable.clone(),
        }
    }

    pub fn allow_with(consumable: Consumable) -> Self {
        Elide {
            allow: true,
            consumable,
        }
    }
}

impl fmt::Debug for Elide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elide").field("allow", &self.allow).finish_non_exhaustive()
    }
}

/// A half-open `[low, high)` range over positional-argument indices. Either
/// bound may be unbounded; `None` means "no bound", never a sentinel integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionRange {
    pub low: Option<u32>,
    pub high: Option<u32>,
}

impl PositionRange {
    pub fn contains(&self, index: u32) -> bool {
        self.low.map_or(true, |l| index >= l) && self.high.map_or(true, |h| index < h)
    }

    pub fn intersects(&self, other: &PositionRange) -> bool {
        let self_low = self.low.unwrap_or(0);
        let other_low = other.low.unwrap_or(0);
        match (self.high, other.high) {
            (None, None) => true,
            (None, Some(other_high)) => self_low < other_high,
            (Some(self_high), None) => other_low < self_high,
            (Some(self_high), Some(other_high)) => self_low < other_high && other_low < self_high,
        }
    }

    /// Parses the `<low>:<high>` grammar, where a bare integer `n` is sugar for
    /// `[n, n+1)` and either side of the colon may be empty (unbounded).
    pub fn parse(raw: &str) -> Result<Self, String> {
        if let Ok(n) = raw.parse::<u32>() {
            return Ok(PositionRange {
                low: Some(n),
                high: Some(n + 1),
            });
        }
        let Some((low_raw, high_raw)) = raw.split_once(':') else {
            return Err(format!(
                "`{raw}` is neither a bare index nor a `low:high` range"
            ));
        };
        let low = if low_raw.is_empty() {
            None
        } else {
            Some(
                low_raw
                    .parse::<u32>()
                    .map_err(|e| format!("invalid low bound `{low_raw}` in `{raw}`: {e}"))?,
            )
        };
        let high = if high_raw.is_empty() {
            None
        } else {
            Some(
                high_raw
                    .parse::<u32>()
                    .map_err(|e| format!("invalid high bound `{high_raw}` in `{raw}`: {e}"))?,
            )
        };
        match (low, high) {
            (Some(l), Some(h)) if h <= l => {
                Err(format!("range `{raw}` has a high bound not greater than its low bound"))
            }
            (None, Some(0)) => Err(format!(
                "range `{raw}` has a zero high bound with an unbounded low bound"
            )),
            _ => Ok(PositionRange { low, high }),
        }
    }
}

impl fmt::Display for PositionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.low, self.high) {
            (None, None) => write!(f, ":"),
            (Some(l), None) => write!(f, "{l}:"),
            (None, Some(h)) => write!(f, ":{h}"),
            (Some(l), Some(h)) => write!(f, "{l}:{h}"),
        }
    }
}

/// A single declared flag, flattened so `set` already resolves the full field
/// path from the record it ultimately belongs to, through zero or more inlines.
pub struct FlagSpec<T> {
    pub field_name: &'static str,
    pub field_type: &'static str,
    pub names: Vec<String>,
    pub elide: Elide,
    pub set: Setter<T>,
}

impl<T: 'static> FlagSpec<T> {
    /// Composes this flag (declared against an inlined record of type `T`) onto
    /// an outer record `U` that embeds it behind `access`.
    pub fn remap<U: 'static>(self, access: fn(&mut U) -> &mut T) -> FlagSpec<U> {
        let set = self.set;
        FlagSpec {
            field_name: self.field_name,
            field_type: self.field_type,
            names: self.names,
            elide: self.elide,
            set: Box::new(move |outer, src| (set)(access(outer), src)),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        if !prefix.is_empty() {
            for name in &mut self.names {
                *name = format!("{prefix}{name}");
            }
        }
        self
    }
}

/// A single declared positional-argument slot, flattened the same way as [`FlagSpec`].
pub struct ArgSlot<T> {
    pub field_name: &'static str,
    pub range: PositionRange,
    pub set: Setter<T>,
}

impl<T: 'static> ArgSlot<T> {
    pub fn remap<U: 'static>(self, access: fn(&mut U) -> &mut T) -> ArgSlot<U> {
        let set = self.set;
        ArgSlot {
            field_name: self.field_name,
            range: self.range,
            set: Box::new(move |outer, src| (set)(access(outer), src)),
        }
    }
}

/// A flattened reference to one inline sub-value, reachable from the owning
/// record's root. `apply_rules` navigates to it (materializing `Option` links
/// as needed) and runs [`Rules::process_value`] on the reached value.
pub struct InlineEntry<T> {
    pub field_name: &'static str,
    pub prefix: &'static str,
    pub inner_type_name: &'static str,
    pub depth: usize,
    pub apply_rules: Box<dyn Fn(&mut T, &Rules) + Send + Sync>,
}

impl<T: 'static> InlineEntry<T> {
    pub fn remap<U: 'static>(self, access: fn(&mut U) -> &mut T) -> InlineEntry<U> {
        let apply = self.apply_rules;
        InlineEntry {
            field_name: self.field_name,
            prefix: self.prefix,
            inner_type_name: self.inner_type_name,
            depth: self.depth + 1,
            apply_rules: Box::new(move |outer, rules| (apply)(access(outer), rules)),
        }
    }
}

/// Runtime-tunable knobs for spec construction. Populated via option-setting
/// builder methods rather than a configuration file; mirrors the origin
/// implementation's own functional-options `MuxConfig`.
#[derive(Clone)]
pub struct SpecConfig {
    pub default_consumable: Consumable,
    pub allow_bool_type: bool,
}

fn default_consumable_fn(s: &str) -> bool {
    matches!(s, "true" | "false" | "True" | "False" | "TRUE" | "FALSE")
}

impl Default for SpecConfig {
    fn default() -> Self {
        SpecConfig {
            default_consumable: Arc::new(default_consumable_fn),
            allow_bool_type: true,
        }
    }
}

impl SpecConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_consumable(
        mut self,
        f: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.default_consumable = Arc::new(f);
        self
    }

    pub fn with_allow_bool_type(mut self, allow: bool) -> Self {
        self.allow_bool_type = allow;
        self
    }
}

/// The normalized, fully-flattened description of a parameter record type `T`.
pub struct ParamSpec<T> {
    type_name: &'static str,
    arguments: Vec<ArgSlot<T>>,
    flags: Vec<FlagSpec<T>>,
    flag_index: HashMap<String, usize>,
    inlines: Vec<InlineEntry<T>>,
}

impl<T: Params> ParamSpec<T> {
    /// Returns the cached, fully-built spec for `T`, building it (under the
    /// default [`SpecConfig`]) on first access.
    pub fn get() -> Result<&'static ParamSpec<T>, SpecError> {
        Self::get_with_config(&SpecConfig::default())
    }

    /// Same as [`ParamSpec::get`], but builds under a caller-supplied
    /// [`SpecConfig`] on first access. Once the per-type cache is populated
    /// (by whichever call wins the race) later calls return the cached spec
    /// regardless of the config passed in, matching the "build once, cache
    /// by type, immutable thereafter" lifecycle.
    pub fn get_with_config(config: &SpecConfig) -> Result<&'static ParamSpec<T>, SpecError> {
        let cell = T::__spec_cell();
        if let Some(spec) = cell.get() {
            return Ok(spec);
        }
        let mut trail = Vec::new();
        let spec = build_root_spec::<T>(&mut trail, config)?;
        Ok(cell.get_or_init(|| spec))
    }
}

impl<T> ParamSpec<T> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn flags(&self) -> &[FlagSpec<T>] {
        &self.flags
    }

    pub fn arguments(&self) -> &[ArgSlot<T>] {
        &self.arguments
    }

    pub fn inlines(&self) -> &[InlineEntry<T>] {
        &self.inlines
    }

    pub fn flag_by_name(&self, name: &str) -> Option<&FlagSpec<T>> {
        self.flag_index.get(name).map(|&idx| &self.flags[idx])
    }

    pub fn arg_slot_for(&self, index: u32) -> Option<&ArgSlot<T>> {
        self.arguments.iter().find(|slot| slot.range.contains(index))
    }
}

/// Every field-level record a `#[derive(Params)]` struct sees, flattened and
/// accumulated by the derive macro's generated `build_spec` body through this
/// builder's checked insertion methods.
pub struct SpecBuilder<T> {
    type_name: &'static str,
    arguments: Vec<ArgSlot<T>>,
    flags: Vec<FlagSpec<T>>,
    flag_index: HashMap<String, usize>,
    inlines: Vec<InlineEntry<T>>,
}

impl<T: 'static> SpecBuilder<T> {
    pub fn new(type_name: &'static str) -> Self {
        SpecBuilder {
            type_name,
            arguments: Vec::new(),
            flags: Vec::new(),
            flag_index: HashMap::new(),
            inlines: Vec::new(),
        }
    }

    pub fn add_arg(&mut self, slot: ArgSlot<T>) -> Result<(), SpecError> {
        if let Some(existing) = self.arguments.iter().find(|a| a.range.intersects(&slot.range)) {
            return Err(SpecError::Conflict(
                ConflictKind::Arg,
                SpecConflict {
                    trail: vec![self.type_name],
                    original: format!("`{}` at {}", existing.field_name, existing.range),
                    update: format!("`{}` at {}", slot.field_name, slot.range),
                },
            ));
        }
        let pos = self
            .arguments
            .partition_point(|a| a.range.low.unwrap_or(0) < slot.range.low.unwrap_or(0));
        self.arguments.insert(pos, slot);
        Ok(())
    }

    pub fn add_flag(&mut self, flag: FlagSpec<T>) -> Result<(), SpecError> {
        for name in &flag.names {
            if let Some(&idx) = self.flag_index.get(name) {
                let existing = &self.flags[idx];
                return Err(SpecError::Conflict(
                    ConflictKind::Flag,
                    SpecConflict {
                        trail: vec![self.type_name],
                        original: format!("`{name}` on field `{}`", existing.field_name),
                        update: format!("`{name}` on field `{}`", flag.field_name),
                    },
                ));
            }
        }
        let idx = self.flags.len();
        for name in &flag.names {
            self.flag_index.insert(name.clone(), idx);
        }
        self.flags.push(flag);
        Ok(())
    }

    /// Recurses into an inlined record's own spec, folding its flattened
    /// arguments/flags/inlines onto this builder through `access`.
    pub fn add_inline<Inner: Params>(
        &mut self,
        field_name: &'static str,
        prefix: &'static str,
        access: fn(&mut T) -> &mut Inner,
        trail: &mut Vec<(TypeId, &'static str)>,
        config: &SpecConfig,
    ) -> Result<(), SpecError> {
        if trail.iter().any(|(id, _)| *id == TypeId::of::<Inner>()) {
            let mut names: Vec<&'static str> = trail.iter().map(|(_, name)| *name).collect();
            names.push(Inner::type_name());
            return Err(SpecError::Conflict(
                ConflictKind::Inline,
                SpecConflict {
                    trail: vec![self.type_name],
                    original: names.join(" -> "),
                    update: format!("{} (via field `{field_name}`)", Inner::type_name()),
                },
            ));
        }
        let inner_spec = build_root_spec::<Inner>(trail, config)?;
        for arg in inner_spec.arguments {
            self.add_arg(arg.remap(access))?;
        }
        for flag in inner_spec.flags {
            self.add_flag(flag.remap(access).with_prefix(prefix))?;
        }
        for inline in inner_spec.inlines {
            self.inlines.push(inline.remap(access));
        }
        self.inlines.push(InlineEntry {
            field_name,
            prefix,
            inner_type_name: Inner::type_name(),
            depth: 1,
            apply_rules: Box::new(move |outer: &mut T, rules: &Rules| {
                rules.process_value::<Inner>(access(outer));
            }),
        });
        Ok(())
    }

    pub fn build(self) -> ParamSpec<T> {
        ParamSpec {
            type_name: self.type_name,
            arguments: self.arguments,
            flags: self.flags,
            flag_index: self.flag_index,
            inlines: self.inlines,
        }
    }
}

/// Implemented by `#[derive(Params)]` for every parameter record. Not meant to
/// be implemented by hand; `build_spec` is the compile-time-monomorphized
/// analogue of the origin implementation's reflective struct walk.
pub trait Params: Sized + 'static {
    fn type_name() -> &'static str;

    fn build_spec(
        trail: &mut Vec<(TypeId, &'static str)>,
        config: &SpecConfig,
    ) -> Result<ParamSpec<Self>, SpecError>;

    /// Runs this record's tagged `#[flagtree(init = "...")]` function, if any.
    /// No-op by default; only overridden by the derive macro when such a tag
    /// is present.
    fn run_init(&mut self) {}

    #[doc(hidden)]
    fn __spec_cell() -> &'static OnceLock<ParamSpec<Self>>;
}

/// Wraps a type's `build_spec` with the ancestor-trail push/pop that lets
/// direct self-inlines (a record inlining itself) be caught the same way as
/// any other cycle, by [`SpecBuilder::add_inline`]'s pre-recursion check.
pub fn build_root_spec<T: Params>(
    trail: &mut Vec<(TypeId, &'static str)>,
    config: &SpecConfig,
) -> Result<ParamSpec<T>, SpecError> {
    trail.push((TypeId::of::<T>(), T::type_name()));
    let result = T::build_spec(trail, config);
    trail.pop();
    result
}
