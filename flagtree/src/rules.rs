//! A type-indexed registry of default-assignment closures, applied recursively
//! over a record and its flattened inlines before the decoder overlays any
//! parsed values.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::spec::{ParamSpec, Params};

type RuleList<T> = Vec<Box<dyn Fn(&mut T) + Send + Sync>>;

/// Appends-only during registration (`&mut self`), read-only during
/// application (`&self`) — the same registration/execute split as [`crate::mux::Mux`].
pub struct Rules {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Rules {
    pub fn new() -> Self {
        Rules {
            entries: HashMap::new(),
        }
    }

    /// Registers a default-assignment closure for `T`. Closures for the same
    /// `T` run in registration order.
    pub fn register<T: 'static>(&mut self, f: impl Fn(&mut T) + Send + Sync + 'static) {
        let entry = self
            .entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(RuleList::<T>::new()));
        let list = entry
            .downcast_mut::<RuleList<T>>()
            .expect("rule registry entry keyed by TypeId::of::<T>() must downcast to RuleList<T>");
        list.push(Box::new(f));
    }

    /// Runs `T`'s tagged initializer (if any), then every registered rule for
    /// `T` in insertion order. Does not recurse into `T`'s own inlines — that
    /// is [`Rules::process`]'s job, via the spec's flattened, depth-ordered list.
    pub fn process_value<T: Params>(&self, val: &mut T) {
        val.run_init();
        if let Some(entry) = self.entries.get(&TypeId::of::<T>()) {
            if let Some(list) = entry.downcast_ref::<RuleList<T>>() {
                for rule in list {
                    rule(val);
                }
            }
        }
    }

    /// Bottom-up initialization over a record and its flattened inlines: every
    /// inline is processed deepest-first, then the root itself, so a parent's
    /// rules always observe an already-initialized child.
    pub fn process<T: Params>(&self, spec: &ParamSpec<T>, val: &mut T) {
        let mut ordered: Vec<_> = spec.inlines().iter().collect();
        ordered.sort_by_key(|entry| std::cmp::Reverse(entry.depth));
        for entry in ordered {
            (entry.apply_rules)(val, self);
        }
        self.process_value(val);
    }

    pub fn freeze(self) -> FrozenRules {
        FrozenRules(Arc::new(self))
    }
}

impl Default for Rules {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-shareable, execute-only handle onto a [`Rules`] registry, for
/// embedders that drive `execute` from multiple threads.
#[derive(Clone)]
pub struct FrozenRules(Arc<Rules>);

impl std::ops::Deref for FrozenRules {
    type Target = Rules;

    fn deref(&self) -> &Rules {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ParamSpec as Spec, SpecBuilder};

    #[derive(Default, PartialEq, Eq, Debug)]
    struct Leaf {
        x: i32,
    }

    impl Params for Leaf {
        fn type_name() -> &'static str {
            "Leaf"
        }

        fn build_spec(
            _trail: &mut Vec<(TypeId, &'static str)>,
            _config: &crate::spec::SpecConfig,
        ) -> Result<Spec<Self>, crate::error::SpecError> {
            Ok(SpecBuilder::new("Leaf").build())
        }

        fn __spec_cell() -> &'static std::sync::OnceLock<Spec<Self>> {
            static CELL: std::sync::OnceLock<Spec<Leaf>> = std::sync::OnceLock::new();
            &CELL
        }
    }

    #[test]
    fn rules_for_same_type_run_in_registration_order() {
        let mut rules = Rules::new();
        rules.register::<Leaf>(|l| l.x += 1);
        rules.register::<Leaf>(|l| l.x *= 10);
        let mut v = Leaf::default();
        rules.process_value(&mut v);
        assert_eq!(v.x, 10);
    }

    #[test]
    fn fresh_defaults_processed_independently_compare_equal() {
        let mut rules = Rules::new();
        rules.register::<Leaf>(|l| l.x = 42);
        let mut a = Leaf::default();
        let mut b = Leaf::default();
        rules.process_value(&mut a);
        rules.process_value(&mut b);
        assert_eq!(a, b);
    }
}
