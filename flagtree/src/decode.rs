//! Overlays parsed flags and positional arguments onto a parameter record.
//!
//! Field-level dispatch (indirect/custom/direct/container) is resolved by the
//! Rust type system through the [`ParamValue`] trait rather than by a runtime
//! "try each kind in turn" loop — the compile-time analogue of the origin
//! implementation's four-branch field decoder.

use crate::error::{DecodeError, FieldError, FieldKind};
use crate::mux::Input;
use crate::spec::{ParamSpec, Params};

/// Implemented exactly once per concrete leaf/container field type. Field
/// access dispatches to this trait rather than branching on a runtime kind
/// tag, so a field whose type implements none of `ParamValue`'s supporting
/// traits fails to compile rather than failing at decode time.
pub trait ParamValue {
    fn decode_value(&mut self, src: &str) -> Result<(), FieldError>;
}

/// Implemented by a leaf type that wants to own its own text parsing, e.g. a
/// timestamp or a domain newtype. Paired with [`impl_param_value_from_text`]
/// to get a `ParamValue` impl from it.
pub trait FromParamText: Sized {
    fn from_param_text(s: &str) -> Result<Self, FieldError>;
}

/// Generates a `ParamValue` impl for a type that implements [`FromParamText`].
/// This is the decoder's "Custom" kind: an explicit per-type opt-in, never an
/// ambient capability probe.
#[macro_export]
macro_rules! impl_param_value_from_text {
    ($ty:ty) => {
        impl $crate::decode::ParamValue for $ty {
            fn decode_value(&mut self, src: &str) -> Result<(), $crate::error::FieldError> {
                *self = <$ty as $crate::decode::FromParamText>::from_param_text(src)?;
                Ok(())
            }
        }
    };
}

macro_rules! impl_param_value_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ParamValue for $ty {
                fn decode_value(&mut self, src: &str) -> Result<(), FieldError> {
                    *self = src.parse::<$ty>().map_err(|e| FieldError::Invalid {
                        reason: format!("`{src}` is not a valid {}: {e}", stringify!($ty)),
                    })?;
                    Ok(())
                }
            }
        )*
    };
}

impl_param_value_scalar!(
    bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char, String,
);

/// The decoder's "Indirect" kind: an absent `Option` is materialized with the
/// inner type's default before decoding into it.
impl<T: ParamValue + Default> ParamValue for Option<T> {
    fn decode_value(&mut self, src: &str) -> Result<(), FieldError> {
        if self.is_none() {
            *self = Some(T::default());
        }
        self.as_mut()
            .expect("just materialized above")
            .decode_value(src)
    }
}

/// The decoder's "Container" kind: every occurrence constructs a fresh
/// element and appends it, rather than overwriting.
impl<T: ParamValue + Default> ParamValue for Vec<T> {
    fn decode_value(&mut self, src: &str) -> Result<(), FieldError> {
        let mut item = T::default();
        item.decode_value(src)?;
        self.push(item);
        Ok(())
    }
}

/// Runtime-tunable knobs for decoding. Populated via option-setting builder
/// methods, matching [`crate::spec::SpecConfig`] and [`crate::mux::MuxConfig`].
#[derive(Clone, Default)]
pub struct DecodeConfig {
    pub allow_unknown_fields: bool,
}

impl DecodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allow_unknown_fields(mut self, allow: bool) -> Self {
        self.allow_unknown_fields = allow;
        self
    }
}

/// Walks a [`ParamSpec`], mapping parsed flags and positionals onto a
/// record's fields.
pub struct Decoder;

impl Decoder {
    /// Decodes under the default [`DecodeConfig`] (unknown flags/positionals
    /// are reported rather than silently ignored).
    pub fn decode<T: Params>(input: &Input, spec: &ParamSpec<T>, v: &mut T) -> Result<(), DecodeError> {
        Self::decode_with_config(input, spec, v, &DecodeConfig::default())
    }

    pub fn decode_with_config<T: Params>(
        input: &Input,
        spec: &ParamSpec<T>,
        v: &mut T,
        config: &DecodeConfig,
    ) -> Result<(), DecodeError> {
        for (name, value) in &input.flags {
            let flag = match spec.flag_by_name(name) {
                Some(flag) => flag,
                None if config.allow_unknown_fields => continue,
                None => {
                    return Err(DecodeError::UnknownField {
                        kind: FieldKind::Flag,
                        name: name.clone(),
                    })
                }
            };
            (flag.set)(v, value).map_err(|source| DecodeError::InvalidField {
                kind: FieldKind::Flag,
                name: name.clone(),
                source,
            })?;
        }
        for (position, value) in input.args.iter().enumerate() {
            let index = position as u32;
            let slot = match spec.arg_slot_for(index) {
                Some(slot) => slot,
                None if config.allow_unknown_fields => continue,
                None => {
                    return Err(DecodeError::UnknownField {
                        kind: FieldKind::Arg,
                        name: index.to_string(),
                    })
                }
            };
            (slot.set)(v, value).map_err(|source| DecodeError::InvalidField {
                kind: FieldKind::Arg,
                name: index.to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
