//! Error taxonomy shared by every component.
//!
//! Every error kind is orthogonal to a [`Severity`]: the *kind* says what went
//! wrong, the severity says who should care. Embedders match on severity to
//! decide how loudly to report a failure without having to enumerate every
//! kind in every component.

use std::fmt;

use strum_macros::Display as StrumDisplay;

/// Who is responsible for a failure, and how alarming it should be to an embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum Severity {
    /// An invariant of this crate was violated. Should be impossible; file a bug.
    Internal,
    /// Misuse by the library embedder: a bad tag, a conflicting registration, an invalid parameter type.
    Developer,
    /// Bad end-user input: unknown flag, unparsable value, missing required value.
    User,
}

/// Which kind of declaration conflicted during spec construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Arg,
    Flag,
    Inline,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::Arg => write!(f, "argument"),
            ConflictKind::Flag => write!(f, "flag"),
            ConflictKind::Inline => write!(f, "inline"),
        }
    }
}

/// Context attached to a [`SpecError::Conflict`]: the ancestor trail at the point
/// of conflict plus a human description of what was already present and what
/// was being added.
#[derive(Debug, Clone)]
pub struct SpecConflict {
    pub trail: Vec<&'static str>,
    pub original: String,
    pub update: String,
}

impl fmt::Display for SpecConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at {}: existing {} conflicts with new {}",
            self.trail.join(" -> "),
            self.original,
            self.update
        )
    }
}

/// Failures raised while building a [`crate::spec::ParamSpec`].
#[derive(Debug, Clone)]
pub enum SpecError {
    /// A declared tag could not be parsed (malformed range, prefix, or name).
    InvalidField { field: &'static str, reason: String },
    /// A declaration conflicts with one already present in the flattened tree.
    Conflict(ConflictKind, SpecConflict),
}

impl SpecError {
    pub fn severity(&self) -> Severity {
        match self {
            SpecError::InvalidField { .. } => Severity::Developer,
            SpecError::Conflict(..) => Severity::Developer,
        }
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::InvalidField { field, reason } => {
                write!(f, "invalid field `{field}`: {reason}")
            }
            SpecError::Conflict(kind, conflict) => {
                write!(f, "{kind} conflict: {conflict}")
            }
        }
    }
}

impl std::error::Error for SpecError {}

/// Failures raised while tokenizing raw program arguments.
#[derive(Debug, Clone)]
pub enum ParseError {
    UnknownFlag { name: String },
    MissingFlagValue { name: String },
    InvalidToken { raw: String },
}

impl ParseError {
    pub fn severity(&self) -> Severity {
        Severity::User
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownFlag { name } => write!(f, "unknown flag `{name}`"),
            ParseError::MissingFlagValue { name } => {
                write!(f, "flag `{name}` requires a value but none was given")
            }
            ParseError::InvalidToken { raw } => write!(f, "invalid token `{raw}`"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Failures raised by the command multiplexer, at registration or execution time.
#[derive(Debug, Clone)]
pub enum MuxError {
    TargetNotExist { target: Vec<String> },
    EmptyValues,
    ExecConflict { target: Vec<String> },
    InfoConflict { target: Vec<String> },
    FlagConflict { target: Vec<String>, name: String },
    /// Spec construction failed while registering a handler at `target`.
    Spec { target: Vec<String>, source: SpecError },
}

impl MuxError {
    pub fn severity(&self) -> Severity {
        match self {
            MuxError::TargetNotExist { .. } => Severity::User,
            MuxError::EmptyValues => Severity::Internal,
            MuxError::ExecConflict { .. }
            | MuxError::InfoConflict { .. }
            | MuxError::FlagConflict { .. } => Severity::Developer,
            MuxError::Spec { source, .. } => source.severity(),
        }
    }
}

impl fmt::Display for MuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxError::TargetNotExist { target } => {
                write!(f, "no command registered at `{}`", target.join(" "))
            }
            MuxError::EmptyValues => write!(f, "execute called with an empty value sequence"),
            MuxError::ExecConflict { target } => {
                write!(f, "handler already registered at `{}`", target.join(" "))
            }
            MuxError::InfoConflict { target } => {
                write!(f, "info already registered at `{}`", target.join(" "))
            }
            MuxError::FlagConflict { target, name } => write!(
                f,
                "flag `{name}` registered at `{}` conflicts with an ancestor declaration",
                target.join(" ")
            ),
            MuxError::Spec { target, source } => {
                write!(f, "building spec for `{}`: {source}", target.join(" "))
            }
        }
    }
}

impl std::error::Error for MuxError {}

/// A single field's decode failure, wrapped with the field's identity by
/// [`DecodeError`] before being handed back to a caller.
#[derive(Debug, Clone)]
pub enum FieldError {
    /// The source text could not be parsed into the field's type.
    Invalid { reason: String },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Invalid { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for FieldError {}

/// Which side of the spec a [`DecodeError::UnknownField`]/`InvalidField` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Flag,
    Arg,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Flag => write!(f, "flag"),
            FieldKind::Arg => write!(f, "argument"),
        }
    }
}

/// Failures raised while decoding parsed flags/args onto a parameter record.
#[derive(Debug, Clone)]
pub enum DecodeError {
    UnknownField { kind: FieldKind, name: String },
    InvalidField {
        kind: FieldKind,
        name: String,
        source: FieldError,
    },
}

impl DecodeError {
    pub fn severity(&self) -> Severity {
        match self {
            DecodeError::UnknownField { .. } => Severity::User,
            DecodeError::InvalidField { .. } => Severity::User,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownField { kind, name } => {
                write!(f, "no {kind} named `{name}` in this parameter record")
            }
            DecodeError::InvalidField { kind, name, source } => {
                write!(f, "invalid value for {kind} `{name}`: {source}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Failures raised by [`crate::mux::Mux::execute`] that don't fit any other kind.
#[derive(Debug, Clone)]
pub enum ExecuteError {
    Parse(ParseError),
    Mux(MuxError),
    Decode(DecodeError),
    Handler(String),
    /// An invariant the execute loop assumes should always hold was violated.
    Internal(String),
}

impl ExecuteError {
    pub fn severity(&self) -> Severity {
        match self {
            ExecuteError::Parse(e) => e.severity(),
            ExecuteError::Mux(e) => e.severity(),
            ExecuteError::Decode(e) => e.severity(),
            ExecuteError::Handler(_) => Severity::User,
            ExecuteError::Internal(_) => Severity::Internal,
        }
    }
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::Parse(e) => write!(f, "{e}"),
            ExecuteError::Mux(e) => write!(f, "{e}"),
            ExecuteError::Decode(e) => write!(f, "{e}"),
            ExecuteError::Handler(msg) => write!(f, "{msg}"),
            ExecuteError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ExecuteError {}

impl From<ParseError> for ExecuteError {
    fn from(e: ParseError) -> Self {
        ExecuteError::Parse(e)
    }
}

impl From<MuxError> for ExecuteError {
    fn from(e: MuxError) -> Self {
        ExecuteError::Mux(e)
    }
}

impl From<DecodeError> for ExecuteError {
    fn from(e: DecodeError) -> Self {
        ExecuteError::Decode(e)
    }
}

/// Failures a [`crate::runtime::Runtime`] handler can hand back.
#[derive(Debug, Clone)]
pub enum HandlerError {
    Spec(SpecError),
    Decode(DecodeError),
    Execute(ExecuteError),
}

impl HandlerError {
    pub fn severity(&self) -> Severity {
        match self {
            HandlerError::Spec(e) => e.severity(),
            HandlerError::Decode(e) => e.severity(),
            HandlerError::Execute(e) => e.severity(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Spec(e) => write!(f, "{e}"),
            HandlerError::Decode(e) => write!(f, "{e}"),
            HandlerError::Execute(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<SpecError> for HandlerError {
    fn from(e: SpecError) -> Self {
        HandlerError::Spec(e)
    }
}

impl From<DecodeError> for HandlerError {
    fn from(e: DecodeError) -> Self {
        HandlerError::Decode(e)
    }
}

impl From<ExecuteError> for HandlerError {
    fn from(e: ExecuteError) -> Self {
        HandlerError::Execute(e)
    }
}
