use super::ScopeSite;
use crate::jvm::{self, BinaryName, UnqualifiedName};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    BytecodeGen(#[from] jvm::Error),

    /// A value (or a `break`/`continue` target) used from a scope that is not nested inside the
    /// scope owning it
    #[error("value owned by the {value} used from the {consumer}")]
    ScopeViolation { value: ScopeSite, consumer: ScopeSite },

    /// A value or scope handle created by a different method body
    #[error("handle belongs to a different method body")]
    ForeignValue,

    #[error("`continue` needs a loop, but targets the {0}")]
    NotALoop(ScopeSite),

    #[error("duplicate case label {0}")]
    DuplicateCaseLabel(String),

    #[error("switch already has a default case")]
    DuplicateDefault,

    /// Case label of the wrong kind for the switch (eg. a string label on an `int` switch)
    #[error("case label {0} does not fit the switch discriminant")]
    CaseLabelMismatch(String),

    #[error("exception type {0} is already caught by an earlier clause")]
    DuplicateCatchType(BinaryName),

    #[error("`{operation}` is not allowed on a try block {state}")]
    InvalidTryState {
        operation: &'static str,
        state: &'static str,
    },

    /// Some path through a non-`void` method can fall off the end
    #[error("method {method} can complete without a return or throw")]
    MissingTerminal { method: String },

    #[error("constructor {method} never calls a constructor on `this`")]
    MissingConstructorCall { method: String },

    #[error("field {0} of `this` is accessed before the constructor call")]
    FieldAccessBeforeConstructorCall(UnqualifiedName),

    #[error("constructor calls on `this` are only allowed in constructors")]
    NotInConstructor,

    #[error("{method} takes {expected} arguments, but {found} were supplied")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("member {name} {descriptor} is declared more than once")]
    DuplicateMember {
        name: UnqualifiedName,
        descriptor: String,
    },

    /// `this` requested in a static method
    #[error("static methods have no receiver")]
    NoReceiver,

    #[error("method has no parameter {0}")]
    ParameterOutOfRange(usize),

    /// A method of the type failed to build, so the type cannot be written
    #[error("type {0} has a method which failed to build")]
    IncompleteType(BinaryName),

    /// The result of a `void` method used as a value
    #[error("{0} returns void")]
    VoidValue(String),

    #[error("malformed name: {0}")]
    MalformedName(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}
