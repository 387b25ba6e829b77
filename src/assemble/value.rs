use crate::jvm::{FieldType, RefType};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of one method body
///
/// Every handle carries the token of the body that created it, so that a handle smuggled into a
/// different body is caught instead of silently aliasing some unrelated value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct MethodToken(u32);

impl MethodToken {
    pub(crate) fn fresh() -> MethodToken {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        MethodToken(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a value produced inside a method body
///
/// Handles are cheap to copy, but they are only valid in the scope where they were produced and
/// the scopes nested inside of it. Constants and parameters are valid everywhere in the body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Value {
    pub(crate) method: MethodToken,
    pub(crate) index: usize,
}

/// Mutable local variable
///
/// Unlike values, variables always live in a local slot. Reading one with
/// [`crate::assemble::BlockBuilder::get`] produces a snapshot value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Var {
    pub(crate) value: Value,
}

pub(crate) struct ValueData {
    pub ty: FieldType,

    /// Scope owning the value (`None` for constants and parameters)
    pub owner: Option<usize>,

    pub lifecycle: Lifecycle,
}

/// How a value comes into existence
///
/// Only `Pending` values are classified by the slot allocator.
#[derive(Clone, Debug)]
pub(crate) enum Lifecycle {
    /// Literal which gets pushed again at every use
    Constant(Literal),

    /// Parameter (or `this`) living in a fixed slot
    Parameter(u16),

    /// Mutable local, assigned a slot where it is declared
    Variable,

    /// Result of an operation, awaiting allocation
    Pending,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Cow<'static, str>),
    Null,
    Class(RefType),
}
