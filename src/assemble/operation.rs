//! Operations are the nodes of the scope tree
//!
//! Simple operations load their operands (in order) and produce at most one result. Composite
//! operations own nested scopes and decide themselves how control flows between them.

use crate::jvm::code::{BranchCond, Instruction};
use crate::jvm::{BinaryName, MethodRef};

/// Consumed value, with the instructions converting it to the type the consumer expects
#[derive(Debug)]
pub(crate) struct Operand {
    pub value: usize,
    pub coercion: Vec<Instruction>,
}

#[derive(Debug)]
pub(crate) enum OpKind {
    /// Straight-line instructions after the operands
    Insns(Vec<Instruction>),

    /// `new`, `dup`, the constructor arguments, then `invokespecial`
    New { class: BinaryName, ctor: MethodRef },

    /// Push 1 if the condition holds on the operands, 0 otherwise
    Compare {
        prefix: Option<Instruction>,
        cond: BranchCond,
    },

    /// Write the operand into a variable (`declare` marks where the variable's slot is assigned)
    Store { var: usize, declare: bool },

    /// `iinc` on an `int` variable
    Inc { var: usize, delta: i16 },

    /// Operand (after coercion) becomes the result
    Copy,

    /// Exception on the stack at the start of a handler
    Caught,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum JumpKind {
    Break,
    Continue,
}

/// Finally copy to run when an exit edge leaves a try block
#[derive(Debug)]
pub(crate) struct Cleanup {
    pub try_id: usize,
    pub scope: usize,
}

#[derive(Debug)]
pub(crate) enum Operation {
    Simple {
        kind: OpKind,
        operands: Vec<Operand>,
        result: Option<usize>,
    },

    /// Plain nested scope
    Block(usize),

    If {
        cond: Operand,
        when_true: usize,
        when_false: Option<usize>,
    },

    /// Body scope (of kind `Loop`), and the update section jumped to by `continue`
    Loop { body: usize, update: Option<usize> },

    /// Leave `target` unless the condition holds
    ExitUnless { cond: Operand, target: usize },

    /// `break` (to the exit) or `continue` (to the continue label) of `target`
    Jump {
        kind: JumpKind,
        target: usize,
        cleanups: Vec<Cleanup>,
    },

    /// Cleanups run before the value is loaded
    Return {
        value: Option<Operand>,
        cleanups: Vec<Cleanup>,
    },

    Throw { value: Operand },

    Try(Box<TryOp>),

    Switch(Box<SwitchOp>),
}

#[derive(Debug)]
pub(crate) struct TryOp {
    pub id: usize,

    /// Scope holding the body, handlers, and finally copies
    pub frame: usize,

    pub body: usize,

    /// Finally copy on normal completion of the body
    pub body_exit: Vec<Cleanup>,

    pub catches: Vec<CatchClause>,

    /// Handler running the finally copy on exceptional exits
    pub catch_all: Option<usize>,
}

#[derive(Debug)]
pub(crate) struct CatchClause {
    pub catch_type: BinaryName,
    pub scope: usize,
    pub exit: Vec<Cleanup>,
}

#[derive(Debug)]
pub(crate) struct SwitchOp {
    pub kind: SwitchKind,
    pub disc: Operand,

    /// Scope of kind `Switch` containing the arms (`break` target)
    pub frame: usize,

    /// Arms in declaration order
    pub arms: Vec<Arm>,

    pub fallthrough: bool,
}

#[derive(Debug)]
pub(crate) enum SwitchKind {
    Int,
    String,

    /// Indirected through a lazily built table (see `switch_table`)
    Enum {
        enum_type: BinaryName,
        accessor: MethodRef,
    },
}

#[derive(Debug)]
pub(crate) struct Arm {
    pub keys: Vec<CaseKey>,
    pub is_default: bool,
    pub scope: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum CaseKey {
    Int(i32),
    String(String),

    /// Dense index from the switch table
    Index(i32),
}

impl Operation {
    /// Value loaded before anything else, if any
    ///
    /// A pending value which is this operation's top and read nowhere else can be left on the
    /// stack by the operation which produced it.
    pub fn top(&self) -> Option<usize> {
        match self {
            Operation::Simple {
                kind: OpKind::New { .. } | OpKind::Caught,
                ..
            } => None,
            Operation::Simple { operands, .. } => operands.first().map(|operand| operand.value),
            Operation::If { cond, .. } | Operation::ExitUnless { cond, .. } => Some(cond.value),
            Operation::Return {
                value: Some(value),
                cleanups,
            } if cleanups.is_empty() => Some(value.value),
            Operation::Throw { value } => Some(value.value),
            Operation::Switch(switch) => match switch.kind {
                SwitchKind::Int => Some(switch.disc.value),
                SwitchKind::String | SwitchKind::Enum { .. } => None,
            },
            _ => None,
        }
    }

    /// Values read directly by this operation (not by nested scopes)
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Operation::Simple { operands, .. } => operands.iter().collect(),
            Operation::If { cond, .. } | Operation::ExitUnless { cond, .. } => vec![cond],
            Operation::Return {
                value: Some(value), ..
            } => vec![value],
            Operation::Throw { value } => vec![value],
            Operation::Switch(switch) => vec![&switch.disc],
            _ => vec![],
        }
    }

    /// Scopes owned by this operation, in emission order
    pub fn nested_scopes(&self) -> Vec<usize> {
        fn cleanup_scopes(cleanups: &[Cleanup]) -> impl Iterator<Item = usize> + '_ {
            cleanups.iter().map(|cleanup| cleanup.scope)
        }

        match self {
            Operation::Simple { .. }
            | Operation::ExitUnless { .. }
            | Operation::Throw { .. } => vec![],
            Operation::Block(scope) => vec![*scope],
            Operation::If {
                when_true,
                when_false,
                ..
            } => when_false.iter().copied().chain([*when_true]).collect(),
            Operation::Loop { body, update } => [*body].into_iter().chain(*update).collect(),
            Operation::Jump { cleanups, .. } | Operation::Return { cleanups, .. } => {
                cleanup_scopes(cleanups).collect()
            }
            Operation::Try(try_op) => {
                let mut scopes = vec![try_op.body];
                scopes.extend(cleanup_scopes(&try_op.body_exit));
                for clause in &try_op.catches {
                    scopes.push(clause.scope);
                    scopes.extend(cleanup_scopes(&clause.exit));
                }
                scopes.extend(try_op.catch_all);
                scopes
            }
            Operation::Switch(switch) => switch.arms.iter().map(|arm| arm.scope).collect(),
        }
    }
}
