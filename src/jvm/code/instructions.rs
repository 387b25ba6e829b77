//! Instructions as method bodies are built, before any byte offsets exist
//!
//! Variants are per operation, not per opcode. Loads, stores and `iinc` take a `u16` slot, so
//! the writer picks the short form, the indexed form or a `wide` prefix. Conditional jumps carry
//! their comparison as a field. Opcodes that are never generated (`jsr`, `ret`, monitors,
//! `invokedynamic`) have no variant.
//!
//! Jumps name [`super::Label`]s; turning them into offsets is left to the
//! [`crate::jvm::ClassWriter`].

use crate::jvm::{BaseType, BinaryName, FieldRef, MethodRef, RefType};
use std::borrow::Cow;

/// Instruction after which execution always continues with the next entry
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    /// `ldc` or `ldc_w`, by constant pool index
    Ldc(Constant),
    /// `ldc2_w`
    Ldc2(Constant),
    ILoad(u16),
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16),
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType),
    LSh(ShiftType),
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16),
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode),
    DCmp(CompareMode),
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),
    New(BinaryName),
    NewArray(BaseType),
    ANewArray(RefType),
    ArrayLength,
    CheckCast(RefType),
    InstanceOf(RefType),
}

impl Instruction {
    /// Local variable touched by the instruction, along with the width of the access
    pub fn local_access(&self) -> Option<(u16, usize)> {
        match self {
            Instruction::ILoad(idx)
            | Instruction::FLoad(idx)
            | Instruction::ALoad(idx)
            | Instruction::IStore(idx)
            | Instruction::FStore(idx)
            | Instruction::AStore(idx)
            | Instruction::IInc(idx, _) => Some((*idx, 1)),
            Instruction::LLoad(idx)
            | Instruction::DLoad(idx)
            | Instruction::LStore(idx)
            | Instruction::DStore(idx) => Some((*idx, 2)),
            _ => None,
        }
    }
}

/// Constants which can be pushed with `ldc` and `ldc2_w`
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Cow<'static, str>),
    Class(RefType),
}

/// Instruction which may transfer control somewhere other than the next entry
///
/// Conditional jumps continue with the next entry when their test fails.
#[derive(Clone, Debug, PartialEq)]
pub enum BranchInstruction<Lbl> {
    /// `if<cond>`: one `int` against zero
    If(OrdComparison, Lbl),
    /// `if_icmp<cond>`
    IfICmp(OrdComparison, Lbl),
    /// `if_acmp<cond>`
    IfACmp(EqComparison, Lbl),
    /// `ifnull` or `ifnonnull`
    IfNull(EqComparison, Lbl),
    Goto(Lbl),
    TableSwitch {
        /// Taken outside `low..low + targets.len()`
        default: Lbl,
        low: i32,
        /// Target of `low + i` at index `i`
        targets: Vec<Lbl>,
    },
    LookupSwitch {
        default: Lbl,
        /// Keys in ascending order
        targets: Vec<(i32, Lbl)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl<Lbl: Copy> BranchInstruction<Lbl> {
    /// Whether execution may continue with the next entry
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(..)
                | BranchInstruction::IfICmp(..)
                | BranchInstruction::IfACmp(..)
                | BranchInstruction::IfNull(..)
        )
    }

    /// Labels the instruction may jump to, not counting the next entry
    pub fn jump_targets(&self) -> Vec<Lbl> {
        match self {
            BranchInstruction::If(_, target)
            | BranchInstruction::IfICmp(_, target)
            | BranchInstruction::IfACmp(_, target)
            | BranchInstruction::IfNull(_, target)
            | BranchInstruction::Goto(target) => vec![*target],
            BranchInstruction::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default).chain(targets.iter().copied()).collect(),
            BranchInstruction::LookupSwitch { default, targets } => std::iter::once(*default)
                .chain(targets.iter().map(|&(_, target)| target))
                .collect(),
            _ => vec![],
        }
    }
}

/// Direction of `ishl`/`ishr`/`iushr` and their `long` twins
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// NaN handling of `fcmp`/`dcmp`
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// NaN compares as less (`fcmpl`)
    L,

    /// NaN compares as greater (`fcmpg`)
    G,
}

/// Ordering tests of `if<cond>` and `if_icmp<cond>`
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Tests available on references
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Dispatch kind of an `invoke*` instruction
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    /// Carries the argument word count (receiver included) that `invokeinterface` encodes
    Interface(u8),
}
