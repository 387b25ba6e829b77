//! Bytecode representation and generation
//!
//! ### Structure
//!
//! Method bodies are a linear stream of labels and instructions. We split up the [list of
//! bytecode instructions][0] into two groups:
//!
//!   - [`Instruction`] for straight-line instructions
//!   - [`BranchInstruction`] for instructions that may branch, return, or throw
//!
//! ### Code generation
//!
//! [`CodeBuilder`] accumulates a method body from top to bottom. It tracks reachability so that
//! dead instructions are never recorded, and it checks that every referenced label is eventually
//! placed. The finished [`Code`] is replayed into a [`crate::jvm::ClassWriter`].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod code;
mod code_builder;
mod code_builder_exts;
mod instructions;
mod label;

pub use code::*;
pub use code_builder::*;
pub use code_builder_exts::*;
pub use instructions::*;
pub use label::*;
