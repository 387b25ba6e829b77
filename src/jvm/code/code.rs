use crate::jvm::code::{BranchInstruction, Instruction, Label};
use crate::jvm::{BinaryName, ClassWriter, Error};

/// One element of a linear method body
#[derive(Clone, Debug, PartialEq)]
pub enum CodeEntry {
    Label(Label),
    Instruction(Instruction),
    Branch(BranchInstruction<Label>),
}

/// Entry in the exception table of a method
///
/// Covers every instruction placed at or after `start` and before `end`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionRange {
    pub start: Label,
    pub end: Label,
    pub handler: Label,

    /// Class of exceptions caught (`None` catches everything)
    pub catch_type: Option<BinaryName>,
}

/// Semantic representation of a method body
#[derive(Clone, Debug)]
pub struct Code {
    /// Maximum size of locals through the method
    pub max_locals: u16,

    /// Labels and instructions, in order
    pub entries: Vec<CodeEntry>,

    /// Exception table (innermost ranges first)
    pub exception_ranges: Vec<ExceptionRange>,
}

impl Code {
    /// Replay the body into a writer, between its `open_method` and `close_method` calls
    pub fn write_to(&self, writer: &mut dyn ClassWriter) -> Result<(), Error> {
        for entry in &self.entries {
            match entry {
                CodeEntry::Label(label) => writer.place_label(*label)?,
                CodeEntry::Instruction(insn) => writer.instruction(insn)?,
                CodeEntry::Branch(insn) => writer.branch(insn)?,
            }
        }
        for range in &self.exception_ranges {
            writer.exception_range(range)?;
        }
        Ok(())
    }

    /// Number of (non-label) instructions
    pub fn instruction_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry, CodeEntry::Label(_)))
            .count()
    }
}
