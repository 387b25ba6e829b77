use crate::jvm::code::{
    BranchInstruction, Code, CodeEntry, ExceptionRange, Instruction, Label, LabelGenerator,
};
use crate::jvm::Error;
use std::collections::{HashMap, HashSet};

/// Append-only builder for one method body
///
/// Keeps track of placed and referenced labels, whether the next instruction is reachable, and
/// how many local slots the body touches.
///
/// ### Dead code
///
/// Structured control flow lowers to a lot of jumps that nothing ever reaches (the `goto` after
/// an arm that already returned, the finally copy after a `throw`, etc.). The JVM verifier does
/// not ignore dead bytecode; it still wants stack maps for it. Instead of a followup pass which
/// removes the dead code, we never record it in the first place: after an unconditional branch,
/// instructions are dropped until a label is placed which is either jumped to from somewhere
/// already or is the target of an exception handler.
///
/// This means a label must be referenced _before_ it is placed if the code following it is to
/// survive. Backward jumps are fine since the label was reached by fallthrough when it was
/// placed.
pub struct CodeBuilder {
    /// Entries emitted so far
    entries: Vec<CodeEntry>,

    /// Number of instructions recorded so far
    position: usize,

    /// Whether the next instruction can execute
    reachable: bool,

    /// Labels which have been placed, with their instruction position
    placed_labels: HashMap<Label, usize>,

    /// Labels which have been referenced from jumps or exception handlers
    referenced_labels: HashSet<Label>,

    /// Exception table in the order ranges were finished
    exception_ranges: Vec<ExceptionRange>,

    /// Highest local slot touched, plus its width
    max_locals: usize,

    /// Labels for this body
    label_generator: LabelGenerator,
}

impl CodeBuilder {
    /// Start a body whose parameters already occupy `parameter_length` slots
    ///
    /// The label generator must not overlap with labels already handed out for this method.
    pub fn new(label_generator: LabelGenerator, parameter_length: usize) -> CodeBuilder {
        CodeBuilder {
            entries: vec![],
            position: 0,
            reachable: true,
            placed_labels: HashMap::new(),
            referenced_labels: HashSet::new(),
            exception_ranges: vec![],
            max_locals: parameter_length,
            label_generator,
        }
    }

    /// Turn the builder into the method code
    pub fn result(self) -> Result<Code, Error> {
        let mut unplaced_labels: Vec<Label> = self
            .referenced_labels
            .iter()
            .chain(
                self.exception_ranges
                    .iter()
                    .flat_map(|range| [&range.start, &range.end]),
            )
            .filter(|label| !self.placed_labels.contains_key(*label))
            .copied()
            .collect();
        if self.reachable || !unplaced_labels.is_empty() {
            unplaced_labels.sort();
            unplaced_labels.dedup();
            return Err(Error::MethodCodeNotFinished {
                falls_off_end: self.reachable,
                unplaced_labels,
            });
        }

        let max_locals = u16::try_from(self.max_locals)
            .map_err(|_| Error::MethodCodeMaxLocalsOverflow(self.max_locals))?;

        Ok(Code {
            max_locals,
            entries: self.entries,
            exception_ranges: self.exception_ranges,
        })
    }

    /// Label not yet used anywhere in the body
    pub fn fresh_label(&mut self) -> Label {
        self.label_generator.fresh_label()
    }

    /// Can the next instruction be reached?
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Position (in instructions) of a placed label
    pub fn label_position(&self, label: Label) -> Option<usize> {
        self.placed_labels.get(&label).copied()
    }

    /// Number of instructions recorded so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Push a new instruction
    pub fn push_instruction(&mut self, insn: Instruction) -> Result<(), Error> {
        if self.reachable {
            if let Some((idx, width)) = insn.local_access() {
                self.max_locals = self.max_locals.max(idx as usize + width);
            }
            self.entries.push(CodeEntry::Instruction(insn));
            self.position += 1;
        }
        Ok(())
    }

    /// Push a new branch instruction, possibly making the code that follows unreachable
    pub fn push_branch_instruction(&mut self, insn: BranchInstruction<Label>) -> Result<(), Error> {
        if self.reachable {
            self.referenced_labels.extend(insn.jump_targets());
            self.reachable = insn.falls_through();
            self.entries.push(CodeEntry::Branch(insn));
            self.position += 1;
        }
        Ok(())
    }

    /// Place a label at the current position. This can fail if the label was already placed.
    ///
    /// Code after the label is reachable if either the code before was reachable (fallthrough)
    /// or the label was already referenced.
    pub fn place_label(&mut self, label: Label) -> Result<(), Error> {
        if self.placed_labels.insert(label, self.position).is_some() {
            return Err(Error::DuplicateLabel(label));
        }
        if self.referenced_labels.contains(&label) {
            self.reachable = true;
        }
        self.entries.push(CodeEntry::Label(label));
        Ok(())
    }

    /// Mark a label as referenced without jumping to it (eg. exception handlers)
    pub fn reference_label(&mut self, label: Label) {
        self.referenced_labels.insert(label);
    }

    /// Record an exception range, referencing its handler
    ///
    /// Ranges must be added innermost first.
    pub fn push_exception_range(&mut self, range: ExceptionRange) {
        self.reference_label(range.handler);
        self.exception_ranges.push(range);
    }
}
