use super::code::{BranchInstruction, ExceptionRange, Instruction, Label};
use super::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, UnqualifiedName,
};

/// Class-level information, known before any member is written
#[derive(Clone, Debug)]
pub struct ClassHeader {
    pub name: BinaryName,
    pub super_class: BinaryName,
    pub interfaces: Vec<BinaryName>,
    pub access_flags: ClassAccessFlags,
}

#[derive(Clone, Debug)]
pub struct FieldHeader {
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
    pub access_flags: FieldAccessFlags,
}

#[derive(Clone, Debug)]
pub struct MethodHeader {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub access_flags: MethodAccessFlags,
}

/// Backend which turns a stream of directives into a class file (or anything else)
///
/// Calls arrive strictly in this order:
///
/// ```text
/// open_class (field | open_method (place_label | instruction | branch)* exception_range* close_method)* close_class
/// ```
///
/// Methods without code (abstract or native) are opened and immediately closed. The assembler
/// guarantees that every label is placed exactly once, that every jump target and exception range
/// boundary is placed before the method is closed, and that exception ranges are reported
/// innermost first. Constant pool layout, instruction encoding, and stack map frames are the
/// writer's business.
pub trait ClassWriter {
    fn open_class(&mut self, header: &ClassHeader) -> Result<(), Error>;

    fn field(&mut self, header: &FieldHeader) -> Result<(), Error>;

    fn open_method(&mut self, header: &MethodHeader) -> Result<(), Error>;

    /// Mark the position of the next instruction
    fn place_label(&mut self, label: Label) -> Result<(), Error>;

    fn instruction(&mut self, insn: &Instruction) -> Result<(), Error>;

    fn branch(&mut self, insn: &BranchInstruction<Label>) -> Result<(), Error>;

    fn exception_range(&mut self, range: &ExceptionRange) -> Result<(), Error>;

    /// Finish the current method (`max_locals` is 0 for methods without code)
    fn close_method(&mut self, max_locals: u16) -> Result<(), Error>;

    fn close_class(&mut self) -> Result<(), Error>;
}
