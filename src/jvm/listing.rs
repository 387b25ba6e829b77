use super::code::{BranchInstruction, CodeEntry, ExceptionRange, Instruction, Label};
use super::{
    BinaryName, ClassHeader, ClassWriter, Error, FieldHeader, MethodHeader, Name,
    RenderDescriptor, UnqualifiedName,
};
use std::collections::HashSet;
use std::fmt;

/// In-memory [`ClassWriter`]
///
/// Records every directive it receives, enforcing the ordering and label contract of the writer
/// boundary along the way. Useful for tests and for eyeballing generated code through its
/// `Display` implementation.
#[derive(Default, Debug)]
pub struct Listing {
    /// Finished classes, in the order they were closed
    pub classes: Vec<ClassListing>,

    current_class: Option<ClassListing>,
    current_method: Option<OpenMethod>,
}

#[derive(Clone, Debug)]
pub struct ClassListing {
    pub header: ClassHeader,
    pub fields: Vec<FieldHeader>,
    pub methods: Vec<MethodListing>,
}

#[derive(Clone, Debug)]
pub struct MethodListing {
    pub header: MethodHeader,
    pub code: Vec<CodeEntry>,
    pub exception_ranges: Vec<ExceptionRange>,
    pub max_locals: u16,
}

#[derive(Debug)]
struct OpenMethod {
    header: MethodHeader,
    code: Vec<CodeEntry>,
    exception_ranges: Vec<ExceptionRange>,
    placed: HashSet<Label>,
}

impl Listing {
    pub fn new() -> Listing {
        Listing::default()
    }

    /// Look up a finished class by name
    pub fn class(&self, name: &BinaryName) -> Option<&ClassListing> {
        self.classes.iter().find(|class| &class.header.name == name)
    }

    fn class_mut(&mut self, call: &'static str) -> Result<&mut ClassListing, Error> {
        if self.current_method.is_some() {
            return Err(Error::WriterState {
                call,
                state: "while a method is open",
            });
        }
        self.current_class.as_mut().ok_or(Error::WriterState {
            call,
            state: "outside of a class",
        })
    }

    fn method_mut(&mut self, call: &'static str) -> Result<&mut OpenMethod, Error> {
        self.current_method.as_mut().ok_or(Error::WriterState {
            call,
            state: "outside of a method",
        })
    }
}

impl ClassListing {
    /// First method with the given name
    pub fn method(&self, name: &str) -> Option<&MethodListing> {
        self.methods
            .iter()
            .find(|method| method.header.name.as_str() == name)
    }

    /// Method with the given name and rendered descriptor
    pub fn method_with_descriptor(&self, name: &str, descriptor: &str) -> Option<&MethodListing> {
        self.methods.iter().find(|method| {
            method.header.name.as_str() == name && method.header.descriptor.render() == descriptor
        })
    }

    pub fn field(&self, name: &UnqualifiedName) -> Option<&FieldHeader> {
        self.fields.iter().find(|field| &field.name == name)
    }
}

impl MethodListing {
    /// Index into `code` of the entry placing this label
    pub fn label_index(&self, label: Label) -> Option<usize> {
        self.code
            .iter()
            .position(|entry| entry == &CodeEntry::Label(label))
    }

    /// Instructions and branches, without the labels
    pub fn instructions(&self) -> impl Iterator<Item = &CodeEntry> {
        self.code
            .iter()
            .filter(|entry| !matches!(entry, CodeEntry::Label(_)))
    }
}

impl ClassWriter for Listing {
    fn open_class(&mut self, header: &ClassHeader) -> Result<(), Error> {
        if self.current_class.is_some() {
            return Err(Error::WriterState {
                call: "open_class",
                state: "while a class is open",
            });
        }
        self.current_class = Some(ClassListing {
            header: header.clone(),
            fields: vec![],
            methods: vec![],
        });
        Ok(())
    }

    fn field(&mut self, header: &FieldHeader) -> Result<(), Error> {
        self.class_mut("field")?.fields.push(header.clone());
        Ok(())
    }

    fn open_method(&mut self, header: &MethodHeader) -> Result<(), Error> {
        self.class_mut("open_method")?;
        self.current_method = Some(OpenMethod {
            header: header.clone(),
            code: vec![],
            exception_ranges: vec![],
            placed: HashSet::new(),
        });
        Ok(())
    }

    fn place_label(&mut self, label: Label) -> Result<(), Error> {
        let method = self.method_mut("place_label")?;
        if !method.placed.insert(label) {
            return Err(Error::DuplicateLabel(label));
        }
        method.code.push(CodeEntry::Label(label));
        Ok(())
    }

    fn instruction(&mut self, insn: &Instruction) -> Result<(), Error> {
        let method = self.method_mut("instruction")?;
        method.code.push(CodeEntry::Instruction(insn.clone()));
        Ok(())
    }

    fn branch(&mut self, insn: &BranchInstruction<Label>) -> Result<(), Error> {
        let method = self.method_mut("branch")?;
        method.code.push(CodeEntry::Branch(insn.clone()));
        Ok(())
    }

    fn exception_range(&mut self, range: &ExceptionRange) -> Result<(), Error> {
        let method = self.method_mut("exception_range")?;
        method.exception_ranges.push(range.clone());
        Ok(())
    }

    fn close_method(&mut self, max_locals: u16) -> Result<(), Error> {
        let method = self.current_method.take().ok_or(Error::WriterState {
            call: "close_method",
            state: "outside of a method",
        })?;

        let jump_targets = method.code.iter().flat_map(|entry| match entry {
            CodeEntry::Branch(insn) => insn.jump_targets(),
            _ => vec![],
        });
        let range_labels = method
            .exception_ranges
            .iter()
            .flat_map(|range| [range.start, range.end, range.handler]);
        for label in jump_targets.chain(range_labels) {
            if !method.placed.contains(&label) {
                return Err(Error::UnplacedJumpTarget(label));
            }
        }

        let class = self.class_mut("close_method")?;
        class.methods.push(MethodListing {
            header: method.header,
            code: method.code,
            exception_ranges: method.exception_ranges,
            max_locals,
        });
        Ok(())
    }

    fn close_class(&mut self) -> Result<(), Error> {
        self.class_mut("close_class")?;
        if let Some(class) = self.current_class.take() {
            self.classes.push(class);
        }
        Ok(())
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in &self.classes {
            write!(f, "{}", class)?;
        }
        Ok(())
    }
}

impl fmt::Display for ClassListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "class {} extends {}",
            self.header.name, self.header.super_class
        )?;
        if !self.header.interfaces.is_empty() {
            let interfaces: Vec<&str> = self
                .header
                .interfaces
                .iter()
                .map(|interface| interface.as_str())
                .collect();
            write!(f, " implements {}", interfaces.join(", "))?;
        }
        writeln!(f, " {{")?;
        for field in &self.fields {
            writeln!(
                f,
                "  field {} {} {:?}",
                field.name,
                field.descriptor.render(),
                field.access_flags
            )?;
        }
        for method in &self.methods {
            write!(f, "{}", method)?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for MethodListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  method {}{} {:?} (max_locals = {})",
            self.header.name,
            self.header.descriptor.render(),
            self.header.access_flags,
            self.max_locals
        )?;
        for entry in &self.code {
            match entry {
                CodeEntry::Label(label) => writeln!(f, "   {}:", label)?,
                CodeEntry::Instruction(insn) => writeln!(f, "      {:?}", insn)?,
                CodeEntry::Branch(insn) => writeln!(f, "      {:?}", insn)?,
            }
        }
        for range in &self.exception_ranges {
            let catch_type = range
                .catch_type
                .as_ref()
                .map_or("any", |catch_type| catch_type.as_str());
            writeln!(
                f,
                "      catch {} [{}, {}) -> {}",
                catch_type, range.start, range.end, range.handler
            )?;
        }
        Ok(())
    }
}
