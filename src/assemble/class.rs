use super::method::MethodBuilder;
use super::switch_table::{build_accessor, SwitchTables};
use super::{Error, Settings};
use crate::jvm::code::Code;
use crate::jvm::{
    BinaryName, ClassAccessFlags, ClassHeader, ClassWriter, FieldAccessFlags, FieldHeader,
    FieldRef, FieldType, MethodDescriptor, MethodHeader, RenderDescriptor, UnqualifiedName,
};
use std::mem;

/// Assembles one class or interface
///
/// Members are added in order, and method bodies are sealed as soon as they are built. Nothing
/// reaches a [`ClassWriter`] until [`TypeBuilder::close`].
pub struct TypeBuilder {
    name: BinaryName,
    super_class: BinaryName,
    interfaces: Vec<BinaryName>,
    access_flags: ClassAccessFlags,
    settings: Settings,

    fields: Vec<FieldHeader>,
    methods: Vec<AssembledMethod>,

    /// Enum switch tables requested so far
    pub(crate) tables: SwitchTables,

    /// Set once some method failed to build
    poisoned: bool,
}

struct AssembledMethod {
    header: MethodHeader,

    /// `None` for abstract and native methods
    code: Option<Code>,
}

impl TypeBuilder {
    pub fn new(
        name: BinaryName,
        super_class: BinaryName,
        interfaces: Vec<BinaryName>,
    ) -> TypeBuilder {
        TypeBuilder {
            name,
            super_class,
            interfaces,
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            settings: Settings::default(),
            fields: vec![],
            methods: vec![],
            tables: SwitchTables::default(),
            poisoned: false,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> TypeBuilder {
        self.settings = settings;
        self
    }

    /// Replace the access flags (`public super` by default)
    pub fn with_access(mut self, access_flags: ClassAccessFlags) -> TypeBuilder {
        self.access_flags = access_flags;
        self
    }

    pub fn name(&self) -> &BinaryName {
        &self.name
    }

    pub fn super_class(&self) -> &BinaryName {
        &self.super_class
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// Declare a field
    pub fn field(
        &mut self,
        name: UnqualifiedName,
        descriptor: FieldType,
        access_flags: FieldAccessFlags,
    ) -> Result<FieldRef, Error> {
        if self.is_interface() && !access_flags.contains(FieldAccessFlags::STATIC) {
            return Err(Error::Unsupported(format!(
                "interface {} cannot have instance field {}",
                self.name, name
            )));
        }
        let duplicate = self
            .fields
            .iter()
            .any(|field| field.name == name && field.descriptor == descriptor);
        if duplicate {
            return Err(Error::DuplicateMember {
                name,
                descriptor: descriptor.render(),
            });
        }

        let field = FieldRef::new(self.name.clone(), name.clone(), descriptor.clone());
        self.fields.push(FieldHeader {
            name,
            descriptor,
            access_flags,
        });
        Ok(field)
    }

    /// Declare a method (`public` unless [`MethodBuilder::access`] says otherwise)
    pub fn method(
        &mut self,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> MethodBuilder<'_> {
        MethodBuilder::method(self, name, descriptor)
    }

    /// Declare a constructor
    ///
    /// If the body never calls a constructor on `this`, a call to the zero-argument constructor
    /// of the super class is added at the start (see [`Settings::synthesize_super_call`]).
    pub fn constructor(&mut self, parameters: Vec<FieldType>) -> MethodBuilder<'_> {
        MethodBuilder::constructor(self, parameters)
    }

    /// Declare the static initializer
    pub fn static_initializer(&mut self) -> MethodBuilder<'_> {
        MethodBuilder::static_initializer(self)
    }

    pub(crate) fn check_new_method(
        &self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor,
    ) -> Result<(), Error> {
        let duplicate = self.methods.iter().any(|method| {
            &method.header.name == name && &method.header.descriptor == descriptor
        });
        if duplicate {
            return Err(Error::DuplicateMember {
                name: name.clone(),
                descriptor: descriptor.render(),
            });
        }
        Ok(())
    }

    pub(crate) fn push_method(&mut self, header: MethodHeader, code: Option<Code>) {
        self.methods.push(AssembledMethod { header, code });
    }

    pub(crate) fn poison(&mut self) {
        self.poisoned = true;
    }

    /// Add the members backing enum switches
    fn add_switch_tables(&mut self) -> Result<(), Error> {
        let tables = mem::take(&mut self.tables).into_tables();
        let field_flags = self.settings.switch_table_field_flags;
        let method_flags = self.settings.switch_table_method_flags;
        for table in &tables {
            self.field(
                table.field.name.clone(),
                table.field.descriptor.clone(),
                field_flags,
            )?;
            self.method(
                table.accessor.name.clone(),
                table.accessor.descriptor.clone(),
            )
            .access(method_flags)
            .body(|b| build_accessor(b, table))?;
        }
        Ok(())
    }

    /// Hand the finished class to a writer
    pub fn close(mut self, writer: &mut dyn ClassWriter) -> Result<(), Error> {
        if self.poisoned {
            return Err(Error::IncompleteType(self.name));
        }
        self.add_switch_tables()?;

        writer.open_class(&ClassHeader {
            name: self.name.clone(),
            super_class: self.super_class.clone(),
            interfaces: self.interfaces.clone(),
            access_flags: self.access_flags,
        })?;
        for field in &self.fields {
            writer.field(field)?;
        }
        for method in &self.methods {
            writer.open_method(&method.header)?;
            match &method.code {
                Some(code) => {
                    code.write_to(writer)?;
                    writer.close_method(code.max_locals)?;
                }
                None => writer.close_method(0)?,
            }
        }
        writer.close_class()?;

        log::debug!(
            "Wrote {} ({} fields, {} methods)",
            self.name,
            self.fields.len(),
            self.methods.len()
        );
        Ok(())
    }
}
