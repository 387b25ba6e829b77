use super::block::BlockBuilder;
use super::class::TypeBuilder;
use super::emit;
use super::operation::{OpKind, Operand, Operation};
use super::scope::Scopes;
use super::slots;
use super::switch_table::SwitchTables;
use super::value::{Lifecycle, MethodToken, ValueData};
use super::{Error, Settings, Value};
use crate::jvm::code::{Code, CodeBuilderExts, Instruction, InvokeType, LabelGenerator};
use crate::jvm::{
    self, BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, MethodHeader, MethodRef,
    UnqualifiedName, Width,
};
use std::mem;
use std::panic::Location;

/// Everything recorded about one method body while it is being built
pub(crate) struct Body {
    pub token: MethodToken,

    /// Class declaring the method
    pub class: BinaryName,
    pub super_class: BinaryName,

    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,

    /// Set for `<init>` methods
    pub constructor: Option<ConstructorState>,

    pub scopes: Scopes,
    pub values: Vec<ValueData>,

    /// Hands out the labels of scopes (and later, of the emitted code)
    pub labels: LabelGenerator,

    pub this: Option<Value>,
    pub params: Vec<Value>,

    /// First slot after `this` and the parameters
    pub first_free_slot: usize,

    /// Try statements currently being built, innermost last
    pub try_frames: Vec<TryFrame>,
    pub next_try_id: usize,

    /// Switch tables of the declaring class, lent to the body while it is built
    pub tables: SwitchTables,

    pub settings: Settings,
}

#[derive(Default)]
pub(crate) struct ConstructorState {
    /// Whether `this` has been passed to a constructor yet
    pub init_called: bool,

    /// First field of `this` accessed before the constructor call
    pub early_field: Option<UnqualifiedName>,
}

/// Try statement under construction
pub(crate) struct TryFrame {
    pub id: usize,

    /// Scope of kind `TryFrame`
    pub scope: usize,

    /// Empty scopes standing in for the finally block on every exit edge
    pub placeholders: Vec<usize>,
}

impl Body {
    pub fn new(
        class: BinaryName,
        super_class: BinaryName,
        header: &MethodHeader,
        tables: SwitchTables,
        settings: Settings,
        origin: &'static Location<'static>,
    ) -> Result<Body, Error> {
        let token = MethodToken::fresh();
        let mut labels = LabelGenerator::default();
        let scopes = Scopes::new(&mut labels, origin);

        let mut values = vec![];
        let mut next_slot: usize = 0;
        let mut parameter = |values: &mut Vec<ValueData>, ty: FieldType| {
            let slot = u16::try_from(next_slot)
                .map_err(|_| jvm::Error::MethodCodeMaxLocalsOverflow(next_slot))?;
            next_slot += ty.width();
            values.push(ValueData {
                ty,
                owner: None,
                lifecycle: Lifecycle::Parameter(slot),
            });
            Ok::<Value, Error>(Value {
                method: token,
                index: values.len() - 1,
            })
        };

        let is_static = header.access_flags.contains(MethodAccessFlags::STATIC);
        let this = if is_static {
            None
        } else {
            Some(parameter(&mut values, FieldType::object(class.clone()))?)
        };
        let params = header
            .descriptor
            .parameters
            .iter()
            .map(|ty| parameter(&mut values, ty.clone()))
            .collect::<Result<Vec<Value>, Error>>()?;
        let first_free_slot = next_slot;

        let constructor = if header.name == UnqualifiedName::INIT {
            Some(ConstructorState::default())
        } else {
            None
        };

        Ok(Body {
            token,
            class,
            super_class,
            name: header.name.clone(),
            descriptor: header.descriptor.clone(),
            constructor,
            scopes,
            values,
            labels,
            this,
            params,
            first_free_slot,
            try_frames: vec![],
            next_try_id: 0,
            tables,
            settings,
        })
    }

    /// Static method body on a placeholder class
    #[cfg(test)]
    #[track_caller]
    pub fn for_test(descriptor: MethodDescriptor, settings: Settings) -> Body {
        use crate::jvm::Name;

        let header = MethodHeader {
            name: UnqualifiedName::from_string(String::from("test")).unwrap(),
            descriptor,
            access_flags: MethodAccessFlags::STATIC,
        };
        Body::new(
            BinaryName::from_string(String::from("demo/Test")).unwrap(),
            BinaryName::OBJECT,
            &header,
            SwitchTables::default(),
            settings,
            Location::caller(),
        )
        .unwrap()
    }

    pub fn root_builder(&mut self) -> BlockBuilder<'_> {
        BlockBuilder::new(self, 0)
    }

    /// Look up a value, checking that it belongs to this body
    pub fn value(&self, value: Value) -> Result<&ValueData, Error> {
        if value.method != self.token {
            return Err(Error::ForeignValue);
        }
        self.values.get(value.index).ok_or(Error::ForeignValue)
    }

    fn display_name(&self) -> String {
        format!("{}.{}{}", self.class, self.name, self.descriptor)
    }

    /// Allocate slots and lower the scope tree into code
    pub fn seal(mut self) -> Result<(Code, SwitchTables), Error> {
        self.complete_constructor()?;

        let allocation = slots::allocate(&self);
        let mut code = emit::emit(&self, &allocation)?;

        if code.is_reachable() {
            if self.descriptor.return_type.is_none() && self.settings.synthesize_void_return {
                code.return_(None)?;
            } else {
                return Err(Error::MissingTerminal {
                    method: self.display_name(),
                });
            }
        }

        let code = code.result()?;
        log::trace!(
            "Sealed {}: {} instructions, {} exception ranges, {} local slots, {} values kept on the stack",
            self.display_name(),
            code.instruction_count(),
            code.exception_ranges.len(),
            allocation.max_locals,
            allocation.elided
        );
        Ok((code, self.tables))
    }

    /// Make sure a constructor initializes `this`
    fn complete_constructor(&mut self) -> Result<(), Error> {
        let (state, this) = match (&self.constructor, self.this) {
            (Some(state), Some(this)) => (state, this),
            _ => return Ok(()),
        };
        if state.init_called {
            return Ok(());
        }
        if !self.settings.synthesize_super_call {
            return Err(Error::MissingConstructorCall {
                method: self.display_name(),
            });
        }

        let super_init = MethodRef::no_arg_init(self.super_class.clone());
        let call = Operation::Simple {
            kind: OpKind::Insns(vec![Instruction::Invoke(InvokeType::Special, super_init)]),
            operands: vec![Operand {
                value: this.index,
                coercion: vec![],
            }],
            result: None,
        };
        self.scopes.get_mut(0).ops.insert(0, call);
        Ok(())
    }
}

/// What kind of member a [`MethodBuilder`] declares
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MethodKind {
    Method,
    Constructor,
    StaticInitializer,
}

/// Declares one method of a [`TypeBuilder`]
///
/// Finish with either [`MethodBuilder::body`] (for methods with code) or
/// [`MethodBuilder::declare`] (for `abstract` and `native` methods).
pub struct MethodBuilder<'t> {
    class: &'t mut TypeBuilder,
    name: UnqualifiedName,
    descriptor: MethodDescriptor,
    access_flags: MethodAccessFlags,
    kind: MethodKind,
}

impl<'t> MethodBuilder<'t> {
    pub(crate) fn method(
        class: &'t mut TypeBuilder,
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
    ) -> MethodBuilder<'t> {
        MethodBuilder {
            class,
            name,
            descriptor,
            access_flags: MethodAccessFlags::PUBLIC,
            kind: MethodKind::Method,
        }
    }

    pub(crate) fn constructor(
        class: &'t mut TypeBuilder,
        parameters: Vec<FieldType>,
    ) -> MethodBuilder<'t> {
        MethodBuilder {
            class,
            name: UnqualifiedName::INIT,
            descriptor: MethodDescriptor::new(parameters, None),
            access_flags: MethodAccessFlags::PUBLIC,
            kind: MethodKind::Constructor,
        }
    }

    pub(crate) fn static_initializer(class: &'t mut TypeBuilder) -> MethodBuilder<'t> {
        MethodBuilder {
            class,
            name: UnqualifiedName::CLINIT,
            descriptor: MethodDescriptor::new(vec![], None),
            access_flags: MethodAccessFlags::STATIC,
            kind: MethodKind::StaticInitializer,
        }
    }

    /// Replace the access flags (`public` by default, `static` for static initializers)
    pub fn access(mut self, access_flags: MethodAccessFlags) -> MethodBuilder<'t> {
        self.access_flags = access_flags;
        if self.kind == MethodKind::StaticInitializer {
            self.access_flags |= MethodAccessFlags::STATIC;
        }
        self
    }

    /// Reference through which the method can be called
    pub fn method_ref(&self) -> MethodRef {
        let method = MethodRef::new(
            self.class.name().clone(),
            self.name.clone(),
            self.descriptor.clone(),
        );
        if self.class.is_interface() {
            method.interface()
        } else {
            method
        }
    }

    fn header(&self) -> MethodHeader {
        MethodHeader {
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
            access_flags: self.access_flags,
        }
    }

    /// Build the code of the method
    ///
    /// The closure receives the builder for the root scope of the body. The method is sealed as
    /// soon as it returns: slots get allocated and the code is emitted. Any error (from the
    /// closure or from sealing) means the declaring type can no longer be written.
    #[track_caller]
    pub fn body<F>(self, build: F) -> Result<MethodRef, Error>
    where
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        let origin = Location::caller();
        let method = self.method_ref();
        let header = self.header();
        let kind = self.kind;
        let class = self.class;

        match assemble_body(class, &header, kind, build, origin) {
            Ok(code) => {
                class.push_method(header, Some(code));
                Ok(method)
            }
            Err(err) => {
                log::debug!("Failed to assemble {}: {}", method, err);
                class.poison();
                Err(err)
            }
        }
    }

    /// Declare a method without code
    pub fn declare(self) -> Result<MethodRef, Error> {
        let method = self.method_ref();
        let header = self.header();
        if !header.access_flags.lacks_code() {
            return Err(Error::Unsupported(format!(
                "{} is neither abstract nor native, so it needs a body",
                method
            )));
        }
        if self.kind != MethodKind::Method {
            return Err(Error::Unsupported(format!("{} must have a body", method)));
        }
        self.class
            .check_new_method(&header.name, &header.descriptor)?;
        self.class.push_method(header, None);
        Ok(method)
    }
}

fn assemble_body<F>(
    class: &mut TypeBuilder,
    header: &MethodHeader,
    kind: MethodKind,
    build: F,
    origin: &'static Location<'static>,
) -> Result<Code, Error>
where
    F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
{
    if header.access_flags.lacks_code() {
        return Err(Error::Unsupported(format!(
            "{} is abstract or native, so it cannot have a body",
            header.name
        )));
    }
    if kind == MethodKind::Constructor && class.is_interface() {
        return Err(Error::Unsupported(format!(
            "interface {} cannot have constructors",
            class.name()
        )));
    }
    class.check_new_method(&header.name, &header.descriptor)?;

    let mut body = Body::new(
        class.name().clone(),
        class.super_class().clone(),
        header,
        mem::take(&mut class.tables),
        class.settings().clone(),
        origin,
    )?;
    build(&mut body.root_builder())?;

    let (code, tables) = body.seal()?;
    class.tables = tables;
    Ok(code)
}
