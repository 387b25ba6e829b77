//! Branches, loops, and exit edges
//!
//! Every construct here opens one or more nested scopes, hands a builder for each of them to a
//! closure, then records a single composite operation in the enclosing scope.

use super::block::{mismatch, BlockBuilder};
use super::operation::{Cleanup, JumpKind, Operation};
use super::scope::ScopeKind;
use super::{Error, ScopeId, Value};
use crate::jvm::code::InvokeType;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, MethodRef, UnqualifiedName};
use std::panic::Location;

impl<'b> BlockBuilder<'b> {
    /// Open a scope nested in this one
    #[track_caller]
    pub(crate) fn open(&mut self, kind: ScopeKind) -> usize {
        self.open_in(self.scope, kind)
    }

    /// Open a scope with an explicit parent
    #[track_caller]
    pub(crate) fn open_in(&mut self, parent: usize, kind: ScopeKind) -> usize {
        let body = &mut *self.body;
        body.scopes
            .open(Some(parent), kind, &mut body.labels, Location::caller())
    }

    /// Run `when_true` only if `cond` holds
    #[track_caller]
    pub fn if_<F>(&mut self, cond: Value, when_true: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        let cond = self.operand(cond, &FieldType::boolean())?;
        let then_scope = self.open(ScopeKind::Then);
        when_true(&mut self.nested(then_scope))?;
        self.push(Operation::If {
            cond,
            when_true: then_scope,
            when_false: None,
        });
        Ok(())
    }

    /// Two-armed branch (else-if chains nest another branch in `when_false`)
    #[track_caller]
    pub fn if_else<T, F>(&mut self, cond: Value, when_true: T, when_false: F) -> Result<(), Error>
    where
        T: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        let cond = self.operand(cond, &FieldType::boolean())?;
        let then_scope = self.open(ScopeKind::Then);
        when_true(&mut self.nested(then_scope))?;
        let else_scope = self.open(ScopeKind::Else);
        when_false(&mut self.nested(else_scope))?;
        self.push(Operation::If {
            cond,
            when_true: then_scope,
            when_false: Some(else_scope),
        });
        Ok(())
    }

    /// Plain nested scope, mostly useful as a `break` target
    #[track_caller]
    pub fn block<F>(&mut self, build: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        let scope = self.open(ScopeKind::Block);
        build(&mut self.nested(scope))?;
        self.push(Operation::Block(scope));
        Ok(())
    }

    /// Loop running `body` for as long as `test` produces `true`
    ///
    /// Both closures build into the loop scope: `test` runs first on every iteration, and the
    /// loop is left as soon as its result is false.
    #[track_caller]
    pub fn while_<T, F>(&mut self, test: T, body: F) -> Result<(), Error>
    where
        T: FnOnce(&mut BlockBuilder) -> Result<Value, Error>,
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        let looped = self.open(ScopeKind::Loop);
        {
            let mut b = self.nested(looped);
            let cond = test(&mut b)?;
            let cond = b.operand(cond, &FieldType::boolean())?;
            b.push(Operation::ExitUnless {
                cond,
                target: looped,
            });
            body(&mut b)?;
        }
        self.push(Operation::Loop {
            body: looped,
            update: None,
        });
        Ok(())
    }

    /// Loop which only ends through `break_`, `return_value`, or an exception
    #[track_caller]
    pub fn loop_<F>(&mut self, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        let looped = self.open(ScopeKind::Loop);
        body(&mut self.nested(looped))?;
        self.push(Operation::Loop {
            body: looped,
            update: None,
        });
        Ok(())
    }

    /// Iterate over the elements of an array
    ///
    /// The closure builds into the loop scope, so `continue_` moves on to the next element.
    #[track_caller]
    pub fn for_each_array<F>(&mut self, array: Value, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder, Value) -> Result<(), Error>,
    {
        let array_type = self.type_of(array)?;
        if array_type.element_type().is_none() {
            return Err(mismatch("an array", &array_type));
        }
        self.operand_as_is(array)?;

        let outer = self.open(ScopeKind::Block);
        let looped = self.open_in(outer, ScopeKind::Loop);
        let update = self.open_in(looped, ScopeKind::LoopUpdate);
        {
            let mut b = self.nested(outer);
            let zero = b.const_int(0);
            let index = b.local(zero)?;

            let mut l = b.nested(looped);
            let length = l.array_length(array)?;
            let current = l.get(index)?;
            let more = l.lt(current, length)?;
            let more = l.operand(more, &FieldType::boolean())?;
            l.push(Operation::ExitUnless {
                cond: more,
                target: looped,
            });
            let current = l.get(index)?;
            let element = l.array_load(array, current)?;
            body(&mut l, element)?;

            b.nested(update).inc(index, 1)?;
            b.push(Operation::Loop {
                body: looped,
                update: Some(update),
            });
        }
        self.push(Operation::Block(outer));
        Ok(())
    }

    /// Iterate over a `java/lang/Iterable`
    #[track_caller]
    pub fn for_each_iterable<F>(&mut self, iterable: Value, body: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder, Value) -> Result<(), Error>,
    {
        let outer = self.open(ScopeKind::Block);
        let looped = self.open_in(outer, ScopeKind::Loop);
        {
            let mut b = self.nested(outer);
            let iterator = b.invoke_value(
                InvokeType::Interface(1),
                &MethodRef::iterable_iterator(),
                Some(iterable),
                &[],
            )?;
            let iterator = b.local(iterator)?;

            let mut l = b.nested(looped);
            let current = l.get(iterator)?;
            let more = l.invoke_value(
                InvokeType::Interface(1),
                &MethodRef::iterator_has_next(),
                Some(current),
                &[],
            )?;
            let more = l.operand(more, &FieldType::boolean())?;
            l.push(Operation::ExitUnless {
                cond: more,
                target: looped,
            });
            let current = l.get(iterator)?;
            let element = l.invoke_value(
                InvokeType::Interface(1),
                &MethodRef::iterator_next(),
                Some(current),
                &[],
            )?;
            body(&mut l, element)?;

            b.push(Operation::Loop {
                body: looped,
                update: None,
            });
        }
        self.push(Operation::Block(outer));
        Ok(())
    }

    /// Leave the target scope, which must enclose this one
    #[track_caller]
    pub fn break_(&mut self, target: ScopeId) -> Result<(), Error> {
        self.jump(target, JumpKind::Break)
    }

    /// Start the next iteration of the target loop, which must enclose this scope
    #[track_caller]
    pub fn continue_(&mut self, target: ScopeId) -> Result<(), Error> {
        self.jump(target, JumpKind::Continue)
    }

    #[track_caller]
    fn jump(&mut self, target: ScopeId, kind: JumpKind) -> Result<(), Error> {
        if target.method != self.body.token {
            return Err(Error::ForeignValue);
        }
        let scopes = &self.body.scopes;
        if !scopes.is_ancestor(target.index, self.scope) {
            return Err(Error::ScopeViolation {
                value: scopes.site(target.index),
                consumer: scopes.site(self.scope),
            });
        }
        if kind == JumpKind::Continue && scopes.get(target.index).kind != ScopeKind::Loop {
            return Err(Error::NotALoop(scopes.site(target.index)));
        }

        let cleanups = self.exit_edge(Some(target.index));
        self.push(Operation::Jump {
            kind,
            target: target.index,
            cleanups,
        });
        Ok(())
    }

    /// Return from a `void` method
    #[track_caller]
    pub fn return_(&mut self) -> Result<(), Error> {
        if let Some(return_type) = &self.body.descriptor.return_type {
            return Err(Error::TypeMismatch {
                expected: return_type.to_string(),
                found: String::from("no value"),
            });
        }
        let cleanups = self.exit_edge(None);
        self.push(Operation::Return {
            value: None,
            cleanups,
        });
        Ok(())
    }

    /// Return a value, converted to the return type of the method
    ///
    /// When the return crosses finally blocks, the value is stashed in a local first so that the
    /// finally copies run with an empty stack.
    #[track_caller]
    pub fn return_value(&mut self, value: Value) -> Result<(), Error> {
        let return_type = match &self.body.descriptor.return_type {
            Some(return_type) => return_type.clone(),
            None => {
                return Err(Error::TypeMismatch {
                    expected: String::from("no value (the method returns void)"),
                    found: self.type_of(value)?.to_string(),
                })
            }
        };
        let mut operand = self.operand(value, &return_type)?;
        if !self.crossed_frames(None).is_empty() {
            let stashed = self.local_of(return_type, value)?;
            operand = self.operand_as_is(stashed.value)?;
        }

        let cleanups = self.exit_edge(None);
        self.push(Operation::Return {
            value: Some(operand),
            cleanups,
        });
        Ok(())
    }

    /// Throw an exception object
    pub fn throw_(&mut self, exception: Value) -> Result<(), Error> {
        let ty = self.type_of(exception)?;
        if !ty.is_reference() {
            return Err(mismatch("an exception object", &ty));
        }
        let value = self.operand_as_is(exception)?;
        self.push(Operation::Throw { value });
        Ok(())
    }

    /// Construct and throw an exception, using its `(Ljava/lang/String;)V` constructor if a
    /// message is given
    pub fn throw_new(&mut self, class: BinaryName, message: Option<&str>) -> Result<(), Error> {
        let exception = match message {
            Some(message) => {
                let ctor = MethodRef::new(
                    class,
                    UnqualifiedName::INIT,
                    MethodDescriptor::new(vec![FieldType::string()], None),
                );
                let message = self.const_string(message.to_owned());
                self.new_instance(&ctor, &[message])?
            }
            None => self.new_instance(&MethodRef::no_arg_init(class), &[])?,
        };
        self.throw_(exception)
    }

    /// Indices (into the try frames) of the tries an exit edge to `target` leaves, innermost
    /// first. `None` stands for leaving the method.
    fn crossed_frames(&self, target: Option<usize>) -> Vec<usize> {
        let scopes = &self.body.scopes;
        (0..self.body.try_frames.len())
            .rev()
            .filter(|idx| {
                let frame = self.body.try_frames[*idx].scope;
                scopes.is_ancestor(frame, self.scope)
                    && target.map_or(true, |target| !scopes.is_ancestor(frame, target))
            })
            .collect()
    }

    /// Placeholders for the finally blocks run by an exit edge to `target`
    #[track_caller]
    pub(crate) fn exit_edge(&mut self, target: Option<usize>) -> Vec<Cleanup> {
        let mut cleanups = vec![];
        for idx in self.crossed_frames(target) {
            let frame_scope = self.body.try_frames[idx].scope;
            let placeholder = self.open_in(frame_scope, ScopeKind::Finally);
            let frame = &mut self.body.try_frames[idx];
            frame.placeholders.push(placeholder);
            cleanups.push(Cleanup {
                try_id: frame.id,
                scope: placeholder,
            });
        }
        cleanups
    }
}
