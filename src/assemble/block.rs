use super::coerce::coercion;
use super::method::Body;
use super::operation::{OpKind, Operand, Operation};
use super::value::{Lifecycle, Literal, ValueData};
use super::{Error, ScopeId, Value, Var};
use crate::jvm::code::{BranchCond, CompareMode, EqComparison, Instruction, InvokeType};
use crate::jvm::code::{OrdComparison, ShiftType};
use crate::jvm::{BaseType, BinaryName, FieldRef, FieldType, MethodRef, RefType};
use std::borrow::Cow;

/// Appends operations to one scope of a method body
///
/// Every value-producing operation returns a [`Value`] handle. Handles can be consumed by any
/// operation in the same scope or in a scope nested inside it. Nested scopes are opened by the
/// control flow constructs (`if_else`, `while_`, `try_`, `switch_string`, ...), each of which
/// hands a fresh `BlockBuilder` to a closure.
pub struct BlockBuilder<'b> {
    pub(crate) body: &'b mut Body,
    pub(crate) scope: usize,
}

impl<'b> BlockBuilder<'b> {
    pub(crate) fn new(body: &'b mut Body, scope: usize) -> BlockBuilder<'b> {
        BlockBuilder { body, scope }
    }

    /// Builder for a different scope of the same body
    pub(crate) fn nested(&mut self, scope: usize) -> BlockBuilder<'_> {
        BlockBuilder {
            body: &mut *self.body,
            scope,
        }
    }

    /// Handle for this scope, usable as a `break` target from nested scopes
    pub fn scope_id(&self) -> ScopeId {
        ScopeId {
            method: self.body.token,
            index: self.scope,
        }
    }

    /// Static type of a value
    pub fn type_of(&self, value: Value) -> Result<FieldType, Error> {
        Ok(self.body.value(value)?.ty.clone())
    }

    /// Check that a value may be read here, and work out how to convert it to `expected`
    pub(crate) fn operand(&self, value: Value, expected: &FieldType) -> Result<Operand, Error> {
        let data = self.body.value(value)?;
        if let Some(owner) = data.owner {
            if !self.body.scopes.is_ancestor(owner, self.scope) {
                return Err(Error::ScopeViolation {
                    value: self.body.scopes.site(owner),
                    consumer: self.body.scopes.site(self.scope),
                });
            }
        }
        Ok(Operand {
            value: value.index,
            coercion: coercion(&data.ty, expected),
        })
    }

    /// Operand read at its own type
    pub(crate) fn operand_as_is(&self, value: Value) -> Result<Operand, Error> {
        let ty = self.type_of(value)?;
        self.operand(value, &ty)
    }

    pub(crate) fn push(&mut self, op: Operation) {
        self.body.scopes.get_mut(self.scope).ops.push(op);
    }

    fn new_value(&mut self, ty: FieldType, owner: Option<usize>, lifecycle: Lifecycle) -> Value {
        self.body.values.push(ValueData {
            ty,
            owner,
            lifecycle,
        });
        Value {
            method: self.body.token,
            index: self.body.values.len() - 1,
        }
    }

    /// Push a simple operation, producing a value of type `result` (if any)
    pub(crate) fn simple(
        &mut self,
        kind: OpKind,
        operands: Vec<Operand>,
        result: Option<FieldType>,
    ) -> Option<Value> {
        let scope = self.scope;
        let result = result.map(|ty| self.new_value(ty, Some(scope), Lifecycle::Pending));
        self.push(Operation::Simple {
            kind,
            operands,
            result: result.map(|value| value.index),
        });
        result
    }

    fn insns(
        &mut self,
        insns: Vec<Instruction>,
        operands: Vec<Operand>,
        result: FieldType,
    ) -> Value {
        let scope = self.scope;
        let value = self.new_value(result, Some(scope), Lifecycle::Pending);
        self.push(Operation::Simple {
            kind: OpKind::Insns(insns),
            operands,
            result: Some(value.index),
        });
        value
    }

    fn constant(&mut self, ty: FieldType, literal: Literal) -> Value {
        self.new_value(ty, None, Lifecycle::Constant(literal))
    }

    pub fn const_int(&mut self, integer: i32) -> Value {
        self.constant(FieldType::int(), Literal::Int(integer))
    }

    pub fn const_long(&mut self, long: i64) -> Value {
        self.constant(FieldType::long(), Literal::Long(long))
    }

    pub fn const_float(&mut self, float: f32) -> Value {
        self.constant(FieldType::float(), Literal::Float(float))
    }

    pub fn const_double(&mut self, double: f64) -> Value {
        self.constant(FieldType::double(), Literal::Double(double))
    }

    pub fn const_bool(&mut self, boolean: bool) -> Value {
        self.constant(FieldType::boolean(), Literal::Int(boolean as i32))
    }

    pub fn const_string(&mut self, string: impl Into<Cow<'static, str>>) -> Value {
        self.constant(FieldType::string(), Literal::String(string.into()))
    }

    /// `null`, typed as the given reference type
    pub fn const_null(&mut self, ty: RefType) -> Value {
        self.constant(FieldType::Ref(ty), Literal::Null)
    }

    /// `java/lang/Class` object for a reference type
    pub fn const_class(&mut self, ty: RefType) -> Value {
        self.constant(FieldType::object(BinaryName::CLASS), Literal::Class(ty))
    }

    /// Parameter of the method (not counting `this`)
    pub fn param(&self, index: usize) -> Result<Value, Error> {
        self.body
            .params
            .get(index)
            .copied()
            .ok_or(Error::ParameterOutOfRange(index))
    }

    /// Receiver of an instance method or constructor
    pub fn this(&self) -> Result<Value, Error> {
        self.body.this.ok_or(Error::NoReceiver)
    }

    /// Declare a local variable in this scope, initialized to `init`
    pub fn local(&mut self, init: Value) -> Result<Var, Error> {
        let ty = self.type_of(init)?;
        self.local_of(ty, init)
    }

    /// Declare a local variable of a given type
    pub fn local_of(&mut self, ty: FieldType, init: Value) -> Result<Var, Error> {
        let init = self.operand(init, &ty)?;
        let scope = self.scope;
        let value = self.new_value(ty, Some(scope), Lifecycle::Variable);
        self.simple(
            OpKind::Store {
                var: value.index,
                declare: true,
            },
            vec![init],
            None,
        );
        Ok(Var { value })
    }

    /// Snapshot of the current content of a variable
    pub fn get(&mut self, var: Var) -> Result<Value, Error> {
        let operand = self.operand_as_is(var.value)?;
        let ty = self.type_of(var.value)?;
        self.simple(OpKind::Copy, vec![operand], Some(ty))
            .ok_or_else(|| Error::VoidValue(String::from("variable read")))
    }

    pub fn set(&mut self, var: Var, value: Value) -> Result<(), Error> {
        self.operand_as_is(var.value)?;
        let ty = self.type_of(var.value)?;
        let operand = self.operand(value, &ty)?;
        self.simple(
            OpKind::Store {
                var: var.value.index,
                declare: false,
            },
            vec![operand],
            None,
        );
        Ok(())
    }

    /// Add a constant to an `int` variable
    pub fn inc(&mut self, var: Var, delta: i16) -> Result<(), Error> {
        self.operand_as_is(var.value)?;
        let ty = self.type_of(var.value)?;
        if ty != FieldType::int() {
            return Err(mismatch("I", &ty));
        }
        self.simple(
            OpKind::Inc {
                var: var.value.index,
                delta,
            },
            vec![],
            None,
        );
        Ok(())
    }

    /// Common numeric kind of two operands (after unboxing)
    fn numeric_pair(&self, lhs: Value, rhs: Value) -> Result<BaseType, Error> {
        let lhs_ty = self.type_of(lhs)?;
        let rhs_ty = self.type_of(rhs)?;
        match (lhs_ty.numeric_type(), rhs_ty.numeric_type()) {
            (Some(l), Some(r)) if l == r => Ok(l),
            _ => Err(Error::TypeMismatch {
                expected: String::from("numeric operands of the same kind"),
                found: format!("{} and {}", lhs_ty, rhs_ty),
            }),
        }
    }

    fn arithmetic(
        &mut self,
        lhs: Value,
        rhs: Value,
        select: fn(BaseType) -> Option<Instruction>,
    ) -> Result<Value, Error> {
        let kind = self.numeric_pair(lhs, rhs)?;
        let insn = select(kind)
            .ok_or_else(|| mismatch("integral operands", &FieldType::Base(kind)))?;

        // Logical operators on two booleans stay boolean
        let both_boolean = self.type_of(lhs)? == FieldType::boolean()
            && self.type_of(rhs)? == FieldType::boolean();
        let result = if both_boolean {
            FieldType::boolean()
        } else {
            FieldType::Base(kind)
        };

        let expected = FieldType::Base(kind);
        let operands = vec![self.operand(lhs, &expected)?, self.operand(rhs, &expected)?];
        Ok(self.insns(vec![insn], operands, result))
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.arithmetic(lhs, rhs, |kind| match kind {
            BaseType::Int => Some(Instruction::IAdd),
            BaseType::Long => Some(Instruction::LAdd),
            BaseType::Float => Some(Instruction::FAdd),
            BaseType::Double => Some(Instruction::DAdd),
            _ => None,
        })
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.arithmetic(lhs, rhs, |kind| match kind {
            BaseType::Int => Some(Instruction::ISub),
            BaseType::Long => Some(Instruction::LSub),
            BaseType::Float => Some(Instruction::FSub),
            BaseType::Double => Some(Instruction::DSub),
            _ => None,
        })
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.arithmetic(lhs, rhs, |kind| match kind {
            BaseType::Int => Some(Instruction::IMul),
            BaseType::Long => Some(Instruction::LMul),
            BaseType::Float => Some(Instruction::FMul),
            BaseType::Double => Some(Instruction::DMul),
            _ => None,
        })
    }

    pub fn div(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.arithmetic(lhs, rhs, |kind| match kind {
            BaseType::Int => Some(Instruction::IDiv),
            BaseType::Long => Some(Instruction::LDiv),
            BaseType::Float => Some(Instruction::FDiv),
            BaseType::Double => Some(Instruction::DDiv),
            _ => None,
        })
    }

    pub fn rem(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.arithmetic(lhs, rhs, |kind| match kind {
            BaseType::Int => Some(Instruction::IRem),
            BaseType::Long => Some(Instruction::LRem),
            BaseType::Float => Some(Instruction::FRem),
            BaseType::Double => Some(Instruction::DRem),
            _ => None,
        })
    }

    pub fn and(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.arithmetic(lhs, rhs, |kind| match kind {
            BaseType::Int => Some(Instruction::IAnd),
            BaseType::Long => Some(Instruction::LAnd),
            _ => None,
        })
    }

    pub fn or(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.arithmetic(lhs, rhs, |kind| match kind {
            BaseType::Int => Some(Instruction::IOr),
            BaseType::Long => Some(Instruction::LOr),
            _ => None,
        })
    }

    pub fn xor(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.arithmetic(lhs, rhs, |kind| match kind {
            BaseType::Int => Some(Instruction::IXor),
            BaseType::Long => Some(Instruction::LXor),
            _ => None,
        })
    }

    fn shift(&mut self, value: Value, amount: Value, shift: ShiftType) -> Result<Value, Error> {
        let ty = self.type_of(value)?;
        let (insn, kind) = match ty.numeric_type() {
            Some(BaseType::Int) => (Instruction::ISh(shift), BaseType::Int),
            Some(BaseType::Long) => (Instruction::LSh(shift), BaseType::Long),
            _ => return Err(mismatch("I or J", &ty)),
        };
        let result = FieldType::Base(kind);
        let operands = vec![
            self.operand(value, &result)?,
            self.operand(amount, &FieldType::int())?,
        ];
        Ok(self.insns(vec![insn], operands, result))
    }

    pub fn shl(&mut self, value: Value, amount: Value) -> Result<Value, Error> {
        self.shift(value, amount, ShiftType::Left)
    }

    pub fn shr(&mut self, value: Value, amount: Value) -> Result<Value, Error> {
        self.shift(value, amount, ShiftType::ArithmeticRight)
    }

    pub fn ushr(&mut self, value: Value, amount: Value) -> Result<Value, Error> {
        self.shift(value, amount, ShiftType::LogicalRight)
    }

    pub fn neg(&mut self, value: Value) -> Result<Value, Error> {
        let ty = self.type_of(value)?;
        let (insn, kind) = match ty.numeric_type() {
            Some(BaseType::Int) => (Instruction::INeg, BaseType::Int),
            Some(BaseType::Long) => (Instruction::LNeg, BaseType::Long),
            Some(BaseType::Float) => (Instruction::FNeg, BaseType::Float),
            Some(BaseType::Double) => (Instruction::DNeg, BaseType::Double),
            _ => return Err(mismatch("a numeric value", &ty)),
        };
        let result = FieldType::Base(kind);
        let operand = self.operand(value, &result)?;
        Ok(self.insns(vec![insn], vec![operand], result))
    }

    fn compare(&mut self, lhs: Value, rhs: Value, ord: OrdComparison) -> Result<Value, Error> {
        let lhs_ty = self.type_of(lhs)?;
        let rhs_ty = self.type_of(rhs)?;

        if lhs_ty.is_reference() && rhs_ty.is_reference() {
            let eq = match ord {
                OrdComparison::EQ => EqComparison::EQ,
                OrdComparison::NE => EqComparison::NE,
                _ => return Err(mismatch("numeric operands", &lhs_ty)),
            };
            let operands = vec![self.operand_as_is(lhs)?, self.operand_as_is(rhs)?];
            return self.condition(None, BranchCond::IfACmp(eq), operands);
        }

        let kind = self.numeric_pair(lhs, rhs)?;
        let (prefix, cond) = match kind {
            BaseType::Int => (None, BranchCond::IfICmp(ord)),
            BaseType::Long => (Some(Instruction::LCmp), BranchCond::If(ord)),
            BaseType::Float => (Some(Instruction::FCmp(nan_mode(ord))), BranchCond::If(ord)),
            BaseType::Double => (Some(Instruction::DCmp(nan_mode(ord))), BranchCond::If(ord)),
            _ => return Err(mismatch("numeric operands", &lhs_ty)),
        };
        let expected = FieldType::Base(kind);
        let operands = vec![self.operand(lhs, &expected)?, self.operand(rhs, &expected)?];
        self.condition(prefix, cond, operands)
    }

    fn condition(
        &mut self,
        prefix: Option<Instruction>,
        cond: BranchCond,
        operands: Vec<Operand>,
    ) -> Result<Value, Error> {
        self.simple(
            OpKind::Compare { prefix, cond },
            operands,
            Some(FieldType::boolean()),
        )
        .ok_or_else(|| Error::VoidValue(String::from("comparison")))
    }

    /// `==` (reference equality for two references)
    pub fn eq(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.compare(lhs, rhs, OrdComparison::EQ)
    }

    pub fn ne(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.compare(lhs, rhs, OrdComparison::NE)
    }

    pub fn lt(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.compare(lhs, rhs, OrdComparison::LT)
    }

    pub fn le(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.compare(lhs, rhs, OrdComparison::LE)
    }

    pub fn gt(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.compare(lhs, rhs, OrdComparison::GT)
    }

    pub fn ge(&mut self, lhs: Value, rhs: Value) -> Result<Value, Error> {
        self.compare(lhs, rhs, OrdComparison::GE)
    }

    fn null_check(&mut self, value: Value, eq: EqComparison) -> Result<Value, Error> {
        let ty = self.type_of(value)?;
        if !ty.is_reference() {
            return Err(mismatch("a reference", &ty));
        }
        let operand = self.operand_as_is(value)?;
        self.condition(None, BranchCond::IfNull(eq), vec![operand])
    }

    pub fn is_null(&mut self, value: Value) -> Result<Value, Error> {
        self.null_check(value, EqComparison::EQ)
    }

    pub fn is_not_null(&mut self, value: Value) -> Result<Value, Error> {
        self.null_check(value, EqComparison::NE)
    }

    /// Boolean negation
    pub fn not(&mut self, value: Value) -> Result<Value, Error> {
        let operand = self.operand(value, &FieldType::boolean())?;
        self.condition(None, BranchCond::If(OrdComparison::EQ), vec![operand])
    }

    /// Primitive widening or narrowing conversion (unboxing first, if needed)
    pub fn convert(&mut self, value: Value, to: BaseType) -> Result<Value, Error> {
        let ty = self.type_of(value)?;
        let from = ty
            .numeric_type()
            .ok_or_else(|| mismatch("a primitive value", &ty))?;
        let insns = conversion(from, to).ok_or_else(|| Error::TypeMismatch {
            expected: String::from("a numeric conversion"),
            found: format!("{} to {}", ty, FieldType::Base(to)),
        })?;
        let operand = self.operand(value, &FieldType::Base(from))?;
        Ok(self.insns(insns, vec![operand], FieldType::Base(to)))
    }

    /// Box a primitive into its wrapper class
    pub fn box_value(&mut self, value: Value) -> Result<Value, Error> {
        match self.type_of(value)? {
            FieldType::Base(base_type) => {
                self.copy_as(value, FieldType::object(base_type.wrapper()))
            }
            other => Err(mismatch("a primitive value", &other)),
        }
    }

    /// Extract the primitive from a wrapper class
    pub fn unbox_value(&mut self, value: Value) -> Result<Value, Error> {
        let ty = self.type_of(value)?;
        let base_type = ty
            .unboxed()
            .ok_or_else(|| mismatch("a primitive wrapper", &ty))?;
        self.copy_as(value, FieldType::Base(base_type))
    }

    /// Checked cast between references (or boxing, unboxing, and primitive conversions)
    pub fn cast(&mut self, value: Value, ty: FieldType) -> Result<Value, Error> {
        match (self.type_of(value)?, &ty) {
            (FieldType::Base(_), FieldType::Base(to)) => self.convert(value, *to),
            _ => self.copy_as(value, ty),
        }
    }

    fn copy_as(&mut self, value: Value, ty: FieldType) -> Result<Value, Error> {
        let operand = self.operand(value, &ty)?;
        self.simple(OpKind::Copy, vec![operand], Some(ty))
            .ok_or_else(|| Error::VoidValue(String::from("cast")))
    }

    pub fn instance_of(&mut self, value: Value, ty: RefType) -> Result<Value, Error> {
        let operand = self.operand_as_is(value)?;
        Ok(self.insns(
            vec![Instruction::InstanceOf(ty)],
            vec![operand],
            FieldType::boolean(),
        ))
    }

    fn arguments(&self, method: &MethodRef, args: &[Value]) -> Result<Vec<Operand>, Error> {
        let parameters = &method.descriptor.parameters;
        if parameters.len() != args.len() {
            return Err(Error::ArityMismatch {
                method: method.to_string(),
                expected: parameters.len(),
                found: args.len(),
            });
        }
        parameters
            .iter()
            .zip(args)
            .map(|(parameter, arg)| self.operand(*arg, parameter))
            .collect()
    }

    fn invoke(
        &mut self,
        invoke_type: InvokeType,
        method: &MethodRef,
        receiver: Option<Value>,
        args: &[Value],
    ) -> Result<Option<Value>, Error> {
        let mut operands = vec![];
        if let Some(receiver) = receiver {
            let receiver_ty = FieldType::object(method.class.clone());
            operands.push(self.operand(receiver, &receiver_ty)?);
        }
        operands.extend(self.arguments(method, args)?);
        let insn = Instruction::Invoke(invoke_type, method.clone());
        Ok(self.simple(
            OpKind::Insns(vec![insn]),
            operands,
            method.descriptor.return_type.clone(),
        ))
    }

    pub fn invoke_static(
        &mut self,
        method: &MethodRef,
        args: &[Value],
    ) -> Result<Option<Value>, Error> {
        self.invoke(InvokeType::Static, method, None, args)
    }

    pub fn invoke_virtual(
        &mut self,
        method: &MethodRef,
        receiver: Value,
        args: &[Value],
    ) -> Result<Option<Value>, Error> {
        self.invoke(InvokeType::Virtual, method, Some(receiver), args)
    }

    pub fn invoke_interface(
        &mut self,
        method: &MethodRef,
        receiver: Value,
        args: &[Value],
    ) -> Result<Option<Value>, Error> {
        let count = method.descriptor.parameter_length(true);
        let count = u8::try_from(count)
            .map_err(|_| Error::Unsupported(format!("{} has too many arguments", method)))?;
        self.invoke(InvokeType::Interface(count), method, Some(receiver), args)
    }

    /// Non-virtual call (private methods, or methods of the super class)
    pub fn invoke_special(
        &mut self,
        method: &MethodRef,
        receiver: Value,
        args: &[Value],
    ) -> Result<Option<Value>, Error> {
        self.invoke(InvokeType::Special, method, Some(receiver), args)
    }

    /// Call a method which must return something
    pub(crate) fn invoke_value(
        &mut self,
        invoke_type: InvokeType,
        method: &MethodRef,
        receiver: Option<Value>,
        args: &[Value],
    ) -> Result<Value, Error> {
        self.invoke(invoke_type, method, receiver, args)?
            .ok_or_else(|| Error::VoidValue(method.to_string()))
    }

    /// Allocate and initialize an object
    pub fn new_instance(&mut self, ctor: &MethodRef, args: &[Value]) -> Result<Value, Error> {
        if !ctor.is_constructor() {
            return Err(Error::Unsupported(format!("{} is not a constructor", ctor)));
        }
        let operands = self.arguments(ctor, args)?;
        let class = ctor.class.clone();
        self.simple(
            OpKind::New {
                class: class.clone(),
                ctor: ctor.clone(),
            },
            operands,
            Some(FieldType::object(class)),
        )
        .ok_or_else(|| Error::VoidValue(ctor.to_string()))
    }

    /// Call a constructor of this class or of the super class on `this`
    pub fn invoke_constructor(&mut self, ctor: &MethodRef, args: &[Value]) -> Result<(), Error> {
        let this = match (&self.body.constructor, self.body.this) {
            (Some(_), Some(this)) => this,
            _ => return Err(Error::NotInConstructor),
        };
        if !ctor.is_constructor()
            || (ctor.class != self.body.class && ctor.class != self.body.super_class)
        {
            return Err(Error::Unsupported(format!(
                "{} is not a constructor of {} or its super class",
                ctor, self.body.class
            )));
        }
        if let Some(state) = &mut self.body.constructor {
            if let Some(field) = state.early_field.take() {
                return Err(Error::FieldAccessBeforeConstructorCall(field));
            }
            state.init_called = true;
        }

        let mut operands = vec![self.operand_as_is(this)?];
        operands.extend(self.arguments(ctor, args)?);
        let insn = Instruction::Invoke(InvokeType::Special, ctor.clone());
        self.simple(OpKind::Insns(vec![insn]), operands, None);
        Ok(())
    }

    /// Record field accesses on `this` which happen before the constructor call
    fn note_field_access(&mut self, field: &FieldRef, receiver: Value) {
        if Some(receiver) != self.body.this {
            return;
        }
        if let Some(state) = &mut self.body.constructor {
            if !state.init_called && state.early_field.is_none() {
                state.early_field = Some(field.name.clone());
            }
        }
    }

    pub fn get_field(&mut self, field: &FieldRef, receiver: Value) -> Result<Value, Error> {
        self.note_field_access(field, receiver);
        let operand = self.operand(receiver, &FieldType::object(field.class.clone()))?;
        Ok(self.insns(
            vec![Instruction::GetField(field.clone())],
            vec![operand],
            field.descriptor.clone(),
        ))
    }

    pub fn put_field(
        &mut self,
        field: &FieldRef,
        receiver: Value,
        value: Value,
    ) -> Result<(), Error> {
        self.note_field_access(field, receiver);
        let operands = vec![
            self.operand(receiver, &FieldType::object(field.class.clone()))?,
            self.operand(value, &field.descriptor)?,
        ];
        self.simple(
            OpKind::Insns(vec![Instruction::PutField(field.clone())]),
            operands,
            None,
        );
        Ok(())
    }

    pub fn get_static(&mut self, field: &FieldRef) -> Value {
        self.insns(
            vec![Instruction::GetStatic(field.clone())],
            vec![],
            field.descriptor.clone(),
        )
    }

    pub fn put_static(&mut self, field: &FieldRef, value: Value) -> Result<(), Error> {
        let operand = self.operand(value, &field.descriptor)?;
        self.simple(
            OpKind::Insns(vec![Instruction::PutStatic(field.clone())]),
            vec![operand],
            None,
        );
        Ok(())
    }

    /// New one-dimensional array
    pub fn new_array(&mut self, element_type: FieldType, length: Value) -> Result<Value, Error> {
        let insn = match &element_type {
            FieldType::Base(base_type) => Instruction::NewArray(*base_type),
            FieldType::Ref(ref_type) => Instruction::ANewArray(ref_type.clone()),
        };
        let operand = self.operand(length, &FieldType::int())?;
        Ok(self.insns(vec![insn], vec![operand], FieldType::array(element_type)))
    }

    fn element_type(&self, array: Value) -> Result<FieldType, Error> {
        let ty = self.type_of(array)?;
        ty.element_type().ok_or_else(|| mismatch("an array", &ty))
    }

    pub fn array_length(&mut self, array: Value) -> Result<Value, Error> {
        self.element_type(array)?;
        let operand = self.operand_as_is(array)?;
        Ok(self.insns(
            vec![Instruction::ArrayLength],
            vec![operand],
            FieldType::int(),
        ))
    }

    pub fn array_load(&mut self, array: Value, index: Value) -> Result<Value, Error> {
        let element_type = self.element_type(array)?;
        let insn = match &element_type {
            FieldType::Base(BaseType::Int) => Instruction::IALoad,
            FieldType::Base(BaseType::Long) => Instruction::LALoad,
            FieldType::Base(BaseType::Float) => Instruction::FALoad,
            FieldType::Base(BaseType::Double) => Instruction::DALoad,
            FieldType::Base(BaseType::Byte | BaseType::Boolean) => Instruction::BALoad,
            FieldType::Base(BaseType::Char) => Instruction::CALoad,
            FieldType::Base(BaseType::Short) => Instruction::SALoad,
            FieldType::Ref(_) => Instruction::AALoad,
        };
        let operands = vec![
            self.operand_as_is(array)?,
            self.operand(index, &FieldType::int())?,
        ];
        Ok(self.insns(vec![insn], operands, element_type))
    }

    pub fn array_store(&mut self, array: Value, index: Value, value: Value) -> Result<(), Error> {
        let element_type = self.element_type(array)?;
        let insn = match &element_type {
            FieldType::Base(BaseType::Int) => Instruction::IAStore,
            FieldType::Base(BaseType::Long) => Instruction::LAStore,
            FieldType::Base(BaseType::Float) => Instruction::FAStore,
            FieldType::Base(BaseType::Double) => Instruction::DAStore,
            FieldType::Base(BaseType::Byte | BaseType::Boolean) => Instruction::BAStore,
            FieldType::Base(BaseType::Char) => Instruction::CAStore,
            FieldType::Base(BaseType::Short) => Instruction::SAStore,
            FieldType::Ref(_) => Instruction::AAStore,
        };
        let operands = vec![
            self.operand_as_is(array)?,
            self.operand(index, &FieldType::int())?,
            self.operand(value, &element_type)?,
        ];
        self.simple(OpKind::Insns(vec![insn]), operands, None);
        Ok(())
    }
}

/// Comparison mode which makes a NaN operand fail the comparison
fn nan_mode(ord: OrdComparison) -> CompareMode {
    match ord {
        OrdComparison::LT | OrdComparison::LE => CompareMode::G,
        _ => CompareMode::L,
    }
}

/// Instructions converting between primitive types (`from` is a stack type)
fn conversion(from: BaseType, to: BaseType) -> Option<Vec<Instruction>> {
    let widen = match (from, to.stack_type()) {
        (BaseType::Int, BaseType::Int)
        | (BaseType::Long, BaseType::Long)
        | (BaseType::Float, BaseType::Float)
        | (BaseType::Double, BaseType::Double) => None,
        (BaseType::Int, BaseType::Long) => Some(Instruction::I2L),
        (BaseType::Int, BaseType::Float) => Some(Instruction::I2F),
        (BaseType::Int, BaseType::Double) => Some(Instruction::I2D),
        (BaseType::Long, BaseType::Int) => Some(Instruction::L2I),
        (BaseType::Long, BaseType::Float) => Some(Instruction::L2F),
        (BaseType::Long, BaseType::Double) => Some(Instruction::L2D),
        (BaseType::Float, BaseType::Int) => Some(Instruction::F2I),
        (BaseType::Float, BaseType::Long) => Some(Instruction::F2L),
        (BaseType::Float, BaseType::Double) => Some(Instruction::F2D),
        (BaseType::Double, BaseType::Int) => Some(Instruction::D2I),
        (BaseType::Double, BaseType::Long) => Some(Instruction::D2L),
        (BaseType::Double, BaseType::Float) => Some(Instruction::D2F),
        _ => return None,
    };
    let narrow = match to {
        BaseType::Byte => Some(Instruction::I2B),
        BaseType::Char => Some(Instruction::I2C),
        BaseType::Short => Some(Instruction::I2S),
        BaseType::Boolean => return None,
        _ => None,
    };
    Some(widen.into_iter().chain(narrow).collect())
}

pub(crate) fn mismatch(expected: &str, found: &FieldType) -> Error {
    Error::TypeMismatch {
        expected: String::from(expected),
        found: found.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(conversion(BaseType::Int, BaseType::Long), Some(vec![Instruction::I2L]));
        assert_eq!(
            conversion(BaseType::Double, BaseType::Byte),
            Some(vec![Instruction::D2I, Instruction::I2B])
        );
        assert_eq!(conversion(BaseType::Int, BaseType::Char), Some(vec![Instruction::I2C]));
        assert_eq!(conversion(BaseType::Long, BaseType::Long), Some(vec![]));
        assert_eq!(conversion(BaseType::Int, BaseType::Boolean), None);
    }

    #[test]
    fn nan_fails_comparisons() {
        assert_eq!(nan_mode(OrdComparison::LT), CompareMode::G);
        assert_eq!(nan_mode(OrdComparison::GE), CompareMode::L);
    }
}
