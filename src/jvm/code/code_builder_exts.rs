use crate::jvm::code::{
    BranchInstruction, CodeBuilder, Constant, EqComparison, Instruction, InvokeType, Label,
    OrdComparison,
};
use crate::jvm::{BaseType, Error, FieldType, MethodRef, RefType, Width};
use std::borrow::Cow;

/// Typed shorthands over [`CodeBuilder`]
///
/// These pick the instruction variant from a type (`iload` vs. `aload`, `pop` vs. `pop2`, ...)
/// and the shortest encoding of a constant.
pub trait CodeBuilderExts {
    fn const_null(&mut self) -> Result<(), Error>;

    fn const_string(&mut self, string: impl Into<Cow<'static, str>>) -> Result<(), Error>;

    fn const_int(&mut self, integer: i32) -> Result<(), Error>;

    /// Push a `long`
    ///
    /// Small values go through an `int` push and `i2l`, which keeps them out of the constant
    /// pool. The same holds for whole `float` and `double` values.
    fn const_long(&mut self, long: i64) -> Result<(), Error>;

    fn const_float(&mut self, float: f32) -> Result<(), Error>;

    fn const_double(&mut self, double: f64) -> Result<(), Error>;

    /// Push the `java/lang/Class` object of a type
    fn const_class(&mut self, ty: RefType) -> Result<(), Error>;

    fn get_local(&mut self, slot: u16, field_type: &FieldType) -> Result<(), Error>;

    fn set_local(&mut self, slot: u16, field_type: &FieldType) -> Result<(), Error>;

    /// Drop the top of the stack
    fn pop(&mut self, field_type: &FieldType) -> Result<(), Error>;

    /// Return from the method (`None` for `void`)
    fn return_(&mut self, return_type: Option<&FieldType>) -> Result<(), Error>;

    /// Push `1` if the condition holds and `0` otherwise
    fn condition(&mut self, condition: &BranchCond) -> Result<(), Error>;

    fn invoke(&mut self, invoke_type: InvokeType, method: MethodRef) -> Result<(), Error>;
}

/// Shortest push of an `int` which fits in 16 bits
fn short_int(integer: i32) -> Option<Instruction> {
    Some(match integer {
        -1 => Instruction::IConstM1,
        0 => Instruction::IConst0,
        1 => Instruction::IConst1,
        2 => Instruction::IConst2,
        3 => Instruction::IConst3,
        4 => Instruction::IConst4,
        5 => Instruction::IConst5,
        _ => match i8::try_from(integer) {
            Ok(byte) => Instruction::BiPush(byte),
            Err(_) => Instruction::SiPush(i16::try_from(integer).ok()?),
        },
    })
}

/// Whole number in the 16-bit range, as an `int`
fn whole(number: f64) -> Option<i32> {
    if number.fract() != 0.0 || (number == 0.0 && number.is_sign_negative()) {
        return None;
    }
    if (f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&number) {
        Some(number as i32)
    } else {
        None
    }
}

/// Load and store instructions for locals of a type
fn local_access(field_type: &FieldType) -> (fn(u16) -> Instruction, fn(u16) -> Instruction) {
    match field_type {
        FieldType::Base(BaseType::Long) => (Instruction::LLoad, Instruction::LStore),
        FieldType::Base(BaseType::Float) => (Instruction::FLoad, Instruction::FStore),
        FieldType::Base(BaseType::Double) => (Instruction::DLoad, Instruction::DStore),
        FieldType::Base(_) => (Instruction::ILoad, Instruction::IStore),
        FieldType::Ref(_) => (Instruction::ALoad, Instruction::AStore),
    }
}

impl CodeBuilderExts for CodeBuilder {
    fn const_null(&mut self) -> Result<(), Error> {
        self.push_instruction(Instruction::AConstNull)
    }

    fn const_string(&mut self, string: impl Into<Cow<'static, str>>) -> Result<(), Error> {
        self.push_instruction(Instruction::Ldc(Constant::String(string.into())))
    }

    fn const_int(&mut self, integer: i32) -> Result<(), Error> {
        let insn = short_int(integer).unwrap_or(Instruction::Ldc(Constant::Integer(integer)));
        self.push_instruction(insn)
    }

    fn const_long(&mut self, long: i64) -> Result<(), Error> {
        match long {
            0 => self.push_instruction(Instruction::LConst0),
            1 => self.push_instruction(Instruction::LConst1),
            _ => match i32::try_from(long).ok().and_then(short_int) {
                Some(insn) => {
                    self.push_instruction(insn)?;
                    self.push_instruction(Instruction::I2L)
                }
                None => self.push_instruction(Instruction::Ldc2(Constant::Long(long))),
            },
        }
    }

    fn const_float(&mut self, float: f32) -> Result<(), Error> {
        let positive_zero = float == 0.0 && float.is_sign_positive();
        if positive_zero {
            return self.push_instruction(Instruction::FConst0);
        } else if float == 1.0 {
            return self.push_instruction(Instruction::FConst1);
        } else if float == 2.0 {
            return self.push_instruction(Instruction::FConst2);
        }
        match whole(f64::from(float)).and_then(short_int) {
            Some(insn) => {
                self.push_instruction(insn)?;
                self.push_instruction(Instruction::I2F)
            }
            None => self.push_instruction(Instruction::Ldc(Constant::Float(float))),
        }
    }

    fn const_double(&mut self, double: f64) -> Result<(), Error> {
        let positive_zero = double == 0.0 && double.is_sign_positive();
        if positive_zero {
            return self.push_instruction(Instruction::DConst0);
        } else if double == 1.0 {
            return self.push_instruction(Instruction::DConst1);
        }
        match whole(double).and_then(short_int) {
            Some(insn) => {
                self.push_instruction(insn)?;
                self.push_instruction(Instruction::I2D)
            }
            None => self.push_instruction(Instruction::Ldc2(Constant::Double(double))),
        }
    }

    fn const_class(&mut self, ty: RefType) -> Result<(), Error> {
        self.push_instruction(Instruction::Ldc(Constant::Class(ty)))
    }

    fn get_local(&mut self, slot: u16, field_type: &FieldType) -> Result<(), Error> {
        let (load, _) = local_access(field_type);
        self.push_instruction(load(slot))
    }

    fn set_local(&mut self, slot: u16, field_type: &FieldType) -> Result<(), Error> {
        let (_, store) = local_access(field_type);
        self.push_instruction(store(slot))
    }

    fn pop(&mut self, field_type: &FieldType) -> Result<(), Error> {
        match field_type.width() {
            2 => self.push_instruction(Instruction::Pop2),
            _ => self.push_instruction(Instruction::Pop),
        }
    }

    fn return_(&mut self, return_type: Option<&FieldType>) -> Result<(), Error> {
        let insn = match return_type {
            None => BranchInstruction::Return,
            Some(FieldType::Base(BaseType::Long)) => BranchInstruction::LReturn,
            Some(FieldType::Base(BaseType::Float)) => BranchInstruction::FReturn,
            Some(FieldType::Base(BaseType::Double)) => BranchInstruction::DReturn,
            Some(FieldType::Base(_)) => BranchInstruction::IReturn,
            Some(FieldType::Ref(_)) => BranchInstruction::AReturn,
        };
        self.push_branch_instruction(insn)
    }

    fn condition(&mut self, condition: &BranchCond) -> Result<(), Error> {
        let holds = self.fresh_label();
        let end = self.fresh_label();

        self.push_branch_instruction(condition.jump_to(holds))?;
        self.push_instruction(Instruction::IConst0)?;
        self.push_branch_instruction(BranchInstruction::Goto(end))?;
        self.place_label(holds)?;
        self.push_instruction(Instruction::IConst1)?;
        self.place_label(end)
    }

    fn invoke(&mut self, invoke_type: InvokeType, method: MethodRef) -> Result<(), Error> {
        self.push_instruction(Instruction::Invoke(invoke_type, method))
    }
}

/// Test performed by a conditional jump
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BranchCond {
    /// Compare an `int` against zero
    If(OrdComparison),
    /// Compare two `int`s
    IfICmp(OrdComparison),
    /// Compare two references
    IfACmp(EqComparison),
    /// Compare a reference against `null`
    IfNull(EqComparison),
}

impl BranchCond {
    /// Jump to `target` when the condition holds
    pub fn jump_to(&self, target: Label) -> BranchInstruction<Label> {
        match *self {
            BranchCond::If(ord) => BranchInstruction::If(ord, target),
            BranchCond::IfICmp(ord) => BranchInstruction::IfICmp(ord, target),
            BranchCond::IfACmp(eq) => BranchInstruction::IfACmp(eq, target),
            BranchCond::IfNull(eq) => BranchInstruction::IfNull(eq, target),
        }
    }
}
