//! Lowering of a sealed scope tree into a flat instruction stream
//!
//! Emission is a single depth-first walk in the same order the slot allocator used. Every scope
//! places its entry label, then its operations, then its exit label.
//!
//! ### Exception ranges
//!
//! A try statement protects everything between the start of its body and the end of its body
//! (for typed catch clauses) or the end of its last catch clause (for the catch-all which runs
//! the finally block). Finally copies emitted inline on exit edges, along with the jump or return
//! that follows them, are cut out of those ranges as "holes": an exception thrown while running
//! a finally copy must not run the same finally block again.
//!
//! ```text
//!     body_start:
//!       <body>
//!       <finally copy>  goto exit     <- hole
//!     body_end:
//!       <catch 1>
//!       <finally copy>  goto exit     <- hole
//!     catches_end:
//!       <catch-all: store, finally copy, rethrow>
//!     exit:
//! ```

use super::operation::{Arm, CaseKey, Cleanup, JumpKind, OpKind, Operand, Operation};
use super::operation::{SwitchKind, SwitchOp, TryOp};
use super::slots::{Allocation, Storage};
use super::value::{Lifecycle, Literal};
use super::{method::Body, Error};
use crate::jvm::code::{
    BranchInstruction, CodeBuilder, CodeBuilderExts, ExceptionRange, Instruction, InvokeType,
    Label, OrdComparison,
};
use crate::jvm::{self, BinaryName, FieldType, MethodRef};
use std::collections::BTreeMap;

/// Try statement whose body or catch clauses are being emitted
struct ActiveTry {
    id: usize,

    /// Ranges which must not be protected, in emission order
    holes: Vec<(Label, Label)>,
}

struct Emitter<'a> {
    body: &'a Body,
    allocation: &'a Allocation,
    code: CodeBuilder,
    tries: Vec<ActiveTry>,
}

/// Emit the whole body, leaving the builder open so the caller can check reachability
pub(crate) fn emit(body: &Body, allocation: &Allocation) -> Result<CodeBuilder, Error> {
    let mut emitter = Emitter {
        body,
        allocation,
        code: CodeBuilder::new(body.labels.clone(), body.first_free_slot),
        tries: vec![],
    };
    emitter.emit_scope(0)?;
    Ok(emitter.code)
}

impl<'a> Emitter<'a> {
    fn emit_scope(&mut self, scope: usize) -> Result<(), Error> {
        let body = self.body;
        let data = body.scopes.get(scope);
        self.code.place_label(data.entry)?;
        for op in &data.ops {
            self.emit_op(op)?;
        }
        self.code.place_label(data.exit)?;
        Ok(())
    }

    fn slot(&self, value: usize) -> Result<Option<u16>, Error> {
        match self.allocation.storage[value] {
            Storage::Slotted(slot) => {
                let slot = u16::try_from(slot)
                    .map_err(|_| jvm::Error::MethodCodeMaxLocalsOverflow(slot))?;
                Ok(Some(slot))
            }
            _ => Ok(None),
        }
    }

    fn ty(&self, value: usize) -> &'a FieldType {
        let body: &'a Body = self.body;
        &body.values[value].ty
    }

    /// Push an operand onto the stack, converted to the type its consumer expects
    fn load(&mut self, operand: &Operand) -> Result<(), Error> {
        let value = operand.value;
        match self.allocation.storage[value] {
            Storage::Constant => self.push_literal(value)?,
            Storage::SingleUse => (),
            Storage::Slotted(_) => {
                let ty = self.ty(value);
                if let Some(slot) = self.slot(value)? {
                    self.code.get_local(slot, ty)?;
                }
            }
            Storage::Discarded => {
                return Err(Error::Unsupported(String::from(
                    "value read before the operation producing it",
                )))
            }
        }
        for insn in &operand.coercion {
            self.code.push_instruction(insn.clone())?;
        }
        Ok(())
    }

    fn push_literal(&mut self, value: usize) -> Result<(), Error> {
        let body = self.body;
        if let Lifecycle::Constant(literal) = &body.values[value].lifecycle {
            match literal {
                Literal::Int(integer) => self.code.const_int(*integer)?,
                Literal::Long(long) => self.code.const_long(*long)?,
                Literal::Float(float) => self.code.const_float(*float)?,
                Literal::Double(double) => self.code.const_double(*double)?,
                Literal::String(string) => self.code.const_string(string.clone())?,
                Literal::Null => self.code.const_null()?,
                Literal::Class(ty) => self.code.const_class(ty.clone())?,
            }
        }
        Ok(())
    }

    /// Dispose of the value an operation just pushed
    fn produce(&mut self, result: Option<usize>) -> Result<(), Error> {
        let value = match result {
            Some(value) => value,
            None => return Ok(()),
        };
        let ty = self.ty(value);
        match self.allocation.storage[value] {
            Storage::SingleUse | Storage::Constant => (),
            Storage::Discarded => self.code.pop(ty)?,
            Storage::Slotted(_) => {
                if let Some(slot) = self.slot(value)? {
                    self.code.set_local(slot, ty)?;
                }
            }
        }
        Ok(())
    }

    fn emit_op(&mut self, op: &Operation) -> Result<(), Error> {
        let body = self.body;
        match op {
            Operation::Simple {
                kind,
                operands,
                result,
            } => self.emit_simple(kind, operands, *result),

            Operation::Block(scope) => self.emit_scope(*scope),

            Operation::If {
                cond,
                when_true,
                when_false: None,
            } => {
                let skip = body.scopes.get(*when_true).exit;
                self.load(cond)?;
                self.code
                    .push_branch_instruction(BranchInstruction::If(OrdComparison::EQ, skip))?;
                self.emit_scope(*when_true)
            }

            Operation::If {
                cond,
                when_true,
                when_false: Some(when_false),
            } => {
                let true_arm = body.scopes.get(*when_true);
                self.load(cond)?;
                self.code.push_branch_instruction(BranchInstruction::If(
                    OrdComparison::NE,
                    true_arm.entry,
                ))?;
                self.emit_scope(*when_false)?;
                self.code
                    .push_branch_instruction(BranchInstruction::Goto(true_arm.exit))?;
                self.emit_scope(*when_true)
            }

            Operation::Loop {
                body: looped,
                update,
            } => {
                let looped = body.scopes.get(*looped);
                self.code.place_label(looped.entry)?;
                for op in &looped.ops {
                    self.emit_op(op)?;
                }
                self.code.place_label(looped.cont)?;
                if let Some(update) = update {
                    self.emit_scope(*update)?;
                }
                self.code
                    .push_branch_instruction(BranchInstruction::Goto(looped.entry))?;
                self.code.place_label(looped.exit)?;
                Ok(())
            }

            Operation::ExitUnless { cond, target } => {
                let exit = body.scopes.get(*target).exit;
                self.load(cond)?;
                self.code
                    .push_branch_instruction(BranchInstruction::If(OrdComparison::EQ, exit))
                    .map_err(Error::from)
            }

            Operation::Jump {
                kind,
                target,
                cleanups,
            } => {
                let target = body.scopes.get(*target);
                let label = match kind {
                    JumpKind::Break => target.exit,
                    JumpKind::Continue => target.cont,
                };
                self.emit_exit(cleanups, |emitter| {
                    emitter
                        .code
                        .push_branch_instruction(BranchInstruction::Goto(label))
                        .map_err(Error::from)
                })
            }

            Operation::Return { value, cleanups } => {
                let return_type = body.descriptor.return_type.as_ref();
                self.emit_exit(cleanups, |emitter| {
                    if let Some(value) = value {
                        emitter.load(value)?;
                    }
                    emitter.code.return_(return_type).map_err(Error::from)
                })
            }

            Operation::Throw { value } => {
                self.load(value)?;
                self.code
                    .push_branch_instruction(BranchInstruction::AThrow)
                    .map_err(Error::from)
            }

            Operation::Try(try_op) => self.emit_try(try_op),

            Operation::Switch(switch) => self.emit_switch(switch),
        }
    }

    fn emit_simple(
        &mut self,
        kind: &OpKind,
        operands: &[Operand],
        result: Option<usize>,
    ) -> Result<(), Error> {
        match kind {
            OpKind::Insns(insns) => {
                for operand in operands {
                    self.load(operand)?;
                }
                for insn in insns {
                    self.code.push_instruction(insn.clone())?;
                }
            }
            OpKind::New { class, ctor } => {
                self.code.push_instruction(Instruction::New(class.clone()))?;
                self.code.push_instruction(Instruction::Dup)?;
                for operand in operands {
                    self.load(operand)?;
                }
                self.code.invoke(InvokeType::Special, ctor.clone())?;
            }
            OpKind::Compare { prefix, cond } => {
                for operand in operands {
                    self.load(operand)?;
                }
                if let Some(prefix) = prefix {
                    self.code.push_instruction(prefix.clone())?;
                }
                self.code.condition(cond)?;
            }
            OpKind::Store { var, .. } => {
                for operand in operands {
                    self.load(operand)?;
                }
                let ty = self.ty(*var);
                if let Some(slot) = self.slot(*var)? {
                    self.code.set_local(slot, ty)?;
                }
            }
            OpKind::Inc { var, delta } => {
                if let Some(slot) = self.slot(*var)? {
                    self.code.push_instruction(Instruction::IInc(slot, *delta))?;
                }
            }
            OpKind::Copy => {
                for operand in operands {
                    self.load(operand)?;
                }
            }
            OpKind::Caught => (),
        }
        self.produce(result)
    }

    /// Run the finally copies of an exit edge, then leave through `terminal`
    ///
    /// Copy `j` belongs to the `j`th crossed try, so it is a hole in that try and in the tries
    /// crossed before it. Tries further out still protect it. The terminal jump or return is a
    /// hole in every crossed try.
    fn emit_exit(
        &mut self,
        cleanups: &[Cleanup],
        terminal: impl FnOnce(&mut Self) -> Result<(), Error>,
    ) -> Result<(), Error> {
        for (idx, cleanup) in cleanups.iter().enumerate() {
            let start = self.code.fresh_label();
            let end = self.code.fresh_label();
            self.code.place_label(start)?;
            self.emit_scope(cleanup.scope)?;
            self.code.place_label(end)?;
            self.record_hole(&cleanups[..=idx], start, end);
        }

        let start = self.code.fresh_label();
        let end = self.code.fresh_label();
        self.code.place_label(start)?;
        terminal(self)?;
        self.code.place_label(end)?;
        self.record_hole(cleanups, start, end);
        Ok(())
    }

    fn record_hole(&mut self, crossed: &[Cleanup], start: Label, end: Label) {
        for cleanup in crossed {
            let active = self
                .tries
                .iter_mut()
                .find(|active| active.id == cleanup.try_id);
            if let Some(active) = active {
                active.holes.push((start, end));
            }
        }
    }

    /// Split `start..end` around holes, dropping empty pieces
    fn protected_pieces(
        &self,
        start: Label,
        end: Label,
        holes: &[(Label, Label)],
    ) -> Vec<(Label, Label)> {
        let mut pieces = vec![];
        let mut cursor = start;
        for (hole_start, hole_end) in holes.iter().copied().chain([(end, end)]) {
            pieces.push((cursor, hole_start));
            cursor = hole_end;
        }
        pieces.retain(|(from, until)| {
            match (self.code.label_position(*from), self.code.label_position(*until)) {
                (Some(from), Some(until)) => from < until,
                _ => false,
            }
        });
        pieces
    }

    fn protect(
        &mut self,
        start: Label,
        end: Label,
        holes: &[(Label, Label)],
        handler: Label,
        catch_type: Option<BinaryName>,
    ) {
        for (from, until) in self.protected_pieces(start, end, holes) {
            self.code.push_exception_range(ExceptionRange {
                start: from,
                end: until,
                handler,
                catch_type: catch_type.clone(),
            });
        }
    }

    fn emit_try(&mut self, try_op: &TryOp) -> Result<(), Error> {
        let body = self.body;
        let frame = body.scopes.get(try_op.frame);
        self.code.place_label(frame.entry)?;

        let body_start = self.code.fresh_label();
        self.code.place_label(body_start)?;
        self.tries.push(ActiveTry {
            id: try_op.id,
            holes: vec![],
        });
        self.emit_scope(try_op.body)?;
        self.emit_exit(&try_op.body_exit, |emitter| {
            emitter
                .code
                .push_branch_instruction(BranchInstruction::Goto(frame.exit))
                .map_err(Error::from)
        })?;
        let body_end = self.code.fresh_label();
        self.code.place_label(body_end)?;

        // Handlers must be referenced before they are placed, or they would be dead code
        let body_holes = self.current_holes();
        for clause in &try_op.catches {
            let handler = body.scopes.get(clause.scope).entry;
            let catch_type = Some(clause.catch_type.clone());
            self.protect(body_start, body_end, &body_holes, handler, catch_type);
        }

        for clause in &try_op.catches {
            self.emit_scope(clause.scope)?;
            self.emit_exit(&clause.exit, |emitter| {
                emitter
                    .code
                    .push_branch_instruction(BranchInstruction::Goto(frame.exit))
                    .map_err(Error::from)
            })?;
        }
        let catches_end = self.code.fresh_label();
        self.code.place_label(catches_end)?;

        let all_holes = self.current_holes();
        self.tries.pop();

        if let Some(catch_all) = try_op.catch_all {
            let handler = body.scopes.get(catch_all).entry;
            self.protect(body_start, catches_end, &all_holes, handler, None);
            self.emit_scope(catch_all)?;
        }

        self.code.place_label(frame.exit)?;
        Ok(())
    }

    fn current_holes(&self) -> Vec<(Label, Label)> {
        self.tries
            .last()
            .map(|active| active.holes.clone())
            .unwrap_or_default()
    }

    fn emit_switch(&mut self, switch: &SwitchOp) -> Result<(), Error> {
        let body = self.body;
        let frame = body.scopes.get(switch.frame);
        self.code.place_label(frame.entry)?;

        let default = switch
            .arms
            .iter()
            .find(|arm| arm.is_default)
            .map_or(frame.exit, |arm| body.scopes.get(arm.scope).entry);

        match &switch.kind {
            SwitchKind::Int => {
                self.load(&switch.disc)?;
                let targets = self.keyed_targets(&switch.arms, |key| match key {
                    CaseKey::Int(key) => Some(*key),
                    _ => None,
                });
                self.dense_or_sparse_switch(targets, default, false)?;
            }

            SwitchKind::Enum {
                enum_type,
                accessor,
            } => {
                self.code.invoke(InvokeType::Static, accessor.clone())?;
                self.load(&switch.disc)?;
                self.code.invoke(
                    InvokeType::Virtual,
                    MethodRef::enum_ordinal(enum_type.clone()),
                )?;
                self.code.push_instruction(Instruction::IALoad)?;
                let targets = self.keyed_targets(&switch.arms, |key| match key {
                    CaseKey::Index(index) => Some(*index),
                    _ => None,
                });
                self.dense_or_sparse_switch(targets, default, true)?;
            }

            SwitchKind::String => self.string_dispatch(switch, default)?,
        }

        for arm in &switch.arms {
            self.emit_scope(arm.scope)?;
            if !switch.fallthrough {
                self.code
                    .push_branch_instruction(BranchInstruction::Goto(frame.exit))?;
            }
        }
        self.code.place_label(frame.exit)?;
        Ok(())
    }

    /// Integer keys of every arm, mapped to the arm's entry
    fn keyed_targets(
        &self,
        arms: &[Arm],
        key: impl Fn(&CaseKey) -> Option<i32>,
    ) -> BTreeMap<i32, Label> {
        let mut targets = BTreeMap::new();
        for arm in arms {
            let entry = self.body.scopes.get(arm.scope).entry;
            for case_key in &arm.keys {
                if let Some(case_key) = key(case_key) {
                    targets.insert(case_key, entry);
                }
            }
        }
        targets
    }

    /// `tableswitch` if the keys are dense enough (or `force_table`), otherwise `lookupswitch`
    fn dense_or_sparse_switch(
        &mut self,
        targets: BTreeMap<i32, Label>,
        default: Label,
        force_table: bool,
    ) -> Result<(), Error> {
        let (low, high) = match (targets.keys().next(), targets.keys().next_back()) {
            (Some(low), Some(high)) => (*low, *high),
            _ => {
                return self
                    .code
                    .push_branch_instruction(BranchInstruction::LookupSwitch {
                        default,
                        targets: vec![],
                    })
                    .map_err(Error::from)
            }
        };

        let range = i64::from(high) - i64::from(low) + 1;
        let insn = if force_table || range <= 2 * targets.len() as i64 {
            let table = (low..=high)
                .map(|key| targets.get(&key).copied().unwrap_or(default))
                .collect();
            BranchInstruction::TableSwitch {
                default,
                low,
                targets: table,
            }
        } else {
            BranchInstruction::LookupSwitch {
                default,
                targets: targets.into_iter().collect(),
            }
        };
        self.code.push_branch_instruction(insn)?;
        Ok(())
    }

    /// `lookupswitch` on `hashCode()`, then `equals` tests within each hash bucket
    fn string_dispatch(&mut self, switch: &SwitchOp, default: Label) -> Result<(), Error> {
        let mut buckets: BTreeMap<i32, Vec<(&str, Label)>> = BTreeMap::new();
        for arm in &switch.arms {
            let entry = self.body.scopes.get(arm.scope).entry;
            for key in &arm.keys {
                if let CaseKey::String(string) = key {
                    buckets
                        .entry(java_hash_code(string))
                        .or_default()
                        .push((string.as_str(), entry));
                }
            }
        }

        let bucket_labels: Vec<(i32, Label)> = buckets
            .keys()
            .map(|hash| (*hash, self.code.fresh_label()))
            .collect();

        self.load(&switch.disc)?;
        self.code
            .invoke(InvokeType::Virtual, MethodRef::string_hash_code())?;
        self.code
            .push_branch_instruction(BranchInstruction::LookupSwitch {
                default,
                targets: bucket_labels.clone(),
            })?;

        for ((_, label), bucket) in bucket_labels.into_iter().zip(buckets.values()) {
            self.code.place_label(label)?;
            for (string, target) in bucket {
                self.load(&switch.disc)?;
                self.code.const_string(String::from(*string))?;
                self.code
                    .invoke(InvokeType::Virtual, MethodRef::string_equals())?;
                self.code
                    .push_branch_instruction(BranchInstruction::If(OrdComparison::NE, *target))?;
            }
            self.code
                .push_branch_instruction(BranchInstruction::Goto(default))?;
        }
        Ok(())
    }
}

/// `java.lang.String.hashCode` over UTF-16 code units
pub(crate) fn java_hash_code(string: &str) -> i32 {
    string
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}
