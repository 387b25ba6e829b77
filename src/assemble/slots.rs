//! Local slot allocation
//!
//! One pass over the finished scope tree, in emission order. Every pending value ends up in one
//! of three places:
//!
//!   - nowhere, if it is never read (the producer pops it)
//!   - on the stack, if its only read is the first thing the very next operation loads
//!   - in the next free local slot otherwise
//!
//! The free slot counter is restored when a scope ends, so sibling scopes share slots. This is
//! safe because values can't be read outside of the scope that produced them.

use super::method::Body;
use super::operation::{OpKind, Operation};
use super::value::Lifecycle;
use crate::jvm::Width;

/// Where a value lives once the method is emitted
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Storage {
    /// Pushed afresh at every use
    Constant,

    /// Left on the stack for the operation immediately after the producer
    SingleUse,

    Slotted(usize),

    /// Never read, popped right away
    Discarded,
}

/// Proof that a value has not been classified yet
///
/// Classifying consumes the token, so a value is classified at most once.
pub(crate) struct Pending(usize);

impl Pending {
    pub fn value(&self) -> usize {
        self.0
    }

    pub fn single_use(self) -> Storage {
        Storage::SingleUse
    }

    pub fn slotted(self, slot: usize) -> Storage {
        Storage::Slotted(slot)
    }

    pub fn discarded(self) -> Storage {
        Storage::Discarded
    }
}

#[derive(Debug)]
pub(crate) struct Allocation {
    /// Storage of every value, indexed like the body's values
    pub storage: Vec<Storage>,

    /// Slots used, including parameters
    pub max_locals: usize,

    /// Number of values chained through the stack instead of a slot
    pub elided: usize,
}

struct Allocator<'a> {
    body: &'a Body,
    reads: Vec<usize>,
    storage: Vec<Storage>,
    next_slot: usize,
    max_locals: usize,
    elided: usize,
}

/// Decide the storage of every value in the body
pub(crate) fn allocate(body: &Body) -> Allocation {
    let mut reads = vec![0; body.values.len()];
    for index in 0..body.scopes.len() {
        for op in &body.scopes.get(index).ops {
            for operand in op.operands() {
                reads[operand.value] += 1;
            }
        }
    }

    let storage = body
        .values
        .iter()
        .map(|value| match value.lifecycle {
            Lifecycle::Constant(_) => Storage::Constant,
            Lifecycle::Parameter(slot) => Storage::Slotted(slot as usize),
            Lifecycle::Variable | Lifecycle::Pending => Storage::Discarded,
        })
        .collect();

    let mut allocator = Allocator {
        body,
        reads,
        storage,
        next_slot: body.first_free_slot,
        max_locals: body.first_free_slot,
        elided: 0,
    };
    allocator.visit_scope(0);

    Allocation {
        storage: allocator.storage,
        max_locals: allocator.max_locals,
        elided: allocator.elided,
    }
}

impl<'a> Allocator<'a> {
    fn visit_scope(&mut self, scope: usize) {
        let saved = self.next_slot;
        let ops = &self.body.scopes.get(scope).ops;
        for (idx, op) in ops.iter().enumerate() {
            self.visit_op(op, ops.get(idx + 1));
        }
        self.next_slot = saved;
    }

    fn visit_op(&mut self, op: &Operation, next_op: Option<&Operation>) {
        if let Operation::Simple { kind, result, .. } = op {
            if let OpKind::Store { var, declare: true } = kind {
                let slot = self.reserve(*var);
                self.storage[*var] = Storage::Slotted(slot);
            }
            if let Some(result) = result {
                self.classify(*result, next_op);
            }
        }
        for scope in op.nested_scopes() {
            self.visit_scope(scope);
        }
    }

    fn classify(&mut self, value: usize, next_op: Option<&Operation>) {
        if !matches!(self.body.values[value].lifecycle, Lifecycle::Pending) {
            return;
        }
        let pending = Pending(value);
        self.storage[value] = match self.reads[pending.value()] {
            0 => pending.discarded(),
            1 if next_op.and_then(Operation::top) == Some(value) => {
                self.elided += 1;
                pending.single_use()
            }
            _ => {
                let slot = self.reserve(pending.value());
                pending.slotted(slot)
            }
        };
    }

    fn reserve(&mut self, value: usize) -> usize {
        let slot = self.next_slot;
        self.next_slot += self.body.values[value].ty.width();
        self.max_locals = self.max_locals.max(self.next_slot);
        slot
    }
}
