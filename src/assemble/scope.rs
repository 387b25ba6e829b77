use super::operation::Operation;
use super::value::MethodToken;
use crate::jvm::code::{Label, LabelGenerator};
use std::fmt;
use std::panic::Location;

/// Handle to a scope of a method body, usable as a `break`/`continue` target
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId {
    pub(crate) method: MethodToken,
    pub(crate) index: usize,
}

/// What opened a scope
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Whole method body
    Root,
    Block,
    Then,
    Else,
    Loop,
    LoopUpdate,

    /// Container for everything belonging to one try statement
    TryFrame,
    TryBody,
    Catch,

    /// Synthetic handler which runs the finally logic on exceptional exits
    CatchAll,

    /// One copy of a finally block
    Finally,
    Switch,
    SwitchCase,
    SwitchDefault,
}

/// Where (and why) a scope was opened, for diagnostics
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeSite {
    pub kind: ScopeKind,
    pub location: &'static Location<'static>,
}

impl fmt::Display for ScopeSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} scope opened at {}", self.kind, self.location)
    }
}

pub(crate) struct ScopeData {
    pub parent: Option<usize>,
    pub kind: ScopeKind,
    pub ops: Vec<Operation>,

    /// Placed before the first operation
    pub entry: Label,

    /// Placed after the last operation (`break` target)
    pub exit: Label,

    /// `continue` target (same as `entry`, except for loops with an update section)
    pub cont: Label,

    pub origin: &'static Location<'static>,
}

/// Arena of all scopes in one method body
///
/// Index 0 is the root. Scopes are never removed, so indices stay valid for the life of the body.
pub(crate) struct Scopes {
    scopes: Vec<ScopeData>,
}

impl Scopes {
    pub fn new(labels: &mut LabelGenerator, origin: &'static Location<'static>) -> Scopes {
        let mut scopes = Scopes { scopes: vec![] };
        scopes.open(None, ScopeKind::Root, labels, origin);
        scopes
    }

    /// Allocate a fresh scope
    ///
    /// Loops get a distinct `continue` label, since they may have an update section.
    pub fn open(
        &mut self,
        parent: Option<usize>,
        kind: ScopeKind,
        labels: &mut LabelGenerator,
        origin: &'static Location<'static>,
    ) -> usize {
        let entry = labels.fresh_label();
        let exit = labels.fresh_label();
        let cont = if kind == ScopeKind::Loop {
            labels.fresh_label()
        } else {
            entry
        };
        self.scopes.push(ScopeData {
            parent,
            kind,
            ops: vec![],
            entry,
            exit,
            cont,
            origin,
        });
        self.scopes.len() - 1
    }

    pub fn get(&self, index: usize) -> &ScopeData {
        &self.scopes[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut ScopeData {
        &mut self.scopes[index]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn site(&self, index: usize) -> ScopeSite {
        let scope = &self.scopes[index];
        ScopeSite {
            kind: scope.kind,
            location: scope.origin,
        }
    }

    /// Is `ancestor` the same as `scope` or one of its (transitive) parents?
    pub fn is_ancestor(&self, ancestor: usize, scope: usize) -> bool {
        let mut current = Some(scope);
        while let Some(index) = current {
            if index == ancestor {
                return true;
            }
            current = self.scopes[index].parent;
        }
        false
    }
}
