//! Multi-way branches over `int`, `java/lang/String`, and enum values

use super::block::{mismatch, BlockBuilder};
use super::operation::{Arm, CaseKey, Operand, Operation, SwitchKind, SwitchOp};
use super::scope::ScopeKind;
use super::{Error, ScopeId, Value};
use crate::jvm::{FieldType, Name, RefType, UnqualifiedName};
use std::borrow::Cow;
use std::collections::HashSet;

/// Label of a switch case
///
/// Integer labels are for `int` switches. String labels are the strings of string switches, or
/// the constant names of enum switches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaseLabel {
    Int(i32),
    Str(Cow<'static, str>),
}

impl From<i32> for CaseLabel {
    fn from(integer: i32) -> CaseLabel {
        CaseLabel::Int(integer)
    }
}

impl From<&'static str> for CaseLabel {
    fn from(string: &'static str) -> CaseLabel {
        CaseLabel::Str(Cow::Borrowed(string))
    }
}

impl From<String> for CaseLabel {
    fn from(string: String) -> CaseLabel {
        CaseLabel::Str(Cow::Owned(string))
    }
}

impl std::fmt::Display for CaseLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseLabel::Int(integer) => write!(f, "{}", integer),
            CaseLabel::Str(string) => write!(f, "{:?}", string),
        }
    }
}

/// Collects the cases of one switch
///
/// Without fallthrough (the default), every case leaves the switch when it completes normally.
/// With fallthrough, a case continues into the next one unless it breaks out of the switch
/// scope (see [`SwitchBuilder::scope_id`]).
pub struct SwitchBuilder<'s, 'b> {
    block: &'s mut BlockBuilder<'b>,
    kind: SwitchKind,

    /// Switch table used by enum switches
    table: Option<usize>,

    frame: usize,
    arms: Vec<Arm>,
    seen: HashSet<CaseKey>,
    has_default: bool,
    fallthrough: bool,
}

impl<'b> BlockBuilder<'b> {
    /// Switch on an `int` (or a smaller integral type, or a wrapper of one)
    #[track_caller]
    pub fn switch_int<F>(&mut self, disc: Value, build: F) -> Result<(), Error>
    where
        F: FnOnce(&mut SwitchBuilder<'_, 'b>) -> Result<(), Error>,
    {
        let disc = self.operand(disc, &FieldType::int())?;
        self.switch(SwitchKind::Int, None, disc, build)
    }

    /// Switch on the content of a string
    #[track_caller]
    pub fn switch_string<F>(&mut self, disc: Value, build: F) -> Result<(), Error>
    where
        F: FnOnce(&mut SwitchBuilder<'_, 'b>) -> Result<(), Error>,
    {
        let disc = self.operand(disc, &FieldType::string())?;
        self.switch(SwitchKind::String, None, disc, build)
    }

    /// Switch on an enum constant
    ///
    /// Cases are labelled with constant names. The switch goes through an ordinal table built
    /// when the switch first runs, so it keeps working if the enum is reordered or extended
    /// after this class is assembled.
    #[track_caller]
    pub fn switch_enum<F>(&mut self, disc: Value, build: F) -> Result<(), Error>
    where
        F: FnOnce(&mut SwitchBuilder<'_, 'b>) -> Result<(), Error>,
    {
        let enum_type = match self.type_of(disc)? {
            FieldType::Ref(RefType::Object(class)) => class,
            other => return Err(mismatch("an enum constant", &other)),
        };
        let disc = self.operand_as_is(disc)?;

        let body = &mut *self.body;
        let table = body
            .tables
            .table_for(&body.class, &enum_type, &body.settings)?;
        let accessor = body.tables.get(table).accessor.clone();
        let kind = SwitchKind::Enum {
            enum_type,
            accessor,
        };
        self.switch(kind, Some(table), disc, build)
    }

    #[track_caller]
    fn switch<F>(
        &mut self,
        kind: SwitchKind,
        table: Option<usize>,
        disc: Operand,
        build: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut SwitchBuilder<'_, 'b>) -> Result<(), Error>,
    {
        let frame = self.open(ScopeKind::Switch);
        let mut builder = SwitchBuilder {
            block: self,
            kind,
            table,
            frame,
            arms: vec![],
            seen: HashSet::new(),
            has_default: false,
            fallthrough: false,
        };
        build(&mut builder)?;

        let SwitchBuilder {
            block,
            kind,
            arms,
            fallthrough,
            ..
        } = builder;
        block.push(Operation::Switch(Box::new(SwitchOp {
            kind,
            disc,
            frame,
            arms,
            fallthrough,
        })));
        Ok(())
    }
}

impl<'s, 'b> SwitchBuilder<'s, 'b> {
    /// Handle for the switch scope, the target for `break_` out of a case
    pub fn scope_id(&self) -> ScopeId {
        ScopeId {
            method: self.block.body.token,
            index: self.frame,
        }
    }

    /// Whether cases fall into the next case when they complete normally
    pub fn fallthrough(&mut self, fallthrough: bool) {
        self.fallthrough = fallthrough;
    }

    fn case_key(&mut self, label: CaseLabel) -> Result<CaseKey, Error> {
        match (&self.kind, label) {
            (SwitchKind::Int, CaseLabel::Int(integer)) => Ok(CaseKey::Int(integer)),
            (SwitchKind::String, CaseLabel::Str(string)) => {
                Ok(CaseKey::String(string.into_owned()))
            }
            (SwitchKind::Enum { .. }, CaseLabel::Str(constant)) => {
                let constant = UnqualifiedName::from_string(constant.into_owned())
                    .map_err(Error::MalformedName)?;
                let table = self
                    .table
                    .ok_or_else(|| Error::CaseLabelMismatch(constant.as_str().to_owned()))?;
                let index = self.block.body.tables.index_of(table, &constant);
                Ok(CaseKey::Index(index))
            }
            (_, label) => Err(Error::CaseLabelMismatch(label.to_string())),
        }
    }

    /// Case taken for any of the given labels
    #[track_caller]
    pub fn case<L, F>(&mut self, labels: L, build: F) -> Result<(), Error>
    where
        L: IntoIterator,
        L::Item: Into<CaseLabel>,
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        let mut keys = vec![];
        for label in labels {
            let label = label.into();
            let rendered = label.to_string();
            let key = self.case_key(label)?;
            if !self.seen.insert(key.clone()) {
                return Err(Error::DuplicateCaseLabel(rendered));
            }
            keys.push(key);
        }
        self.arm(ScopeKind::SwitchCase, keys, false, build)
    }

    /// Case taken when no other case matches
    #[track_caller]
    pub fn default<F>(&mut self, build: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        if self.has_default {
            return Err(Error::DuplicateDefault);
        }
        self.has_default = true;
        self.arm(ScopeKind::SwitchDefault, vec![], true, build)
    }

    #[track_caller]
    fn arm<F>(
        &mut self,
        kind: ScopeKind,
        keys: Vec<CaseKey>,
        is_default: bool,
        build: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        let scope = self.block.open_in(self.frame, kind);
        build(&mut self.block.nested(scope))?;
        self.arms.push(Arm {
            keys,
            is_default,
            scope,
        });
        Ok(())
    }
}
