//! Try statements
//!
//! While the body and the catch clauses are being built, every exit edge leaving the try (normal
//! completion, `return`, `break`, `continue`) records an empty placeholder scope. Supplying the
//! finally block fills each placeholder with a fresh copy of it, and adds a catch-all handler
//! which runs one more copy before rethrowing.

use super::block::BlockBuilder;
use super::method::TryFrame;
use super::operation::{CatchClause, Cleanup, OpKind, Operation, TryOp};
use super::scope::ScopeKind;
use super::{Error, Value};
use crate::jvm::{BinaryName, FieldType};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TryState {
    Fresh,
    Body,
    Catches,
    Finally,
}

impl TryState {
    fn describe(self) -> &'static str {
        match self {
            TryState::Fresh => "without a body",
            TryState::Body => "with a body",
            TryState::Catches => "with catch clauses",
            TryState::Finally => "with a finally block",
        }
    }
}

/// Builds one try statement: a body, then catch clauses, then optionally a finally block
pub struct TryBuilder<'t, 'b> {
    block: &'t mut BlockBuilder<'b>,
    id: usize,
    frame: usize,
    state: TryState,
    body: Option<usize>,
    body_exit: Vec<Cleanup>,
    catches: Vec<CatchClause>,
    catch_all: Option<usize>,
    frame_open: bool,
}

impl<'b> BlockBuilder<'b> {
    /// Build a try statement
    ///
    /// ```
    /// # use classforge::assemble::{BlockBuilder, Error};
    /// # use classforge::jvm::BinaryName;
    /// # fn build(b: &mut BlockBuilder) -> Result<(), Error> {
    /// let attempts = b.const_int(0);
    /// let attempts = b.local(attempts)?;
    /// b.try_(|t| {
    ///     t.body(|b| b.throw_new(BinaryName::RUNTIMEEXCEPTION, Some("boom")))?;
    ///     t.catch(BinaryName::RUNTIMEEXCEPTION, |_, _| Ok(()))?;
    ///     t.finally(|b| b.inc(attempts, 1))
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    #[track_caller]
    pub fn try_<F>(&mut self, build: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TryBuilder<'_, 'b>) -> Result<(), Error>,
    {
        let frame = self.open(ScopeKind::TryFrame);
        let id = self.body.next_try_id;
        self.body.next_try_id += 1;
        self.body.try_frames.push(TryFrame {
            id,
            scope: frame,
            placeholders: vec![],
        });

        let mut builder = TryBuilder {
            block: self,
            id,
            frame,
            state: TryState::Fresh,
            body: None,
            body_exit: vec![],
            catches: vec![],
            catch_all: None,
            frame_open: true,
        };
        build(&mut builder)?;
        builder.finish()
    }
}

impl<'t, 'b> TryBuilder<'t, 'b> {
    fn check(&self, operation: &'static str, allowed: &[TryState]) -> Result<(), Error> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidTryState {
                operation,
                state: self.state.describe(),
            })
        }
    }

    /// Placeholder for the finally block on an exit from the body or a catch clause
    #[track_caller]
    fn placeholder(&mut self) -> Result<Cleanup, Error> {
        let scope = self.block.open_in(self.frame, ScopeKind::Finally);
        let frame = self.own_frame("exit")?;
        frame.placeholders.push(scope);
        Ok(Cleanup {
            try_id: self.id,
            scope,
        })
    }

    fn own_frame(&mut self, operation: &'static str) -> Result<&mut TryFrame, Error> {
        let id = self.id;
        let state = self.state.describe();
        self.block
            .body
            .try_frames
            .last_mut()
            .filter(|frame| frame.id == id)
            .ok_or(Error::InvalidTryState { operation, state })
    }

    /// Code protected by the try statement
    #[track_caller]
    pub fn body<F>(&mut self, build: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder) -> Result<(), Error>,
    {
        self.check("body", &[TryState::Fresh])?;
        let scope = self.block.open_in(self.frame, ScopeKind::TryBody);
        build(&mut self.block.nested(scope))?;
        self.body = Some(scope);
        self.body_exit = vec![self.placeholder()?];
        self.state = TryState::Body;
        Ok(())
    }

    /// Handler for exceptions of type `catch_type` (or a subclass) thrown in the body
    ///
    /// The closure receives the caught exception.
    #[track_caller]
    pub fn catch<F>(&mut self, catch_type: BinaryName, build: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BlockBuilder, Value) -> Result<(), Error>,
    {
        self.check("catch", &[TryState::Body, TryState::Catches])?;
        if self
            .catches
            .iter()
            .any(|clause| clause.catch_type == catch_type)
        {
            return Err(Error::DuplicateCatchType(catch_type));
        }

        let scope = self.block.open_in(self.frame, ScopeKind::Catch);
        {
            let mut b = self.block.nested(scope);
            let exception = b
                .simple(
                    OpKind::Caught,
                    vec![],
                    Some(FieldType::object(catch_type.clone())),
                )
                .ok_or_else(|| Error::VoidValue(String::from("caught exception")))?;
            build(&mut b, exception)?;
        }
        let exit = vec![self.placeholder()?];
        self.catches.push(CatchClause {
            catch_type,
            scope,
            exit,
        });
        self.state = TryState::Catches;
        Ok(())
    }

    /// Block run on every way out of the body and the catch clauses
    ///
    /// The closure is called once per exit edge, and once more for exceptional exits. Each call
    /// builds into a fresh scope.
    #[track_caller]
    pub fn finally<F>(&mut self, build: F) -> Result<(), Error>
    where
        F: Fn(&mut BlockBuilder) -> Result<(), Error>,
    {
        self.check("finally", &[TryState::Body, TryState::Catches])?;
        let placeholders = std::mem::take(&mut self.own_frame("finally")?.placeholders);
        self.block.body.try_frames.pop();
        self.frame_open = false;

        for placeholder in placeholders {
            build(&mut self.block.nested(placeholder))?;
        }

        let catch_all = self.block.open_in(self.frame, ScopeKind::CatchAll);
        {
            let mut b = self.block.nested(catch_all);
            let exception = b
                .simple(
                    OpKind::Caught,
                    vec![],
                    Some(FieldType::object(BinaryName::THROWABLE)),
                )
                .ok_or_else(|| Error::VoidValue(String::from("caught exception")))?;
            let copy = b.open(ScopeKind::Finally);
            build(&mut b.nested(copy))?;
            b.push(Operation::Block(copy));
            b.throw_(exception)?;
        }
        self.catch_all = Some(catch_all);
        self.state = TryState::Finally;
        Ok(())
    }

    fn finish(self) -> Result<(), Error> {
        let body = match self.body {
            Some(body) => body,
            None => {
                return Err(Error::InvalidTryState {
                    operation: "end",
                    state: self.state.describe(),
                })
            }
        };
        if self.frame_open {
            let id = self.id;
            match self.block.body.try_frames.pop() {
                Some(frame) if frame.id == id => (),
                _ => {
                    return Err(Error::InvalidTryState {
                        operation: "end",
                        state: "with an unfinished nested try",
                    })
                }
            }
        }

        self.block.push(Operation::Try(Box::new(TryOp {
            id: self.id,
            frame: self.frame,
            body,
            body_exit: self.body_exit,
            catches: self.catches,
            catch_all: self.catch_all,
        })));
        Ok(())
    }
}
