//! Builder layer
//!
//! A [`TypeBuilder`] collects the members of a class. Method bodies are described through a
//! [`BlockBuilder`]: every operation returns a [`Value`] handle owned by the scope it was created
//! in, and control flow constructs (`if`, loops, `try`, `switch`) open nested scopes through
//! closures. When the body closure returns, the method is sealed: values needing storage get
//! local slots (reused across sibling scopes), and the scope tree is lowered into instructions.

mod block;
mod class;
mod coerce;
mod control;
mod emit;
mod errors;
mod method;
mod operation;
mod scope;
mod settings;
mod slots;
mod switch;
mod switch_table;
mod try_catch;
mod value;

pub use block::BlockBuilder;
pub use class::TypeBuilder;
pub use errors::Error;
pub use method::MethodBuilder;
pub use scope::{ScopeId, ScopeKind, ScopeSite};
pub use settings::{Settings, SwitchTableMode};
pub use switch::{CaseLabel, SwitchBuilder};
pub use try_catch::TryBuilder;
pub use value::{Value, Var};
