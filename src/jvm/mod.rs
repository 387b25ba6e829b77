//! JVM class file vocabulary
//!
//! Everything here is independent of how method bodies get built: names and descriptors,
//! resolved member references, access flags, the instruction set (see [`code`]), and the
//! [`ClassWriter`] boundary through which assembled classes are handed to a binary backend.
//!
//! [`Listing`] is a [`ClassWriter`] that keeps everything in memory. It checks the writer
//! contract (labels placed exactly once, jump targets placed before the method closes) and
//! renders a readable disassembly.
//!
//! ```
//! use classforge::jvm::*;
//! use classforge::jvm::code::*;
//!
//! # fn write_class() -> Result<(), Error> {
//! let mut listing = Listing::new();
//! listing.open_class(&ClassHeader {
//!     name: BinaryName::from_string(String::from("demo/Empty")).unwrap(),
//!     super_class: BinaryName::OBJECT,
//!     interfaces: vec![],
//!     access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//! })?;
//! listing.open_method(&MethodHeader {
//!     name: UnqualifiedName::INIT,
//!     descriptor: MethodDescriptor::parse("()V").unwrap(),
//!     access_flags: MethodAccessFlags::PUBLIC,
//! })?;
//! listing.instruction(&Instruction::ALoad(0))?;
//! listing.instruction(&Instruction::Invoke(InvokeType::Special, MethodRef::object_init()))?;
//! listing.branch(&BranchInstruction::Return)?;
//! listing.close_method(1)?;
//! listing.close_class()?;
//! # Ok(())
//! # }
//! ```

mod access_flags;
pub mod code;
mod descriptors;
mod errors;
mod listing;
mod members;
mod names;
mod writer;

pub use crate::util::Width;
pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use listing::*;
pub use members::*;
pub use names::*;
pub use writer::*;
