//! Assemble JVM classes from a structured description of their methods.
//!
//! The crate is split in two layers:
//!
//!   - [`jvm`] models the class file vocabulary (names, descriptors, instructions, labels) and
//!     the [`jvm::ClassWriter`] boundary through which finished classes are handed off
//!   - [`assemble`] is the builder layer: method bodies are described as a tree of scopes holding
//!     operations over value handles, and sealing a method allocates local slots and lowers the
//!     tree into a flat instruction stream
//!
//! ```
//! use classforge::assemble::TypeBuilder;
//! use classforge::jvm::*;
//!
//! # fn build() -> Result<(), classforge::assemble::Error> {
//! let mut class = TypeBuilder::new(
//!     BinaryName::from_string(String::from("demo/Adder")).unwrap(),
//!     BinaryName::OBJECT,
//!     vec![],
//! );
//! class
//!     .method(
//!         UnqualifiedName::from_string(String::from("three")).unwrap(),
//!         MethodDescriptor::parse("()I").unwrap(),
//!     )
//!     .access(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC)
//!     .body(|b| {
//!         let one = b.const_int(1);
//!         let two = b.const_int(2);
//!         let sum = b.add(one, two)?;
//!         b.return_value(sum)
//!     })?;
//!
//! let mut listing = Listing::new();
//! class.close(&mut listing)?;
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod jvm;
mod util;
