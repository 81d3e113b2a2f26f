//! Model CIL method bodies
//!
//! A [`MethodBody`] owns its instructions in an arena and hands out [`InstructionId`]s, which are
//! what every analysis table is keyed on. Bodies can be materialized three ways: built
//! programmatically with a [`MethodBodyBuilder`], parsed from a textual listing with
//! [`parse_listing`], or decoded from their binary encoding with [`decode_method_body`].
//!
//! ### Simple example
//!
//! ```
//! use ilstack::cil::*;
//!
//! # fn build() -> Result<(), Error> {
//! let methods = parse_listing(
//!     r#"
//!     .method Example::Sum
//!         ldarg.0
//!         ldarg.1
//!         add
//!         ret
//!     .end
//!     "#,
//! )?;
//!
//! let body = &methods[0];
//! assert_eq!(body.len(), 4);
//! for (_, instruction) in body.iter() {
//!     println!("{}", instruction);
//! }
//! # Ok(())
//! # }
//! # build().unwrap();
//! ```

mod body;
mod builder;
mod decode;
mod errors;
mod instruction;
mod label;
mod opcodes;
mod signature;
mod text;

pub use body::*;
pub use builder::*;
pub use decode::*;
pub use errors::*;
pub use instruction::*;
pub use label::*;
pub use opcodes::*;
pub use signature::*;
pub use text::*;
