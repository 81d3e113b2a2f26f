//! Evaluation stack analyses
//!
//! There are two independent analyses here, sharing the [`StackEffect`] model of instructions:
//!
//!   * a forward dataflow pass ([`validate_push_methods`] and [`analyze_stack`]) tracking the depth
//!     of the stack and how many values at its bottom are unsafe to use in a guarded push. A
//!     guarded push is a call which, once the method is rewritten, leaves an externally supplied
//!     value on the stack. If such a call consumes a value from the unsafe region, its rewrite
//!     can't be proven correct and the method is rejected.
//!
//!   * a backward scan ([`argument_producers`]) finding which instructions pushed each argument of
//!     a call, along with the matching forward scan ([`value_consumer`]).
//!
//! ### Simple example
//!
//! ```
//! use ilstack::analysis::{validate_push_methods, Settings};
//! use ilstack::cil::parse_listing;
//!
//! # fn validate() -> Result<(), ilstack::Error> {
//! let methods = parse_listing(
//!     r#"
//!     .method Example::Unsafe
//!         ldarg.0
//!         ldarg.1
//!         call void InlineIL.IL::Push<int32>(!!0)
//!         call void InlineIL.IL::Push<int32>(!!0)
//!         ret
//!     .end
//!     "#,
//! )?;
//!
//! let err = validate_push_methods(&methods[0], &Settings::default()).unwrap_err();
//! assert_eq!(
//!     err.diagnostic(&methods[0]),
//!     "Example::Unsafe IL_0007: IL.Push cannot be used in this context, as the IL layout makes \
//!      it unsafe to process. You may be able to make the IL layout safe by using IL.EnsureLocal.",
//! );
//! # Ok(())
//! # }
//! # validate().unwrap();
//! ```

mod arguments;
mod errors;
mod push_validator;
mod settings;
mod stack_effect;
mod stack_state;

pub use arguments::*;
pub use errors::*;
pub use push_validator::*;
pub use settings::*;
pub use stack_effect::*;
pub use stack_state::*;
