use crate::cil::{Code, InstructionId, MethodBody, MethodRef, StackBehaviour};
use std::fmt;

/// Failures of the stack analyses
///
/// Every error is attributed to an instruction of the method body being analysed.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Stack effect of the instruction isn't known
    UnrecognizedStackBehaviour {
        instruction: InstructionId,
        code: Code,
        behaviour: StackBehaviour,
    },

    /// A guarded push consumes a value which is unsafe to push
    UnsafePush {
        instruction: InstructionId,
        method: MethodRef,

        /// Suggestion for how to fix the method
        hint: Option<String>,
    },

    /// The producer of one of the arguments to a call could not be located
    ArgumentScan {
        call: InstructionId,
        kind: ArgumentScanErrorKind,
    },

    /// Expected a call instruction
    NotACall(InstructionId),

    /// Scanning forward from the instruction ran off the end of the method
    UnexpectedEndOfMethod(InstructionId),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ArgumentScanErrorKind {
    /// The backward scan found an instruction pushing more than what was left to consume
    UnexpectedStackShape,

    /// The backward scan reached the start of the method
    ProducerNotFound,
}

impl Error {
    /// Instruction to which the error is attributed
    pub fn instruction(&self) -> InstructionId {
        match self {
            Error::UnrecognizedStackBehaviour { instruction, .. }
            | Error::UnsafePush { instruction, .. } => *instruction,
            Error::ArgumentScan { call, .. } => *call,
            Error::NotACall(instruction) | Error::UnexpectedEndOfMethod(instruction) => {
                *instruction
            }
        }
    }

    /// Human readable description of the error
    pub fn message(&self) -> String {
        match self {
            Error::UnrecognizedStackBehaviour { code, behaviour, .. } => {
                format!("Unrecognized stack behaviour {:?} for {}", behaviour, code)
            }
            Error::UnsafePush { method, hint, .. } => {
                let mut message = format!(
                    "{}.{} cannot be used in this context, as the IL layout makes it unsafe to process.",
                    short_type_name(&method.declaring_type),
                    method.name
                );
                if let Some(hint) = hint {
                    message.push(' ');
                    message.push_str(hint);
                }
                message
            }
            Error::ArgumentScan {
                kind: ArgumentScanErrorKind::UnexpectedStackShape,
                ..
            } => String::from("Unexpected stack behavior"),
            Error::ArgumentScan {
                kind: ArgumentScanErrorKind::ProducerNotFound,
                ..
            } => String::from("Could not locate call argument"),
            Error::NotACall(_) => String::from("Expected a call instruction"),
            Error::UnexpectedEndOfMethod(_) => String::from("Unexpected end of method"),
        }
    }

    /// Render the error as a diagnostic pointing at the instruction in its method
    ///
    /// For example: `Example::Guarded IL_0004: Unexpected end of method`
    pub fn diagnostic(&self, body: &MethodBody) -> String {
        match body.offset_of(self.instruction()) {
            Some(offset) => format!("{} IL_{:04x}: {}", body.name, offset, self.message()),
            None => format!("{}: {}", body.name, self.message()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Last component of a namespace-qualified type name (eg. `IL` for `InlineIL.IL`)
pub(crate) fn short_type_name(full_name: &str) -> &str {
    full_name
        .rsplit(|c| c == '.' || c == '/')
        .next()
        .unwrap_or(full_name)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::Signature;

    #[test]
    fn unsafe_push_message() {
        let err = Error::UnsafePush {
            instruction: InstructionId(0),
            method: MethodRef::new(
                "InlineIL.IL",
                "PushInRef",
                Signature::new(vec![String::from("!!0&")], None),
            ),
            hint: None,
        };
        assert_eq!(
            err.message(),
            "IL.PushInRef cannot be used in this context, as the IL layout makes it unsafe to process."
        );
    }

    #[test]
    fn short_type_names() {
        assert_eq!(short_type_name("InlineIL.IL"), "IL");
        assert_eq!(short_type_name("Outer/Inner"), "Inner");
        assert_eq!(short_type_name("IL"), "IL");
    }
}
