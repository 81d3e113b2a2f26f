use super::errors::short_type_name;
use crate::cil::{Code, Instruction, MethodRef};

/// Which calls are guarded pushes, and how rejected ones are reported
#[derive(Debug, Clone)]
pub struct Settings {
    /// Full name of the type declaring the guarded push methods
    pub push_type: String,

    /// Name of the method pushing a plain value (eg. `Push`)
    pub push_method: String,

    /// Name of the method pushing a value by reference (eg. `PushInRef`)
    pub push_in_ref_method: String,

    /// Name of the method pushing a value as an output reference (eg. `PushOutRef`)
    pub push_out_ref_method: String,

    /// Method suggested when a plain push is rejected
    ///
    /// Loading the value into a local first gives the push a stable producer.
    pub ensure_local_method: String,

    /// Treat the exception object on the stack at the start of a `catch` handler or filter as
    /// unsafe to push
    ///
    /// When this is off, handlers are entered with one safe value on the stack.
    pub taint_exception_object: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            push_type: String::from("InlineIL.IL"),
            push_method: String::from("Push"),
            push_in_ref_method: String::from("PushInRef"),
            push_out_ref_method: String::from("PushOutRef"),
            ensure_local_method: String::from("EnsureLocal"),
            taint_exception_object: true,
        }
    }
}

/// Which of the guarded push methods is called
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PushMethodKind {
    Push,
    PushInRef,
    PushOutRef,
}

/// A call to one of the guarded push methods
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PushMethod<'a> {
    pub kind: PushMethodKind,
    pub method: &'a MethodRef,
}

impl Settings {
    /// If the instruction is a (non-virtual) call to a guarded push method, identify it
    pub fn recognize<'a>(&self, instruction: &'a Instruction) -> Option<PushMethod<'a>> {
        if instruction.code != Code::Call {
            return None;
        }
        let method = instruction.method()?;
        if method.declaring_type != self.push_type {
            return None;
        }

        let kind = if method.name == self.push_method {
            PushMethodKind::Push
        } else if method.name == self.push_in_ref_method {
            PushMethodKind::PushInRef
        } else if method.name == self.push_out_ref_method {
            PushMethodKind::PushOutRef
        } else {
            return None;
        };
        Some(PushMethod { kind, method })
    }

    /// Suggestion to attach to a rejected push
    ///
    /// Only the generic by-value form `void Push(!!0)` gets one.
    pub fn remediation_hint(&self, push: &PushMethod) -> Option<String> {
        let signature = &push.method.signature;
        let by_value = match signature.parameters.as_slice() {
            [parameter] => !parameter.ends_with('&'),
            _ => false,
        };
        if push.kind != PushMethodKind::Push || !by_value || signature.returns_value() {
            return None;
        }
        Some(format!(
            "You may be able to make the IL layout safe by using {}.{}.",
            short_type_name(&self.push_type),
            self.ensure_local_method
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::{Operand, Signature};

    fn call(code: Code, declaring_type: &str, name: &str, parameter: &str) -> Instruction {
        Instruction::new(
            code,
            Operand::Method(MethodRef::new(
                declaring_type,
                name,
                Signature::new(vec![String::from(parameter)], None),
            )),
        )
    }

    #[test]
    fn recognizes_push_methods() {
        let settings = Settings::default();

        let push = call(Code::Call, "InlineIL.IL", "Push", "!!0");
        assert_eq!(
            settings.recognize(&push).map(|push| push.kind),
            Some(PushMethodKind::Push)
        );

        let push_in_ref = call(Code::Call, "InlineIL.IL", "PushInRef", "!!0&");
        assert_eq!(
            settings.recognize(&push_in_ref).map(|push| push.kind),
            Some(PushMethodKind::PushInRef)
        );

        let push_out_ref = call(Code::Call, "InlineIL.IL", "PushOutRef", "!!0&");
        assert_eq!(
            settings.recognize(&push_out_ref).map(|push| push.kind),
            Some(PushMethodKind::PushOutRef)
        );
    }

    #[test]
    fn ignores_other_calls() {
        let settings = Settings::default();
        let candidates = [
            call(Code::Callvirt, "InlineIL.IL", "Push", "!!0"),
            call(Code::Call, "InlineIL.IL", "Emit", "!!0"),
            call(Code::Call, "Other.IL", "Push", "!!0"),
            Instruction::new(Code::Ldarg0, Operand::None),
        ];
        for candidate in &candidates {
            assert!(settings.recognize(candidate).is_none(), "{}", candidate);
        }
    }

    #[test]
    fn hints() {
        let settings = Settings::default();

        let push = call(Code::Call, "InlineIL.IL", "Push", "!!0");
        let push = settings.recognize(&push).unwrap();
        assert_eq!(
            settings.remediation_hint(&push).as_deref(),
            Some("You may be able to make the IL layout safe by using IL.EnsureLocal.")
        );

        let push_in_ref = call(Code::Call, "InlineIL.IL", "PushInRef", "!!0&");
        let push_in_ref = settings.recognize(&push_in_ref).unwrap();
        assert_eq!(settings.remediation_hint(&push_in_ref), None);

        let push_ref = call(Code::Call, "InlineIL.IL", "Push", "!!0&");
        let push_ref = settings.recognize(&push_ref).unwrap();
        assert_eq!(settings.remediation_hint(&push_ref), None);
    }
}
