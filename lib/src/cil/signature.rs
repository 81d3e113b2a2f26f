use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Calling convention flags of a method signature
    ///
    /// Only the flags relevant to the shape of the evaluation stack are modelled.
    ///
    /// [0]: https://www.ecma-international.org/publications-and-standards/standards/ecma-335/ (II.23.2.1)
    pub struct CallingConvention: u8 {
        /// The method takes a `this` receiver
        const HAS_THIS = 0x20;

        /// The receiver is listed explicitly as the first parameter
        const EXPLICIT_THIS = 0x40;
    }
}

/// Signature of something callable: a method, or the target of a `calli`
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Signature {
    pub calling_convention: CallingConvention,

    /// Parameter types, rendered as in assembler listings (eg. `int32`, `!!0&`)
    pub parameters: Vec<String>,

    /// Return type (`None` if the method returns `void`)
    pub return_type: Option<String>,
}

impl Signature {
    /// Static signature
    pub fn new(parameters: Vec<String>, return_type: Option<String>) -> Signature {
        Signature {
            calling_convention: CallingConvention::empty(),
            parameters,
            return_type,
        }
    }

    /// Instance signature (with an implicit `this`)
    pub fn instance(parameters: Vec<String>, return_type: Option<String>) -> Signature {
        Signature {
            calling_convention: CallingConvention::HAS_THIS,
            parameters,
            return_type,
        }
    }

    /// Whether the caller must push a receiver which is not listed in `parameters`
    pub fn has_implicit_receiver(&self) -> bool {
        self.calling_convention.contains(CallingConvention::HAS_THIS)
            && !self
                .calling_convention
                .contains(CallingConvention::EXPLICIT_THIS)
    }

    pub fn returns_value(&self) -> bool {
        self.return_type.is_some()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.calling_convention.contains(CallingConvention::HAS_THIS) {
            f.write_str("instance ")?;
        }
        if self
            .calling_convention
            .contains(CallingConvention::EXPLICIT_THIS)
        {
            f.write_str("explicit ")?;
        }
        f.write_str(self.return_type.as_deref().unwrap_or("void"))?;
        write!(f, "({})", self.parameters.join(", "))
    }
}

/// Reference to a method, as found in the operand of a call
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MethodRef {
    /// Full name of the declaring type (eg. `System.Console`)
    pub declaring_type: String,

    /// Method name, without generic arguments (eg. `WriteLine`)
    pub name: String,

    pub signature: Signature,
}

impl MethodRef {
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        signature: Signature,
    ) -> MethodRef {
        MethodRef {
            declaring_type: declaring_type.into(),
            name: name.into(),
            signature,
        }
    }

    /// Full name, in the same format as assembler listings
    ///
    /// For example: `void InlineIL.IL::Push(!!0)`
    pub fn full_name(&self) -> String {
        format!(
            "{} {}::{}({})",
            self.signature.return_type.as_deref().unwrap_or("void"),
            self.declaring_type,
            self.name,
            self.signature.parameters.join(", "),
        )
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
