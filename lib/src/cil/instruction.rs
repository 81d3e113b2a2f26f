use super::{Code, MethodRef, OpCode, Signature};
use crate::util::Width;
use std::fmt;

/// Identity of an instruction inside a [`super::MethodBody`]
///
/// This is the index of the instruction in the body. Two instructions can be structurally
/// identical (eg. two `ldc.i4.0`) while being at different positions, so all the analysis tables
/// are keyed on this rather than on the instruction itself.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct InstructionId(pub(crate) usize);

impl InstructionId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for InstructionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("#{}", self.0))
    }
}

/// Operand of an instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    None,
    Int8(i8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Variable(u16),
    Argument(u16),

    /// Branch target (`None` if the encoded target isn't the start of any instruction)
    Target(Option<InstructionId>),

    /// Targets of a `switch`
    Switch(Vec<Option<InstructionId>>),

    Method(MethodRef),

    /// Call site signature of a `calli`
    Signature(Signature),

    /// Unresolved metadata token (fields, types, strings)
    Token(u32),

    /// Field or type operand spelled out by name
    Symbol(String),

    String(String),
}

/// An instruction in a method body
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub code: Code,
    pub operand: Operand,

    /// Byte offset from the start of the method body
    pub offset: u32,
}

impl Instruction {
    pub fn new(code: Code, operand: Operand) -> Instruction {
        Instruction {
            code,
            operand,
            offset: 0,
        }
    }

    pub fn op_code(&self) -> OpCode {
        self.code.op_code()
    }

    pub fn is_nop(&self) -> bool {
        self.code == Code::Nop
    }

    /// Method referenced by the operand, if any
    pub fn method(&self) -> Option<&MethodRef> {
        match &self.operand {
            Operand::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Signature of the callee (for `call`, `callvirt`, `newobj`, `jmp`) or call site (for
    /// `calli`)
    pub fn signature(&self) -> Option<&Signature> {
        match &self.operand {
            Operand::Method(method) => Some(&method.signature),
            Operand::Signature(signature) => Some(signature),
            _ => None,
        }
    }

    /// Branch targets encoded in the operand
    ///
    /// This is empty for non-branching instructions. Targets which didn't resolve are included as
    /// `None`.
    pub fn branch_targets(&self) -> &[Option<InstructionId>] {
        match &self.operand {
            Operand::Target(target) => std::slice::from_ref(target),
            Operand::Switch(targets) => targets,
            _ => &[],
        }
    }
}

impl Width for Instruction {
    fn width(&self) -> usize {
        let op_code = self.op_code();
        let operand_width = match op_code.operand_type.fixed_width() {
            Some(width) => width,
            None => match &self.operand {
                Operand::Switch(targets) => 4 + 4 * targets.len(),
                _ => 4,
            },
        };
        op_code.size() + operand_width
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.code)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Int8(i) => write!(f, " {}", i),
            Operand::Int32(i) => write!(f, " {}", i),
            Operand::Int64(i) => write!(f, " {}", i),
            Operand::Float32(x) => write!(f, " {}", x),
            Operand::Float64(x) => write!(f, " {}", x),
            Operand::Variable(v) | Operand::Argument(v) => write!(f, " {}", v),
            Operand::Target(target) => write!(f, " {}", render_target(target)),
            Operand::Switch(targets) => {
                let targets: Vec<String> = targets.iter().map(render_target).collect();
                write!(f, " ({})", targets.join(", "))
            }
            Operand::Method(method) => {
                if method.signature.has_implicit_receiver() {
                    f.write_str(" instance")?;
                }
                write!(f, " {}", method.full_name())
            }
            Operand::Signature(signature) => write!(f, " {}", signature),
            Operand::Token(token) => write!(f, " 0x{:08x}", token),
            Operand::Symbol(symbol) => write!(f, " {}", symbol),
            Operand::String(string) => write!(f, " {:?}", string),
        }
    }
}

fn render_target(target: &Option<InstructionId>) -> String {
    match target {
        Some(id) => format!("{:?}", id),
        None => String::from("<invalid>"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instruction_widths() {
        assert_eq!(Instruction::new(Code::Nop, Operand::None).width(), 1);
        assert_eq!(Instruction::new(Code::LdcI4S, Operand::Int8(3)).width(), 2);
        assert_eq!(Instruction::new(Code::Br, Operand::Target(None)).width(), 5);
        assert_eq!(Instruction::new(Code::Ldloc, Operand::Variable(300)).width(), 4);
        assert_eq!(Instruction::new(Code::Ceq, Operand::None).width(), 2);
        assert_eq!(
            Instruction::new(Code::Switch, Operand::Switch(vec![None, None, None])).width(),
            17
        );
    }

    #[test]
    fn branch_targets() {
        let br = Instruction::new(Code::BrS, Operand::Target(Some(InstructionId(4))));
        assert_eq!(br.branch_targets(), &[Some(InstructionId(4))]);

        let switch = Instruction::new(
            Code::Switch,
            Operand::Switch(vec![Some(InstructionId(1)), None]),
        );
        assert_eq!(switch.branch_targets(), &[Some(InstructionId(1)), None]);

        let add = Instruction::new(Code::Add, Operand::None);
        assert!(add.branch_targets().is_empty());
    }
}
