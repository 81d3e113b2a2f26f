use super::{Instruction, InstructionId};
use crate::util::Width;

/// Kind of exception handling clause
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HandlerKind {
    /// Typed `catch` clause (entered with the exception on the stack)
    Catch,

    /// Filtered clause (both the filter and the handler are entered with the exception on the
    /// stack)
    Filter,

    /// `finally` clause (entered with an empty stack)
    Finally,

    /// `fault` clause (entered with an empty stack)
    Fault,
}

/// Exception handling clause
///
/// Ends are exclusive: `try_end` is the first instruction _after_ the protected block, and is
/// `None` if the block runs to the end of the method.
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionHandler {
    pub kind: HandlerKind,
    pub try_start: Option<InstructionId>,
    pub try_end: Option<InstructionId>,
    pub handler_start: Option<InstructionId>,
    pub handler_end: Option<InstructionId>,

    /// Start of the filter block (only for [`HandlerKind::Filter`])
    pub filter_start: Option<InstructionId>,

    /// Type of exception caught, if known (only for [`HandlerKind::Catch`])
    pub catch_type: Option<String>,
}

impl ExceptionHandler {
    /// Handler clause with only its entry points filled in
    pub fn new(kind: HandlerKind, handler_start: InstructionId) -> ExceptionHandler {
        ExceptionHandler {
            kind,
            try_start: None,
            try_end: None,
            handler_start: Some(handler_start),
            handler_end: None,
            filter_start: None,
            catch_type: None,
        }
    }
}

/// Body of a single method: an ordered sequence of instructions plus its exception handlers
///
/// The body owns its instructions and hands out [`InstructionId`]s which stay valid for the
/// lifetime of the body (the sequence is never mutated once built).
#[derive(Clone, Debug, PartialEq)]
pub struct MethodBody {
    /// Name used in diagnostics
    pub name: String,

    instructions: Vec<Instruction>,

    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Make a body out of instructions, computing the instruction offsets
    pub fn new(
        name: impl Into<String>,
        instructions: Vec<Instruction>,
        exception_handlers: Vec<ExceptionHandler>,
    ) -> MethodBody {
        let mut body = MethodBody {
            name: name.into(),
            instructions,
            exception_handlers,
        };
        body.recompute_offsets();
        body
    }

    /// Make a body out of instructions whose offsets are already known (eg. decoded ones)
    pub(crate) fn with_offsets(
        name: impl Into<String>,
        instructions: Vec<Instruction>,
        exception_handlers: Vec<ExceptionHandler>,
    ) -> MethodBody {
        MethodBody {
            name: name.into(),
            instructions,
            exception_handlers,
        }
    }

    /// Recompute the offset of every instruction from the instruction widths
    pub fn recompute_offsets(&mut self) {
        let mut offset = 0;
        for instruction in &mut self.instructions {
            instruction.offset = offset as u32;
            offset += instruction.width();
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, id: InstructionId) -> Option<&Instruction> {
        self.instructions.get(id.0)
    }

    /// Does this ID refer to an instruction in this body?
    pub fn contains(&self, id: InstructionId) -> bool {
        id.0 < self.instructions.len()
    }

    /// Instructions along with their IDs, in order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (InstructionId, &Instruction)> + '_ {
        self.instructions
            .iter()
            .enumerate()
            .map(|(idx, instruction)| (InstructionId(idx), instruction))
    }

    pub fn previous(&self, id: InstructionId) -> Option<InstructionId> {
        if self.contains(id) {
            id.0.checked_sub(1).map(InstructionId)
        } else {
            None
        }
    }

    pub fn next(&self, id: InstructionId) -> Option<InstructionId> {
        let next = InstructionId(id.0 + 1);
        if self.contains(next) {
            Some(next)
        } else {
            None
        }
    }

    /// Previous instruction which isn't a `nop`
    pub fn previous_skip_nops(&self, id: InstructionId) -> Option<InstructionId> {
        let mut current = self.previous(id);
        while let Some(previous) = current {
            if !self.instructions[previous.0].is_nop() {
                break;
            }
            current = self.previous(previous);
        }
        current
    }

    /// Next instruction which isn't a `nop`
    pub fn next_skip_nops(&self, id: InstructionId) -> Option<InstructionId> {
        let mut current = self.next(id);
        while let Some(next) = current {
            if !self.instructions[next.0].is_nop() {
                break;
            }
            current = self.next(next);
        }
        current
    }

    /// Byte offset of an instruction (for diagnostics)
    pub fn offset_of(&self, id: InstructionId) -> Option<u32> {
        self.get(id).map(|instruction| instruction.offset)
    }

    /// Find the instruction starting at exactly this byte offset
    pub fn find_by_offset(&self, offset: u32) -> Option<InstructionId> {
        self.instructions
            .binary_search_by_key(&offset, |instruction| instruction.offset)
            .ok()
            .map(InstructionId)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::{Code, Operand};

    fn body(codes: &[Code]) -> MethodBody {
        MethodBody::new(
            "test",
            codes
                .iter()
                .map(|code| Instruction::new(*code, Operand::None))
                .collect(),
            vec![],
        )
    }

    #[test]
    fn offsets_follow_widths() {
        let body = body(&[Code::Nop, Code::Ceq, Code::LdcI4_0, Code::Ret]);
        let offsets: Vec<u32> = body.iter().map(|(_, insn)| insn.offset).collect();
        assert_eq!(offsets, vec![0, 1, 3, 4]);
        assert_eq!(body.find_by_offset(3), Some(InstructionId(2)));
        assert_eq!(body.find_by_offset(2), None);
    }

    #[test]
    fn navigation() {
        let body = body(&[Code::LdcI4_0, Code::Nop, Code::Nop, Code::Pop]);
        assert_eq!(body.previous(InstructionId(0)), None);
        assert_eq!(body.next(InstructionId(3)), None);
        assert_eq!(body.next(InstructionId(4)), None);
        assert_eq!(
            body.next_skip_nops(InstructionId(0)),
            Some(InstructionId(3))
        );
        assert_eq!(
            body.previous_skip_nops(InstructionId(3)),
            Some(InstructionId(0))
        );
        assert_eq!(body.previous_skip_nops(InstructionId(0)), None);
    }

    #[test]
    fn only_nops_before() {
        let body = body(&[Code::Nop, Code::Nop, Code::Ret]);
        assert_eq!(body.previous_skip_nops(InstructionId(2)), None);
        assert_eq!(body.next_skip_nops(InstructionId(0)), Some(InstructionId(2)));
    }
}
