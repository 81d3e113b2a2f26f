//! Number of values an instruction pops off and pushes onto the evaluation stack

use super::Error;
use crate::cil::{Code, FlowControl, Instruction, InstructionId, Signature, StackBehaviour};

/// Number of values popped by a call to something with this signature
///
/// This includes the receiver (unless the call is constructing it with `newobj`) and, for `calli`,
/// the function pointer.
pub fn argument_count(code: Code, signature: &Signature) -> usize {
    let mut count = signature.parameters.len();
    if signature.has_implicit_receiver() && code != Code::Newobj {
        count += 1;
    }
    if code == Code::Calli {
        count += 1;
    }
    count
}

/// Number of values the instruction pops
///
/// `dup` is counted as popping nothing (see [`push_count`]).
pub fn pop_count(id: InstructionId, instruction: &Instruction) -> Result<usize, Error> {
    let op_code = instruction.op_code();
    if op_code.flow_control == FlowControl::Call {
        let signature = call_signature(id, instruction, op_code.stack_pop)?;
        return Ok(argument_count(instruction.code, signature));
    }
    if instruction.code == Code::Dup {
        return Ok(0);
    }

    use StackBehaviour::*;
    match op_code.stack_pop {
        Pop0 => Ok(0),
        Pop1 | Popi | Popref => Ok(1),
        Pop1Pop1 | PopiPop1 | PopiPopi | PopiPopi8 | PopiPopr4 | PopiPopr8 | PoprefPop1
        | PoprefPopi => Ok(2),
        PopiPopiPopi | PoprefPopiPopi | PoprefPopiPopi8 | PoprefPopiPopr4 | PoprefPopiPopr8
        | PoprefPopiPopref => Ok(3),
        other => Err(unrecognized(id, instruction, other)),
    }
}

/// Number of values the instruction pushes
///
/// `dup` is counted as pushing just the copy.
pub fn push_count(id: InstructionId, instruction: &Instruction) -> Result<usize, Error> {
    let op_code = instruction.op_code();
    if op_code.flow_control == FlowControl::Call {
        let signature = call_signature(id, instruction, op_code.stack_push)?;
        let pushes = signature.returns_value() || instruction.code == Code::Newobj;
        return Ok(pushes as usize);
    }
    if instruction.code == Code::Dup {
        return Ok(1);
    }

    use StackBehaviour::*;
    match op_code.stack_push {
        Push0 => Ok(0),
        Push1 | Pushi | Pushi8 | Pushr4 | Pushr8 | Pushref => Ok(1),
        Push1Push1 => Ok(2),
        other => Err(unrecognized(id, instruction, other)),
    }
}

fn call_signature(
    id: InstructionId,
    instruction: &Instruction,
    behaviour: StackBehaviour,
) -> Result<&Signature, Error> {
    instruction
        .signature()
        .ok_or_else(|| unrecognized(id, instruction, behaviour))
}

fn unrecognized(id: InstructionId, instruction: &Instruction, behaviour: StackBehaviour) -> Error {
    Error::UnrecognizedStackBehaviour {
        instruction: id,
        code: instruction.code,
        behaviour,
    }
}

/// Values popped and then pushed by an instruction
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StackEffect {
    pub pops: usize,
    pub pushes: usize,
}

impl StackEffect {
    /// Effect used when scanning for the producers of values
    ///
    /// `dup` pops nothing and pushes one value, so it is the producer of the copy.
    pub fn of(id: InstructionId, instruction: &Instruction) -> Result<StackEffect, Error> {
        Ok(StackEffect {
            pops: pop_count(id, instruction)?,
            pushes: push_count(id, instruction)?,
        })
    }

    /// Effect used when simulating the stack, given its current size
    ///
    /// `dup` pops its operand and pushes it back twice. `ret` and the instructions which empty the
    /// stack (`leave`) pop everything.
    pub fn simulated(
        id: InstructionId,
        instruction: &Instruction,
        stack_size: usize,
    ) -> Result<StackEffect, Error> {
        if instruction.code == Code::Dup {
            return Ok(StackEffect { pops: 1, pushes: 2 });
        }
        if instruction.code == Code::Ret
            || instruction.op_code().stack_pop == StackBehaviour::PopAll
        {
            return Ok(StackEffect {
                pops: stack_size,
                pushes: push_count(id, instruction)?,
            });
        }
        StackEffect::of(id, instruction)
    }
}
