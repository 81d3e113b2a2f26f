//! Locating the instructions which produce and consume stack values
//!
//! Both scans walk the instruction sequence linearly (ignoring branches), keeping track of how
//! many values are still outstanding. They are meant for straight-line sequences such as the
//! arguments of a call.

use super::{pop_count, ArgumentScanErrorKind, Error, StackEffect};
use crate::cil::{FlowControl, InstructionId, MethodBody};

/// Find the instructions which pushed the arguments of a call, first argument first
///
/// Nested expressions (calls, arithmetic, `dup`, ...) are skipped over as a whole, so the producer
/// of an argument is the instruction that completes the value, not one of its operands.
pub fn argument_producers(
    body: &MethodBody,
    call: InstructionId,
) -> Result<Vec<InstructionId>, Error> {
    let instruction = body.get(call).ok_or(Error::NotACall(call))?;
    if instruction.op_code().flow_control != FlowControl::Call {
        return Err(Error::NotACall(call));
    }

    let argument_count = pop_count(call, instruction)?;
    let mut producers = vec![call; argument_count];
    let mut cursor = body.previous(call);

    // Scan right-to-left: the last argument is the one on top of the stack
    for producer in producers.iter_mut().rev() {
        *producer = scan_for_producer(body, call, &mut cursor)?;
    }

    log::trace!("arguments of {:?} produced by {:?}", call, producers);
    Ok(producers)
}

/// Scan backwards from `cursor` for the producer of the next value, leaving `cursor` just before
/// the last instruction examined
fn scan_for_producer(
    body: &MethodBody,
    call: InstructionId,
    cursor: &mut Option<InstructionId>,
) -> Result<InstructionId, Error> {
    let scan_error = |kind| Error::ArgumentScan { call, kind };

    let mut producer = None;
    let mut stack_to_consume: isize = 1;

    while stack_to_consume > 0 {
        let current = cursor.ok_or_else(|| scan_error(ArgumentScanErrorKind::ProducerNotFound))?;
        let instruction = body
            .get(current)
            .ok_or_else(|| scan_error(ArgumentScanErrorKind::ProducerNotFound))?;
        let effect = StackEffect::of(current, instruction)?;

        stack_to_consume -= effect.pushes as isize;
        if stack_to_consume == 0 && producer.is_none() {
            producer = Some(current);
        }
        if stack_to_consume < 0 {
            return Err(scan_error(ArgumentScanErrorKind::UnexpectedStackShape));
        }
        stack_to_consume += effect.pops as isize;

        *cursor = body.previous(current);
    }

    producer.ok_or_else(|| scan_error(ArgumentScanErrorKind::ProducerNotFound))
}

/// Find the instruction which consumes the value pushed by `producer`
pub fn value_consumer(body: &MethodBody, producer: InstructionId) -> Result<InstructionId, Error> {
    let mut current = producer;
    let mut stack_size: isize = 0;

    loop {
        let instruction = body
            .get(current)
            .ok_or(Error::UnexpectedEndOfMethod(producer))?;
        stack_size += StackEffect::of(current, instruction)?.pushes as isize;

        current = body
            .next(current)
            .ok_or(Error::UnexpectedEndOfMethod(producer))?;
        let instruction = body
            .get(current)
            .ok_or(Error::UnexpectedEndOfMethod(producer))?;
        stack_size -= StackEffect::of(current, instruction)?.pops as isize;

        if stack_size <= 0 {
            return Ok(current);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::{Code, MethodBodyBuilder, MethodRef, Signature};

    fn method(parameters: usize, returns: bool) -> MethodRef {
        MethodRef::new(
            "Test",
            "Method",
            Signature::new(
                vec![String::from("int32"); parameters],
                returns.then(|| String::from("int32")),
            ),
        )
    }

    #[test]
    fn producers_with_nops() {
        let mut builder = MethodBodyBuilder::new("test");
        let a = builder.emit(Code::LdcI4_0);
        builder.emit(Code::Nop);
        let b = builder.emit(Code::LdcI4_1);
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::Nop);
        builder.emit(Code::Nop);
        builder.emit(Code::LdcI4_8);
        let c = builder.emit(Code::Add);
        let call = builder.emit_call(Code::Call, method(3, false));
        let body = builder.finish().unwrap();

        assert_eq!(argument_producers(&body, call).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn dup_is_a_producer() {
        let mut builder = MethodBodyBuilder::new("test");
        builder.emit(Code::Nop);
        let a = builder.emit(Code::LdcI4_0);
        builder.emit(Code::Nop);
        let b = builder.emit(Code::Dup);
        builder.emit(Code::Nop);
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::Nop);
        builder.emit(Code::Nop);
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::Nop);
        let c = builder.emit(Code::Add);
        let call = builder.emit_call(Code::Call, method(3, false));
        let body = builder.finish().unwrap();

        assert_eq!(argument_producers(&body, call).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn nested_calls_are_skipped() {
        let mut builder = MethodBodyBuilder::new("test");
        let a = builder.emit(Code::LdcI4_0);
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::Add);
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::Add);
        builder.emit(Code::Mul);
        let b = builder.emit_call(Code::Call, method(2, true));
        builder.emit(Code::LdcI4_8);
        builder.emit(Code::LdcI4_8);
        let c = builder.emit(Code::Add);
        let call = builder.emit_call(Code::Call, method(3, false));
        let body = builder.finish().unwrap();

        assert_eq!(argument_producers(&body, call).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn receivers_and_no_arguments() {
        let mut builder = MethodBodyBuilder::new("test");
        let receiver = builder.emit(Code::Ldarg0);
        let argument = builder.emit(Code::Ldarg1);
        let instance_call = builder.emit_call(
            Code::Callvirt,
            MethodRef::new(
                "Test",
                "Method",
                Signature::instance(vec![String::from("int32")], None),
            ),
        );
        let static_call = builder.emit_call(Code::Call, method(0, true));
        builder.emit(Code::Pop);
        let body = builder.finish().unwrap();

        assert_eq!(
            argument_producers(&body, instance_call).unwrap(),
            vec![receiver, argument]
        );
        assert_eq!(argument_producers(&body, static_call).unwrap(), vec![]);
    }

    #[test]
    fn scan_failures() {
        let mut builder = MethodBodyBuilder::new("test");
        let load = builder.emit(Code::LdcI4_0);
        let call = builder.emit_call(Code::Call, method(2, false));
        let body = builder.finish().unwrap();
        assert_eq!(
            argument_producers(&body, call),
            Err(Error::ArgumentScan {
                call,
                kind: ArgumentScanErrorKind::ProducerNotFound
            })
        );
        assert_eq!(argument_producers(&body, load), Err(Error::NotACall(load)));

        // the only value is popped before the call
        let mut builder = MethodBodyBuilder::new("test");
        builder.emit(Code::LdcI4_0);
        builder.emit(Code::Pop);
        let call = builder.emit_call(Code::Call, method(1, false));
        let body = builder.finish().unwrap();
        assert_eq!(
            argument_producers(&body, call),
            Err(Error::ArgumentScan {
                call,
                kind: ArgumentScanErrorKind::ProducerNotFound
            })
        );
    }

    #[test]
    fn consumers() {
        let mut builder = MethodBodyBuilder::new("test");
        let a = builder.emit(Code::LdcI4_0);
        let b = builder.emit(Code::LdcI4_1);
        builder.emit(Code::LdcI4_2);
        builder.emit(Code::Nop);
        let add = builder.emit(Code::Add);
        let call = builder.emit_call(Code::Call, method(2, false));
        let dangling = builder.emit(Code::LdcI4_3);
        let body = builder.finish().unwrap();

        assert_eq!(value_consumer(&body, a).unwrap(), call);
        assert_eq!(value_consumer(&body, b).unwrap(), add);
        assert_eq!(
            value_consumer(&body, dangling),
            Err(Error::UnexpectedEndOfMethod(dangling))
        );
    }
}
