use super::{Error, PendingState, Settings, StackEffect, StackState};
use crate::cil::{FlowControl, HandlerKind, Instruction, InstructionId, MethodBody};
use std::collections::HashMap;

/// Check that no guarded push in the method consumes a value which is unsafe to push
///
/// Methods without any guarded push are accepted without being analysed.
pub fn validate_push_methods(body: &MethodBody, settings: &Settings) -> Result<(), Error> {
    let has_push = body
        .iter()
        .any(|(_, instruction)| settings.recognize(instruction).is_some());
    if !has_push {
        log::debug!("{}: no push calls, skipping", body.name);
        return Ok(());
    }

    analyze_stack(body, settings)?;
    Ok(())
}

/// Run the stack analysis over the whole method
///
/// The analysis is a single forward pass. States propagated to branch targets which have not yet
/// been visited are recorded and merged in once the pass reaches them. Targets which were already
/// visited (loop heads) are not revisited.
pub fn analyze_stack(body: &MethodBody, settings: &Settings) -> Result<StackStates, Error> {
    log::debug!("{}: analysing {} instructions", body.name, body.len());

    let mut analysis = StackAnalysis::new(body, settings);
    analysis.seed_exception_handlers();
    for (id, instruction) in body.iter() {
        analysis.step(id, instruction)?;
    }

    Ok(StackStates {
        states: analysis.entry_states,
    })
}

/// State of the stack on entry to every instruction in a method body
#[derive(Debug, Clone, PartialEq)]
pub struct StackStates {
    states: Vec<StackState>,
}

impl StackStates {
    pub fn get(&self, id: InstructionId) -> Option<StackState> {
        self.states.get(id.index()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstructionId, StackState)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(idx, state)| (InstructionId(idx), *state))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

struct StackAnalysis<'a> {
    body: &'a MethodBody,
    settings: &'a Settings,

    /// States recorded for instructions reached by a branch or as an exception handler entry
    branch_states: HashMap<InstructionId, PendingState>,

    /// State flowing into the next instruction
    state: StackState,

    entry_states: Vec<StackState>,
}

impl<'a> StackAnalysis<'a> {
    fn new(body: &'a MethodBody, settings: &'a Settings) -> StackAnalysis<'a> {
        StackAnalysis {
            body,
            settings,
            branch_states: HashMap::new(),
            state: StackState::EMPTY,
            entry_states: Vec::with_capacity(body.len()),
        }
    }

    /// Record the entry states of `catch` handlers and of filters
    ///
    /// `finally` and `fault` handlers are entered with an empty stack, so they need no entry.
    fn seed_exception_handlers(&mut self) {
        let entry_state = if self.settings.taint_exception_object {
            PendingState::TAINTED_EXCEPTION_HANDLER
        } else {
            PendingState::EXCEPTION_HANDLER
        };

        for handler in &self.body.exception_handlers {
            let entries = match handler.kind {
                HandlerKind::Catch => [handler.handler_start, None],
                HandlerKind::Filter => [handler.handler_start, handler.filter_start],
                HandlerKind::Finally | HandlerKind::Fault => continue,
            };
            for entry in entries.into_iter().flatten() {
                self.branch_states.insert(entry, entry_state);
            }
        }
    }

    fn step(&mut self, id: InstructionId, instruction: &Instruction) -> Result<(), Error> {
        if let Some(pending) = self.branch_states.get(&id) {
            self.state = self.state.merge(*pending);
        }
        let before = self.state;
        self.entry_states.push(before);

        let push = self.settings.recognize(instruction);
        let effect = StackEffect::simulated(id, instruction, before.stack_size())?;

        // Popping more than is on the stack only happens in unreachable or malformed code, and
        // necessarily reaches into the unsafe region
        let (after_pop, consumes_unsafe) = match before.stack_size().checked_sub(effect.pops) {
            Some(after_pop) => (after_pop, after_pop < before.unsafe_to_push()),
            None => (0, true),
        };
        let stack_size = after_pop + effect.pushes;

        if consumes_unsafe {
            if let Some(push) = &push {
                return Err(Error::UnsafePush {
                    instruction: id,
                    method: push.method.clone(),
                    hint: self.settings.remediation_hint(push),
                });
            }
        }

        let unsafe_to_push = if consumes_unsafe || push.is_some() {
            stack_size
        } else {
            before.unsafe_to_push()
        };
        self.state = StackState::new(stack_size, unsafe_to_push);
        log::trace!("{}: {} -> {}", instruction, before, self.state);

        for target in instruction.branch_targets() {
            match target {
                Some(target) if self.body.contains(*target) => self.propagate(*target),
                _ => log::warn!(
                    "{}: ignoring unresolved branch target of {}",
                    self.body.name,
                    instruction
                ),
            }
        }

        match instruction.op_code().flow_control {
            FlowControl::Branch | FlowControl::Throw | FlowControl::Return => {
                self.state = StackState::EMPTY;
            }
            _ => (),
        }

        Ok(())
    }

    /// Record the current state as flowing into a branch target
    fn propagate(&mut self, target: InstructionId) {
        let pending = match self.branch_states.get(&target) {
            Some(entry) => entry.absorb(self.state),
            None => PendingState::Merged(self.state),
        };
        self.branch_states.insert(target, pending);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::{Code, LabelGenerator, MethodBodyBuilder, MethodRef, Signature};

    fn push_method() -> MethodRef {
        MethodRef::new(
            "InlineIL.IL",
            "Push",
            Signature::new(vec![String::from("!!0")], None),
        )
    }

    fn states(body: &MethodBody) -> Vec<(usize, usize)> {
        analyze_stack(body, &Settings::default())
            .unwrap()
            .iter()
            .map(|(_, state)| (state.stack_size(), state.unsafe_to_push()))
            .collect()
    }

    #[test]
    fn straight_line() {
        let mut builder = MethodBodyBuilder::new("test");
        builder.emit(Code::Ldarg0);
        builder.emit(Code::Dup);
        builder.emit(Code::Add);
        builder.emit(Code::Pop);
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        assert_eq!(states(&body), vec![(0, 0), (1, 0), (2, 0), (1, 0), (0, 0)]);
    }

    #[test]
    fn push_taints_what_it_lands_on() {
        // ldarg.0; ldarg.1; call Push; ldarg.2; add; ret
        let mut builder = MethodBodyBuilder::new("test");
        builder.emit(Code::Ldarg0);
        builder.emit(Code::Ldarg1);
        builder.emit_call(Code::Call, push_method());
        builder.emit(Code::Ldarg2);
        builder.emit(Code::Add);
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        assert_eq!(
            states(&body),
            vec![(0, 0), (1, 0), (2, 0), (1, 1), (2, 1), (1, 1)]
        );
    }

    #[test]
    fn second_push_into_tainted_region() {
        let mut builder = MethodBodyBuilder::new("test");
        builder.emit(Code::Ldarg0);
        builder.emit_call(Code::Call, push_method());
        let second = builder.emit_call(Code::Call, push_method());
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        // The first push leaves nothing on the stack for the second one to consume
        let err = validate_push_methods(&body, &Settings::default()).unwrap_err();
        assert_eq!(err.instruction(), second);
        assert!(matches!(err, Error::UnsafePush { hint: Some(_), .. }));
    }

    #[test]
    fn push_consuming_a_tainted_value() {
        // ldarg.0; ldarg.1; call Push (taints 1 slot); call Push (consumes it)
        let mut builder = MethodBodyBuilder::new("test");
        builder.emit(Code::Ldarg0);
        builder.emit(Code::Ldarg1);
        builder.emit_call(Code::Call, push_method());
        let second = builder.emit_call(Code::Call, push_method());
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        let err = validate_push_methods(&body, &Settings::default()).unwrap_err();
        assert_eq!(err.instruction(), second);
        assert_eq!(
            err.message(),
            "IL.Push cannot be used in this context, as the IL layout makes it unsafe to process. \
             You may be able to make the IL layout safe by using IL.EnsureLocal."
        );
    }

    #[test]
    fn no_push_means_no_analysis() {
        // The call has no method operand, so its stack effect can't be known
        let mut builder = MethodBodyBuilder::new("test");
        builder.emit_with(Code::Call, crate::cil::Operand::Token(0x0A00_0001));
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        assert_eq!(validate_push_methods(&body, &Settings::default()), Ok(()));
        assert!(matches!(
            analyze_stack(&body, &Settings::default()),
            Err(Error::UnrecognizedStackBehaviour { .. })
        ));
    }

    #[test]
    fn branches_reset_fall_through() {
        let mut builder = MethodBodyBuilder::new("test");
        let target = builder.fresh_label();
        builder.emit(Code::Ldarg0);
        builder.emit_branch(Code::Br, target);
        builder.emit(Code::Ldarg1); // unreachable
        builder.emit(Code::Pop);
        builder.place_label(target).unwrap();
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        assert_eq!(states(&body), vec![(0, 0), (1, 0), (0, 0), (1, 0), (1, 0)]);
    }

    #[test]
    fn join_keeps_max_taint() {
        // Both paths reach `join` with two values, but only one has a tainted slot
        let mut builder = MethodBodyBuilder::new("test");
        let else_branch = builder.fresh_label();
        let join = builder.fresh_label();
        builder.emit(Code::Ldarg0);
        builder.emit(Code::Ldarg1);
        builder.emit_branch(Code::Brtrue, else_branch);
        builder.emit(Code::Ldarg2);
        builder.emit_call(Code::Call, push_method());
        builder.emit(Code::Ldarg3);
        builder.emit_branch(Code::Br, join);
        builder.place_label(else_branch).unwrap();
        builder.emit(Code::Ldarg2);
        builder.place_label(join).unwrap();
        let add = builder.emit(Code::Add);
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        let states = analyze_stack(&body, &Settings::default()).unwrap();
        assert_eq!(states.get(add), Some(StackState::new(2, 1)));
    }

    #[test]
    fn switch_targets_all_get_the_state() {
        let mut builder = MethodBodyBuilder::new("test");
        let a = builder.fresh_label();
        let b = builder.fresh_label();
        builder.emit(Code::Ldarg0);
        builder.emit(Code::Ldarg1);
        builder.emit_switch(vec![a, b]);
        builder.emit(Code::Ret);
        builder.place_label(a).unwrap();
        let a_insn = builder.emit(Code::Ret);
        builder.place_label(b).unwrap();
        let b_insn = builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        let states = analyze_stack(&body, &Settings::default()).unwrap();
        assert_eq!(states.get(a_insn), Some(StackState::new(1, 0)));
        assert_eq!(states.get(b_insn), Some(StackState::new(1, 0)));
    }

    #[test]
    fn catch_handler_entry() {
        let mut builder = MethodBodyBuilder::new("test");
        let handler = builder.fresh_label();
        let end = builder.fresh_label();
        builder.emit(Code::Nop);
        builder.emit_branch(Code::LeaveS, end);
        builder.place_label(handler).unwrap();
        let push = builder.emit_call(Code::Call, push_method());
        builder.emit_branch(Code::LeaveS, end);
        builder.place_label(end).unwrap();
        builder.emit(Code::Ret);
        builder.add_handler(HandlerKind::Catch, handler, None);
        let body = builder.finish().unwrap();

        let err = validate_push_methods(&body, &Settings::default()).unwrap_err();
        assert_eq!(err.instruction(), push);

        let trusting = Settings {
            taint_exception_object: false,
            ..Settings::default()
        };
        assert_eq!(validate_push_methods(&body, &trusting), Ok(()));
    }

    #[test]
    fn finally_handlers_start_empty() {
        let mut builder = MethodBodyBuilder::new("test");
        let handler = builder.fresh_label();
        let end = builder.fresh_label();
        builder.emit(Code::Nop);
        builder.emit_branch(Code::LeaveS, end);
        builder.place_label(handler).unwrap();
        let first = builder.emit(Code::Nop);
        builder.emit(Code::Endfinally);
        builder.place_label(end).unwrap();
        builder.emit(Code::Ret);
        builder.add_handler(HandlerKind::Finally, handler, None);
        let body = builder.finish().unwrap();

        let states = analyze_stack(&body, &Settings::default()).unwrap();
        assert_eq!(states.get(first), Some(StackState::EMPTY));
    }

    #[test]
    fn while_loop_in_one_pass() {
        //     ldc.i4.0; stloc.0; br cond
        // body:
        //     ldloc.0; call Push; ldloc.0; ldc.i4.1; add; stloc.0
        // cond:
        //     ldloc.0; ldc.i4.s 10; blt body
        //     ret
        let mut builder = MethodBodyBuilder::new("test");
        let body_label = builder.fresh_label();
        let cond = builder.fresh_label();
        builder.emit(Code::LdcI4_0);
        builder.emit(Code::Stloc0);
        builder.emit_branch(Code::Br, cond);
        builder.place_label(body_label).unwrap();
        let head = builder.emit(Code::Ldloc0);
        builder.emit_call(Code::Call, push_method());
        builder.emit(Code::Ldloc0);
        builder.emit(Code::LdcI4_1);
        builder.emit(Code::Add);
        builder.emit(Code::Stloc0);
        builder.place_label(cond).unwrap();
        let cond_insn = builder.emit(Code::Ldloc0);
        builder.emit_with(Code::LdcI4S, crate::cil::Operand::Int8(10));
        let back_edge = builder.emit_branch(Code::Blt, body_label);
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        let settings = Settings::default();
        assert_eq!(validate_push_methods(&body, &settings), Ok(()));

        let states = analyze_stack(&body, &settings).unwrap();
        let head_state = states.get(head).unwrap();
        assert_eq!(head_state, StackState::EMPTY);
        assert_eq!(states.get(cond_insn), Some(StackState::EMPTY));

        // `blt` pops both operands. Merging what flows around the back edge into the loop head
        // changes nothing, so revisiting the loop would compute the same states.
        let back_edge_entry = states.get(back_edge).unwrap();
        let back_edge_exit = StackState::new(
            back_edge_entry.stack_size() - 2,
            back_edge_entry.unsafe_to_push(),
        );
        assert_eq!(
            head_state.merge(PendingState::Merged(back_edge_exit)),
            head_state
        );
    }

    #[test]
    fn unresolved_targets_are_ignored() {
        let mut builder = MethodBodyBuilder::new("test");
        builder.emit(Code::Ldarg0);
        builder.emit_with(Code::Brtrue, crate::cil::Operand::Target(None));
        builder.emit(Code::Ldarg1);
        builder.emit_with(
            Code::Switch,
            crate::cil::Operand::Switch(vec![Some(InstructionId(99))]),
        );
        builder.emit(Code::Ret);
        let body = builder.finish().unwrap();

        assert_eq!(states(&body), vec![(0, 0), (1, 0), (0, 0), (1, 0), (0, 0)]);
    }
}
