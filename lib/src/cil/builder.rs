use super::{
    Code, Error, ExceptionHandler, HandlerKind, Instruction, InstructionId, Label,
    LabelGenerator, MethodBody, MethodRef, Operand,
};
use std::collections::HashMap;

/// Builds method bodies one instruction at a time, top to bottom
///
/// Branches refer to [`Label`]s, which can be referenced before they are placed. A placed label
/// marks the next instruction to be emitted. Labels are resolved into [`InstructionId`]s when the
/// body is finished.
///
/// ```
/// use ilstack::cil::{Code, MethodBodyBuilder, LabelGenerator};
///
/// # fn build() -> Result<(), ilstack::cil::Error> {
/// let mut builder = MethodBodyBuilder::new("Example::Loop");
/// let head = builder.fresh_label();
/// builder.place_label(head)?;
/// builder.emit(Code::Ldarg0);
/// builder.emit_branch(Code::Brtrue, head);
/// builder.emit(Code::Ret);
/// let body = builder.finish()?;
/// assert_eq!(body.len(), 3);
/// # Ok(())
/// # }
/// # build().unwrap();
/// ```
pub struct MethodBodyBuilder {
    name: String,

    instructions: Vec<Instruction>,

    /// Labels placed so far, along with the index of the instruction they mark
    placed_labels: HashMap<Label, usize>,

    /// Branch instructions whose operands still need to be resolved
    branch_fixups: Vec<(InstructionId, BranchLabels)>,

    /// Exception handlers, as labels (handler start and optional filter start)
    handlers: Vec<(HandlerKind, Label, Option<Label>)>,

    next_label: Label,
}

enum BranchLabels {
    Single(Label),
    Switch(Vec<Label>),
}

impl MethodBodyBuilder {
    pub fn new(name: impl Into<String>) -> MethodBodyBuilder {
        MethodBodyBuilder {
            name: name.into(),
            instructions: vec![],
            placed_labels: HashMap::new(),
            branch_fixups: vec![],
            handlers: vec![],
            next_label: Label::FIRST,
        }
    }

    /// Mark the next emitted instruction with this label
    pub fn place_label(&mut self, label: Label) -> Result<(), Error> {
        if self
            .placed_labels
            .insert(label, self.instructions.len())
            .is_some()
        {
            return Err(Error::DuplicateLabel(label));
        }
        Ok(())
    }

    /// Emit an instruction without an operand
    pub fn emit(&mut self, code: Code) -> InstructionId {
        self.emit_with(code, Operand::None)
    }

    pub fn emit_with(&mut self, code: Code, operand: Operand) -> InstructionId {
        let id = InstructionId(self.instructions.len());
        self.instructions.push(Instruction::new(code, operand));
        id
    }

    pub fn emit_call(&mut self, code: Code, method: MethodRef) -> InstructionId {
        self.emit_with(code, Operand::Method(method))
    }

    /// Emit a (conditional or unconditional) branch to a label
    pub fn emit_branch(&mut self, code: Code, target: Label) -> InstructionId {
        let id = self.emit_with(code, Operand::Target(None));
        self.branch_fixups.push((id, BranchLabels::Single(target)));
        id
    }

    pub fn emit_switch(&mut self, targets: Vec<Label>) -> InstructionId {
        let id = self.emit_with(Code::Switch, Operand::Switch(vec![None; targets.len()]));
        self.branch_fixups.push((id, BranchLabels::Switch(targets)));
        id
    }

    /// Register an exception handler entered at `handler_start` (and `filter_start`, for filters)
    pub fn add_handler(
        &mut self,
        kind: HandlerKind,
        handler_start: Label,
        filter_start: Option<Label>,
    ) {
        self.handlers.push((kind, handler_start, filter_start));
    }

    /// Resolve all labels and produce the method body
    pub fn finish(self) -> Result<MethodBody, Error> {
        let MethodBodyBuilder {
            name,
            mut instructions,
            placed_labels,
            branch_fixups,
            handlers,
            ..
        } = self;
        let instruction_count = instructions.len();

        let resolve = |label: &Label| -> Result<InstructionId, Error> {
            match placed_labels.get(label) {
                Some(idx) if *idx < instruction_count => Ok(InstructionId(*idx)),
                _ => Err(Error::UnplacedLabel(*label)),
            }
        };

        for (id, labels) in branch_fixups {
            let operand = match labels {
                BranchLabels::Single(label) => Operand::Target(Some(resolve(&label)?)),
                BranchLabels::Switch(labels) => Operand::Switch(
                    labels
                        .iter()
                        .map(|label| resolve(label).map(Some))
                        .collect::<Result<_, _>>()?,
                ),
            };
            instructions[id.0].operand = operand;
        }

        let exception_handlers = handlers
            .iter()
            .map(|(kind, handler_start, filter_start)| -> Result<ExceptionHandler, Error> {
                let mut handler = ExceptionHandler::new(*kind, resolve(handler_start)?);
                handler.filter_start = filter_start.as_ref().map(resolve).transpose()?;
                Ok(handler)
            })
            .collect::<Result<_, Error>>()?;

        Ok(MethodBody::new(name, instructions, exception_handlers))
    }
}

impl LabelGenerator for MethodBodyBuilder {
    fn fresh_label(&mut self) -> Label {
        let label = self.next_label;
        self.next_label = label.successor();
        label
    }
}
