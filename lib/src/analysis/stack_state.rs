use std::cmp;
use std::fmt;

/// Abstract state of the evaluation stack at a program point
///
/// Only the depth of the stack is tracked, along with how many of the values at the bottom of the
/// stack are unsafe to use (even indirectly) in a guarded push. The unsafe count never exceeds the
/// stack size.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StackState {
    stack_size: usize,
    unsafe_to_push: usize,
}

impl StackState {
    pub const EMPTY: StackState = StackState {
        stack_size: 0,
        unsafe_to_push: 0,
    };

    /// Construct a state, clamping the unsafe count to the stack size
    pub fn new(stack_size: usize, unsafe_to_push: usize) -> StackState {
        StackState {
            stack_size,
            unsafe_to_push: cmp::min(stack_size, unsafe_to_push),
        }
    }

    pub fn stack_size(self) -> usize {
        self.stack_size
    }

    /// Number of values at the bottom of the stack that must not reach a guarded push
    pub fn unsafe_to_push(self) -> usize {
        self.unsafe_to_push
    }

    /// Combine the state flowing into a join point with the state recorded for that join point
    ///
    /// The recorded state wins outright if it is forced or if the stack sizes disagree. Otherwise
    /// the stack size is kept and a slot is unsafe if it was unsafe along either path.
    pub fn merge(self, incoming: PendingState) -> StackState {
        match incoming {
            PendingState::Forced(state) => state,
            PendingState::Merged(state) if state.stack_size != self.stack_size => state,
            PendingState::Merged(state) => StackState::new(
                state.stack_size,
                cmp::max(self.unsafe_to_push, state.unsafe_to_push),
            ),
        }
    }
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} unsafe)", self.stack_size, self.unsafe_to_push)
    }
}

/// State recorded for an instruction which is reached by something other than fall-through
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PendingState {
    /// Overrides whatever state flows into the instruction (exception handler entries)
    Forced(StackState),

    /// Merged with the state flowing into the instruction (branch targets)
    Merged(StackState),
}

impl PendingState {
    /// Entry state of a `catch` handler or filter: just the exception object on the stack
    pub const EXCEPTION_HANDLER: PendingState = PendingState::Forced(StackState {
        stack_size: 1,
        unsafe_to_push: 0,
    });

    /// Entry state of a `catch` handler or filter in which the exception object itself is unsafe
    pub const TAINTED_EXCEPTION_HANDLER: PendingState = PendingState::Forced(StackState {
        stack_size: 1,
        unsafe_to_push: 1,
    });

    /// Fold another state propagated to the same instruction into this entry
    ///
    /// Forced entries stay as they are.
    pub fn absorb(self, incoming: StackState) -> PendingState {
        match self {
            PendingState::Forced(_) => self,
            PendingState::Merged(state) => {
                PendingState::Merged(state.merge(PendingState::Merged(incoming)))
            }
        }
    }
}

impl fmt::Display for PendingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingState::Forced(state) => write!(f, "{} [forced]", state),
            PendingState::Merged(state) => write!(f, "{}", state),
        }
    }
}
