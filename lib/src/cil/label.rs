use std::fmt;

/// Position in a method body under construction
///
/// Branches and exception handlers can refer to a label before it is placed. Labels are only
/// meaningful to the [`super::MethodBodyBuilder`] which handed them out.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(u32);

impl Label {
    pub(crate) const FIRST: Label = Label(0);

    pub(crate) fn successor(self) -> Label {
        Label(self.0 + 1)
    }
}

/// Hands out labels which have not been used yet
pub trait LabelGenerator {
    fn fresh_label(&mut self) -> Label;
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "L{}", self.0)
    }
}
