use std::fmt;

/// Position in a method body, placed at most once and targeted by any number of jumps
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Label(usize);

/// Source of fresh labels for one method body
///
/// Labels only need to be unique within a body, so every body starts counting from zero.
#[derive(Clone, Debug, Default)]
pub struct LabelGenerator {
    next: usize,
}

impl LabelGenerator {
    pub fn fresh_label(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}
