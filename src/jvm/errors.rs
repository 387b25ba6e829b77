use super::code::Label;

/// Failures at the level of instructions and the writer boundary
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed descriptor '{descriptor}': {reason}")]
    MalformedDescriptor { descriptor: String, reason: String },

    #[error("method needs {0} local slots, more than the class file format allows")]
    MethodCodeMaxLocalsOverflow(usize),

    /// Code can still fall off the end of the method, or some labels were jumped to but never
    /// placed
    #[error(
        "method code is not finished (falls off the end: {falls_off_end}, unplaced labels: {unplaced_labels:?})"
    )]
    MethodCodeNotFinished {
        falls_off_end: bool,
        unplaced_labels: Vec<Label>,
    },

    /// The same label is placed twice (indicates a bug)
    #[error("label {0:?} placed more than once")]
    DuplicateLabel(Label),

    /// A branch or exception range refers to a label that the method never placed
    #[error("jump target {0:?} was never placed")]
    UnplacedJumpTarget(Label),

    /// Writer calls arrived in an order the writer cannot accept
    #[error("writer received {call} {state}")]
    WriterState {
        call: &'static str,
        state: &'static str,
    },
}
