use crate::block::LabelDef;
use crate::call::ConcreteCall;

/// Label definition anchored before the call at `position`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelMark {
    /// Defined label.
    pub label: LabelDef,
    /// Index of the call the label precedes; equals the call count for a
    /// trailing label.
    pub position: usize,
}

/// One generated test sequence: concrete calls plus label placements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    calls: Vec<ConcreteCall>,
    labels: Vec<LabelMark>,
}

impl Sequence {
    pub(crate) fn new(calls: Vec<ConcreteCall>, labels: Vec<LabelMark>) -> Self {
        Self { calls, labels }
    }

    /// Calls in execution order.
    #[must_use]
    pub fn calls(&self) -> &[ConcreteCall] {
        &self.calls
    }

    /// Label marks in definition order.
    #[must_use]
    pub fn labels(&self) -> &[LabelMark] {
        &self.labels
    }

    /// Number of calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// True when the sequence holds no calls.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Labels placed immediately before the call at `position`.
    pub fn labels_at(&self, position: usize) -> impl Iterator<Item = &LabelDef> + '_ {
        self.labels
            .iter()
            .filter(move |mark| mark.position == position)
            .map(|mark| &mark.label)
    }

    /// Names of the calls, handy for comparing shapes.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        self.calls.iter().map(ConcreteCall::name).collect()
    }
}

/// Receiver of generated sequences, in generation order.
pub trait SequenceSink {
    /// Accepts the next finished sequence.
    fn accept_sequence(&mut self, sequence: Sequence);
}

impl SequenceSink for Vec<Sequence> {
    fn accept_sequence(&mut self, sequence: Sequence) {
        self.push(sequence);
    }
}
