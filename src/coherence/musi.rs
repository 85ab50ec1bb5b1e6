// MSI with a cheaper shared write: instead of a full BUSRDX the writer notifies its siblings and
// takes ownership after a one-word update slot.

use super::msi;
use super::CoherenceState::{self, *};
use super::ProtocolEvent::{self, *};
use super::Transition;

pub(super) fn transition(state: CoherenceState, event: ProtocolEvent) -> Option<Transition> {
    match (state, event) {
        (Shared, LocalWrite) => Some(Transition::upgrade(Modified)),
        (Invalid | Shared | Modified, RemoteUpdate) => Some(Transition::stay()),
        _ => msi::transition(state, event),
    }
}
