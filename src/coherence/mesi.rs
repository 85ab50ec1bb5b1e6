use super::CoherenceState::{self, *};
use super::ProtocolEvent::{self, *};
use super::{Resolution, Transition};
use crate::bus::BusAction;

pub(super) const STATES: &[CoherenceState] = &[Modified, Exclusive, Shared, Invalid];

pub(super) fn transition(state: CoherenceState, event: ProtocolEvent) -> Option<Transition> {
    let t = match state {
        Invalid => match event {
            LocalRead => Transition::request(
                BusAction::BusRd,
                Resolution::BySharing {
                    shared: Shared,
                    alone: Exclusive,
                },
            ),
            LocalWrite => Transition::request(BusAction::BusRdX, Resolution::To(Modified)),
            RemoteRead | RemoteReadExclusive => Transition::stay(),
            RemoteUpdate => return None,
        },
        Shared => match event {
            LocalRead | RemoteRead => Transition::stay(),
            LocalWrite => Transition::request(BusAction::BusRdX, Resolution::To(Modified)),
            RemoteReadExclusive => Transition::invalidate(),
            RemoteUpdate => return None,
        },
        Exclusive => match event {
            LocalRead => Transition::stay(),
            LocalWrite => Transition::to(Modified).silent_write(),
            RemoteRead => Transition::to(Shared),
            RemoteReadExclusive => Transition::invalidate(),
            RemoteUpdate => return None,
        },
        Modified => match event {
            LocalRead => Transition::stay(),
            LocalWrite => Transition::stay().silent_write(),
            RemoteRead => Transition::flush(Shared),
            RemoteReadExclusive => Transition::flush(Invalid).counting_invalidation(),
            RemoteUpdate => return None,
        },
        SharedClean | SharedModified => return None,
    };
    Some(t)
}
