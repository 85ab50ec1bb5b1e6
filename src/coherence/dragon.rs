// Dragon: update-based, so sibling copies are refreshed rather than invalidated and BUSRDX never
// appears on the bus.

use super::CoherenceState::{self, *};
use super::ProtocolEvent::{self, *};
use super::{Resolution, Transition};
use crate::bus::BusAction;

pub(super) const STATES: &[CoherenceState] =
    &[Exclusive, Modified, SharedClean, SharedModified, Invalid];

const READ: Resolution = Resolution::BySharing {
    shared: SharedClean,
    alone: Exclusive,
};

const WRITE: Resolution = Resolution::BySharing {
    shared: SharedModified,
    alone: Modified,
};

pub(super) fn transition(state: CoherenceState, event: ProtocolEvent) -> Option<Transition> {
    let t = match state {
        Invalid => match event {
            LocalRead => Transition::request(BusAction::BusRd, READ),
            // fetch, then broadcast the written word
            LocalWrite => Transition::chained(BusAction::BusRd, READ, (BusAction::BusUpd, WRITE)),
            RemoteRead | RemoteUpdate => Transition::stay(),
            RemoteReadExclusive => return None,
        },
        Exclusive => match event {
            LocalRead => Transition::stay(),
            LocalWrite => Transition::to(Modified).silent_write(),
            RemoteRead | RemoteUpdate => Transition::to(SharedClean),
            RemoteReadExclusive => return None,
        },
        Modified => match event {
            LocalRead => Transition::stay(),
            LocalWrite => Transition::stay().silent_write(),
            RemoteRead => Transition::flush(SharedModified),
            RemoteUpdate => Transition::to(SharedClean),
            RemoteReadExclusive => return None,
        },
        SharedClean => match event {
            LocalRead | RemoteRead | RemoteUpdate => Transition::stay(),
            LocalWrite => Transition::request(BusAction::BusUpd, WRITE),
            RemoteReadExclusive => return None,
        },
        SharedModified => match event {
            LocalRead | RemoteRead => Transition::stay(),
            LocalWrite => Transition::request(BusAction::BusUpd, WRITE),
            RemoteUpdate => Transition::to(SharedClean),
            RemoteReadExclusive => return None,
        },
        Shared => return None,
    };
    Some(t)
}
