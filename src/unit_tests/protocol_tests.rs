use crate::bus::BusAction;
use crate::coherence::CoherenceState::{self, *};
use crate::coherence::ProtocolEvent::{self, *};
use crate::coherence::{transition, CoherencePolicy, Effect, JobRequest, Resolution, Transition};
use crate::error::SimError;

fn t(policy: CoherencePolicy, state: CoherenceState, event: ProtocolEvent) -> Transition {
    transition(policy, state, event).unwrap()
}

fn request(action: BusAction, resolution: Resolution) -> Effect {
    Effect::Request(JobRequest {
        action,
        resolution,
        then: None,
    })
}

// Which events a policy must handle in every one of its states.
fn handles(policy: CoherencePolicy, event: ProtocolEvent) -> bool {
    match event {
        RemoteUpdate => matches!(policy, CoherencePolicy::Musi | CoherencePolicy::Dragon),
        RemoteReadExclusive => policy != CoherencePolicy::Dragon,
        LocalRead | LocalWrite | RemoteRead => true,
    }
}

#[test]
fn every_policy_is_total_over_its_own_states() {
    for policy in CoherencePolicy::ALL {
        for &state in policy.states() {
            for event in ProtocolEvent::ALL {
                let result = transition(policy, state, event);
                assert_eq!(
                    result.is_ok(),
                    handles(policy, event),
                    "{policy} {state:?} {event:?}: {result:?}"
                );
            }
        }
    }
}

#[test]
fn foreign_states_are_violations() {
    let all = [Modified, Exclusive, Shared, Invalid, SharedClean, SharedModified];
    for policy in CoherencePolicy::ALL {
        for state in all {
            if policy.states().contains(&state) {
                continue;
            }
            for event in ProtocolEvent::ALL {
                assert!(transition(policy, state, event).is_err(), "{policy} {state:?}");
            }
        }
    }
}

#[test]
fn dragon_rejects_remote_read_exclusive() {
    let err = transition(CoherencePolicy::Dragon, SharedClean, RemoteReadExclusive).unwrap_err();
    assert_eq!(
        err,
        SimError::ProtocolViolation {
            policy: CoherencePolicy::Dragon,
            state: SharedClean,
            event: RemoteReadExclusive,
        }
    );
}

#[test]
fn msi_table() {
    let p = CoherencePolicy::Msi;
    assert_eq!(t(p, Invalid, LocalRead).effect, request(BusAction::BusRd, Resolution::To(Shared)));
    assert_eq!(
        t(p, Invalid, LocalWrite).effect,
        request(BusAction::BusRdX, Resolution::To(Modified))
    );
    assert_eq!(t(p, Invalid, RemoteRead).effect, Effect::Stay);
    assert_eq!(t(p, Invalid, RemoteReadExclusive).effect, Effect::Stay);

    assert_eq!(t(p, Shared, LocalRead).effect, Effect::Stay);
    assert_eq!(
        t(p, Shared, LocalWrite).effect,
        request(BusAction::BusRdX, Resolution::To(Modified))
    );
    assert_eq!(t(p, Shared, RemoteRead).effect, Effect::Stay);
    let inv = t(p, Shared, RemoteReadExclusive);
    assert_eq!(inv.effect, Effect::Become(Invalid));
    assert!(inv.invalidates);

    assert_eq!(t(p, Modified, LocalRead).effect, Effect::Stay);
    let write = t(p, Modified, LocalWrite);
    assert_eq!(write.effect, Effect::Stay);
    assert!(write.silent_write);
    assert_eq!(t(p, Modified, RemoteRead).effect, Effect::Flush(Shared));
    let rdx = t(p, Modified, RemoteReadExclusive);
    assert_eq!(rdx.effect, Effect::Flush(Invalid));
    assert!(rdx.invalidates);
}

#[test]
fn mesi_read_miss_resolves_by_snoop() {
    let p = CoherencePolicy::Mesi;
    let Effect::Request(req) = t(p, Invalid, LocalRead).effect else {
        panic!("read miss must go to the bus");
    };
    assert_eq!(req.action, BusAction::BusRd);
    assert_eq!(req.resolution.resolve(false), Exclusive);
    assert_eq!(req.resolution.resolve(true), Shared);
}

#[test]
fn mesi_exclusive_row() {
    let p = CoherencePolicy::Mesi;
    assert_eq!(t(p, Exclusive, LocalRead).effect, Effect::Stay);
    let write = t(p, Exclusive, LocalWrite);
    assert_eq!(write.effect, Effect::Become(Modified));
    assert!(write.silent_write);
    assert_eq!(t(p, Exclusive, RemoteRead).effect, Effect::Become(Shared));
    assert_eq!(t(p, Exclusive, RemoteReadExclusive).effect, Effect::Become(Invalid));
    assert_eq!(t(p, Modified, RemoteRead).effect, Effect::Flush(Shared));
}

#[test]
fn musi_refines_shared_write_only() {
    let p = CoherencePolicy::Musi;
    assert_eq!(t(p, Shared, LocalWrite).effect, Effect::Upgrade(Modified));
    assert_eq!(
        t(p, Invalid, LocalWrite).effect,
        request(BusAction::BusRdX, Resolution::To(Modified))
    );
    for &state in p.states() {
        assert_eq!(t(p, state, RemoteUpdate).effect, Effect::Stay);
        for event in [LocalRead, RemoteRead, RemoteReadExclusive] {
            assert_eq!(t(p, state, event), t(CoherencePolicy::Msi, state, event));
        }
    }
}

#[test]
fn dragon_write_miss_fetches_then_updates() {
    let p = CoherencePolicy::Dragon;
    let Effect::Request(req) = t(p, Invalid, LocalWrite).effect else {
        panic!("write miss must go to the bus");
    };
    assert_eq!(req.action, BusAction::BusRd);
    assert_eq!(req.resolution.resolve(true), SharedClean);
    assert_eq!(req.resolution.resolve(false), Exclusive);
    let (then, resolution) = req.then.unwrap();
    assert_eq!(then, BusAction::BusUpd);
    assert_eq!(resolution.resolve(true), SharedModified);
    assert_eq!(resolution.resolve(false), Modified);
}

#[test]
fn dragon_table() {
    let p = CoherencePolicy::Dragon;
    assert_eq!(t(p, Exclusive, LocalWrite).effect, Effect::Become(Modified));
    assert_eq!(t(p, Modified, LocalWrite).effect, Effect::Stay);
    for state in [SharedClean, SharedModified] {
        let Effect::Request(req) = t(p, state, LocalWrite).effect else {
            panic!("shared write must broadcast");
        };
        assert_eq!(req.action, BusAction::BusUpd);
        assert!(req.then.is_none());
    }
    assert_eq!(t(p, Exclusive, RemoteRead).effect, Effect::Become(SharedClean));
    assert_eq!(t(p, Modified, RemoteRead).effect, Effect::Flush(SharedModified));
    assert_eq!(t(p, SharedClean, RemoteRead).effect, Effect::Stay);
    assert_eq!(t(p, SharedModified, RemoteRead).effect, Effect::Stay);
    assert_eq!(t(p, SharedClean, RemoteUpdate).effect, Effect::Stay);
    assert_eq!(t(p, SharedModified, RemoteUpdate).effect, Effect::Become(SharedClean));
    assert_eq!(t(p, Exclusive, RemoteUpdate).effect, Effect::Become(SharedClean));
    assert_eq!(t(p, Modified, RemoteUpdate).effect, Effect::Become(SharedClean));
}

// Local-only sequences on one isolated cache: every bus request resolves as if nobody else holds
// the block.
fn run_local(policy: CoherencePolicy, ops: &[ProtocolEvent]) -> Vec<CoherenceState> {
    let mut state = Invalid;
    let mut seen = Vec::new();
    for &op in ops {
        state = match t(policy, state, op).effect {
            Effect::Stay => state,
            Effect::Become(s) | Effect::Flush(s) | Effect::Upgrade(s) => s,
            Effect::Request(req) => match req.then {
                Some((_, then)) => then.resolve(false),
                None => req.resolution.resolve(false),
            },
        };
        seen.push(state);
    }
    seen
}

#[test]
fn isolated_cache_sequences() {
    let ops = [LocalRead, LocalWrite, LocalRead, LocalWrite];
    assert_eq!(
        run_local(CoherencePolicy::Msi, &ops),
        vec![Shared, Modified, Modified, Modified]
    );
    assert_eq!(
        run_local(CoherencePolicy::Mesi, &ops),
        vec![Exclusive, Modified, Modified, Modified]
    );
    assert_eq!(
        run_local(CoherencePolicy::Dragon, &ops),
        vec![Exclusive, Modified, Modified, Modified]
    );
    assert_eq!(
        run_local(CoherencePolicy::Dragon, &[LocalWrite, LocalRead]),
        vec![Modified, Modified]
    );
}

#[test]
fn write_back_obligation() {
    for state in [Modified, SharedModified] {
        assert!(state.write_back_on_evict());
    }
    for state in [Exclusive, Shared, Invalid, SharedClean] {
        assert!(!state.write_back_on_evict());
    }
    assert!(SharedClean.is_shared());
    assert!(!Exclusive.is_shared());
}
