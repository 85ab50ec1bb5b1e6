use crate::bus::{Bus, BusAction, BusJob, PriorityKind, READ_FROM_MEM_CYCLES};
use crate::cache::geometry::CacheGeometry;
use crate::coherence::{CoherencePolicy, CoherenceState, ProtocolEvent, Resolution};
use crate::error::SimError;

fn bus_with(policy: CoherencePolicy, caches: usize) -> Bus {
    let g = CacheGeometry::configure(1024, 16, 2, policy).unwrap();
    let mut bus = Bus::new(g);
    for _ in 0..caches {
        bus.attach();
    }
    bus
}

fn update_job(bus: &Bus, cache: usize, raw: u32, now: u64) -> BusJob {
    BusJob::new(
        cache,
        bus.geometry().address(raw),
        BusAction::BusUpd,
        Resolution::To(CoherenceState::Modified),
        now,
    )
}

#[test]
fn attach_assigns_dense_ids() {
    let bus = bus_with(CoherencePolicy::Msi, 3);
    let ids: Vec<_> = bus.caches().iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert!(bus.is_idle());
}

#[test]
fn round_robin_serves_each_cache_once_per_round() {
    let k = 3;
    let mut bus = bus_with(CoherencePolicy::Dragon, k);
    for id in 0..k {
        let job = update_job(&bus, id, 0x100 * id as u32, 0);
        bus.cache_mut(id).submit(job).unwrap();
    }

    let mut served = Vec::new();
    for now in 1..=(3 * k as u64) {
        let waiting: Vec<bool> = bus.caches().iter().map(|c| c.awaiting_bus()).collect();
        bus.tick(now).unwrap();
        let done: Vec<usize> = (0..k)
            .filter(|&id| waiting[id] && !bus.cache(id).awaiting_bus())
            .collect();
        assert_eq!(done.len(), 1, "cycle {now}");
        let id = done[0];
        served.push(id);
        // keep every cache offering work
        let job = update_job(&bus, id, 0x100 * id as u32, now);
        bus.cache_mut(id).submit(job).unwrap();
    }
    for round in served.chunks(k) {
        let mut ids = round.to_vec();
        ids.sort();
        assert_eq!(ids, (0..k).collect::<Vec<_>>());
    }
    assert_eq!(&served[..k], &[0, 1, 2]);
}

#[test]
fn second_job_on_a_waiting_cache_is_rejected() {
    let mut bus = bus_with(CoherencePolicy::Dragon, 1);
    let first = update_job(&bus, 0, 0x0, 0);
    let second = update_job(&bus, 0, 0x40, 0);
    bus.cache_mut(0).submit(first).unwrap();
    assert_eq!(
        bus.cache_mut(0).submit(second),
        Err(SimError::JobAlreadyPending { cache: 0 })
    );
    assert_eq!(bus.cache(0).pending_job().unwrap().target().raw(), 0x0);
}

#[test]
fn read_cost_depends_on_snoop() {
    let mut bus = bus_with(CoherencePolicy::Msi, 2);
    let a = bus.geometry().address(0x200);

    bus.local_access(0, a, ProtocolEvent::LocalRead, 1).unwrap();
    bus.tick(1).unwrap();
    assert_eq!(bus.current_job().unwrap().remaining(), READ_FROM_MEM_CYCLES - 1);
    let mut now = 1;
    while bus.cache(0).awaiting_bus() {
        now += 1;
        bus.tick(now).unwrap();
    }
    assert_eq!(now, READ_FROM_MEM_CYCLES);
    assert_eq!(bus.cache(0).state_of(&a), CoherenceState::Shared);

    // the second reader is served from cache 0: one cycle per word
    now += 1;
    bus.local_access(1, a, ProtocolEvent::LocalRead, now).unwrap();
    bus.tick(now).unwrap();
    assert_eq!(bus.current_job().unwrap().remaining(), 3);
    assert_eq!(bus.stats().reads(), 1);
}

#[test]
fn flush_for_another_block_is_rejected() {
    let mut bus = bus_with(CoherencePolicy::Msi, 2);
    let a = bus.geometry().address(0x100);
    let b = bus.geometry().address(0x300);
    bus.flush(0, a, CoherenceState::Shared, 1).unwrap();
    assert!(bus.cache(0).flushing());

    let err = bus.flush(1, b, CoherenceState::Shared, 1).unwrap_err();
    assert_eq!(
        err,
        SimError::CrossAddressConflict {
            kind: PriorityKind::Flush,
            active: 0x100,
            requested: 0x300,
        }
    );
    assert!(!bus.cache(1).flushing());
    let job = bus.priority_job(PriorityKind::Flush).unwrap();
    assert_eq!(job.participants(), &[(0, CoherenceState::Shared)]);
    assert_eq!(bus.stats().flushes(), 1);

    // the first flush still completes normally
    for now in 2..102 {
        bus.tick(now).unwrap();
    }
    assert!(!bus.cache(0).flushing());
    assert_eq!(bus.cache(0).state_of(&a), CoherenceState::Shared);
    assert!(bus.priority_job(PriorityKind::Flush).is_none());
}

#[test]
fn priority_jobs_preempt_and_update_goes_first() {
    let mut bus = bus_with(CoherencePolicy::Musi, 3);
    let a = bus.geometry().address(0x40);
    let b = bus.geometry().address(0x80);

    bus.local_access(2, a, ProtocolEvent::LocalRead, 1).unwrap();
    bus.tick(1).unwrap();
    let before = bus.current_job().unwrap().remaining();

    bus.flush(0, b, CoherenceState::Invalid, 2).unwrap();
    bus.update(1, a, CoherenceState::Modified, 2).unwrap();
    bus.tick(2).unwrap();
    assert!(!bus.cache(1).updating());
    assert!(bus.cache(0).flushing());
    assert_eq!(bus.cache(1).state_of(&a), CoherenceState::Modified);

    for now in 3..103 {
        assert_eq!(bus.current_job().unwrap().remaining(), before);
        bus.tick(now).unwrap();
    }
    assert!(!bus.cache(0).flushing());
    assert_eq!(bus.current_job().unwrap().remaining(), before);
    bus.tick(103).unwrap();
    assert_eq!(bus.current_job().unwrap().remaining(), before - 1);
}

#[test]
fn flush_joins_same_block() {
    let mut bus = bus_with(CoherencePolicy::Mesi, 3);
    let a = bus.geometry().address(0x100);
    bus.flush(0, a, CoherenceState::Shared, 5).unwrap();
    bus.flush(1, bus.geometry().address(0x108), CoherenceState::Invalid, 5)
        .unwrap();
    // joining does not extend the write-back
    assert_eq!(bus.priority_job(PriorityKind::Flush).unwrap().remaining(), 100);
    for now in 6..106 {
        bus.tick(now).unwrap();
    }
    assert_eq!(bus.cache(0).state_of(&a), CoherenceState::Shared);
    assert!(!bus.cache(1).contains(&a));
    assert_eq!(bus.stats().flushes(), 2);
    assert_eq!(bus.stats().bytes_transferred(), 16);
    assert_eq!(bus.stats().transactions(), 1);
}

#[test]
fn msi_remote_update_is_a_violation() {
    let mut bus = bus_with(CoherencePolicy::Msi, 2);
    let a = bus.geometry().address(0x0);
    let err = bus
        .broadcast(0, a, ProtocolEvent::RemoteUpdate, 1)
        .unwrap_err();
    assert!(matches!(err, SimError::ProtocolViolation { .. }));
}

#[test]
fn musi_upgrade_waits_for_busy_update_slot() {
    let mut bus = bus_with(CoherencePolicy::Musi, 2);
    let a = bus.geometry().address(0x100);
    let b = bus.geometry().address(0x200);
    bus.cache_mut(0).set_state(&a, CoherenceState::Shared).unwrap();
    bus.cache_mut(1).set_state(&b, CoherenceState::Shared).unwrap();
    let recency = bus.cache(1).set(&b).recency().to_vec();

    assert!(bus.local_access(0, a, ProtocolEvent::LocalWrite, 1).unwrap());
    assert!(!bus.local_access(1, b, ProtocolEvent::LocalWrite, 1).unwrap());
    // the deferred write left no trace
    assert_eq!(bus.cache(1).state_of(&b), CoherenceState::Shared);
    assert!(!bus.cache(1).updating());
    assert_eq!(bus.cache(1).set(&b).recency(), &recency[..]);
    let job = bus.priority_job(PriorityKind::Update).unwrap();
    assert_eq!(job.participants(), &[(0, CoherenceState::Modified)]);

    bus.tick(1).unwrap();
    assert_eq!(bus.cache(0).state_of(&a), CoherenceState::Modified);
    assert!(bus.local_access(1, b, ProtocolEvent::LocalWrite, 2).unwrap());
    bus.tick(2).unwrap();
    assert_eq!(bus.cache(1).state_of(&b), CoherenceState::Modified);
    assert_eq!(bus.stats().updates(), 2);
    assert!(bus.is_idle());
}
