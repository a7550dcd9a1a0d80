//! Trigger Walk: visit order, boundary rules, failure isolation, re-entry.
#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

mod support;

use audio::{
    CompError, CompId, CompState, EndpointKind, PipelineId, TriggerCmd, TriggerError, WalkStatus,
};
use support::{bridge, capture, playback, three_stage, Fixture, OnTrigger};

// ── Order ────────────────────────────────────────────────────────────────────

#[test]
fn start_reaches_active_upstream_first() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);

    let report = f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    assert_eq!(report.status, WalkStatus::Complete);
    assert_eq!(f.rec.order(), vec![1, 2, 3]);
    for id in 1..=3 {
        assert_eq!(f.state(id), CompState::Active);
        assert_eq!(f.trigger_count(id), 1);
    }
}

#[test]
fn start_from_the_sink_still_walks_upstream_first() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);

    f.topology.trigger(CompId(3), TriggerCmd::Start).unwrap();

    assert_eq!(f.rec.order(), vec![1, 2, 3]);
}

#[test]
fn stop_walks_downstream_first() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();
    f.rec.clear();

    f.topology.trigger(CompId(1), TriggerCmd::Stop).unwrap();

    assert_eq!(f.rec.order(), vec![3, 2, 1]);
    for id in 1..=3 {
        assert_eq!(f.state(id), CompState::Ready);
    }
}

#[test]
fn pause_and_release_round_trip() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    f.topology.trigger(CompId(1), TriggerCmd::Pause).unwrap();
    assert_eq!(f.state(2), CompState::Paused);

    f.topology.trigger(CompId(1), TriggerCmd::Release).unwrap();
    assert_eq!(f.state(2), CompState::Active);
}

#[test]
fn suspend_then_resume_restores_previous_state() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();
    f.topology.trigger(CompId(1), TriggerCmd::Pause).unwrap();

    f.topology.trigger(CompId(1), TriggerCmd::Suspend).unwrap();
    assert_eq!(f.state(1), CompState::Suspend);

    f.topology.trigger(CompId(1), TriggerCmd::Resume).unwrap();
    assert_eq!(f.state(1), CompState::Paused);
}

#[test]
fn diamond_visits_each_component_once() {
    // 1 → 2 → 4 and 1 → 3 → 4 in one pipeline.
    let comps = [
        support::comp(1, EndpointKind::Host),
        support::comp(2, EndpointKind::Internal),
        support::comp(3, EndpointKind::Internal),
        support::comp(4, EndpointKind::Dai),
    ];
    let buffers = [
        support::buffer(10, 1, 2),
        support::buffer(11, 1, 3),
        support::buffer(12, 2, 4),
        support::buffer(13, 3, 4),
    ];
    let f = Fixture::new();
    f.topology
        .build(&audio::PipelineDesc {
            pipeline: playback(1, 0),
            comps: &comps,
            buffers: &buffers,
        })
        .unwrap();

    let report = f.topology.trigger(CompId(2), TriggerCmd::Start).unwrap();

    assert_eq!(report.visited.len(), 4);
    let order = f.rec.order();
    assert_eq!(order.first(), Some(&1));
    assert_eq!(order.last(), Some(&4));
    for id in 1..=4 {
        assert_eq!(f.trigger_count(id), 1);
    }
}

#[test]
fn already_set_component_is_still_visited() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    let events = f.rec.events();
    assert_eq!(events.len(), 6);
    assert!(events[3..].iter().all(|e| e.already_set));
    assert_eq!(f.trigger_count(2), 2);
}

#[test]
fn trigger_leaves_buffer_counts_alone() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();
    let buf = f.topology.buffer(audio::BufferId(10)).unwrap();
    buf.write(&[1, 2, 3, 4]).unwrap();
    let before = buf.counts();

    f.topology.trigger(CompId(1), TriggerCmd::Stop).unwrap();

    assert_eq!(buf.counts(), before);
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[test]
fn invalid_transition_is_reported_and_prunes_downstream() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);

    let err = f.topology.trigger(CompId(1), TriggerCmd::Release).unwrap_err();

    assert!(matches!(
        err,
        TriggerError::Component {
            comp: CompId(1),
            error: CompError::InvalidTransition(_)
        }
    ));
    assert!(f.rec.order().is_empty());
    assert_eq!(f.state(3), CompState::Ready);
}

#[test]
fn failing_branch_does_not_stop_its_sibling() {
    // 1 feeds both 2 and 3.
    let comps = [
        support::comp(1, EndpointKind::Host),
        support::comp(2, EndpointKind::Dai),
        support::comp(3, EndpointKind::Dai),
    ];
    let buffers = [support::buffer(10, 1, 2), support::buffer(11, 1, 3)];
    let f = Fixture::new();
    f.topology
        .build(&audio::PipelineDesc {
            pipeline: playback(1, 0),
            comps: &comps,
            buffers: &buffers,
        })
        .unwrap();
    f.rec.on_trigger(2, OnTrigger::Fail(CompError::Driver(5)));

    let err = f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap_err();

    assert_eq!(
        err,
        TriggerError::Component {
            comp: CompId(2),
            error: CompError::Driver(5)
        }
    );
    assert_eq!(f.state(1), CompState::Active);
    assert_eq!(f.state(2), CompState::Ready);
    assert_eq!(f.state(3), CompState::Active);
}

#[test]
fn failure_mid_chain_keeps_upstream_state() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.rec.on_trigger(2, OnTrigger::Fail(CompError::Busy));

    let err = f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap_err();

    assert_eq!(err.errno(), -16);
    assert_eq!(f.rec.order(), vec![1, 2]);
    assert_eq!(f.state(1), CompState::Active);
    assert_eq!(f.state(3), CompState::Ready);
}

#[test]
fn path_stop_halts_propagation_past_the_component() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.rec.on_trigger(2, OnTrigger::PathStop);

    let report = f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    assert_eq!(report.status, WalkStatus::Complete);
    assert_eq!(f.rec.order(), vec![1, 2]);
    assert_eq!(f.state(2), CompState::Active);
    assert_eq!(f.state(3), CompState::Ready);
}

#[test]
fn uninit_component_refuses_every_command() {
    let f = Fixture::new();
    f.topology.pipeline_new(playback(1, 0)).unwrap();
    f.topology
        .comp_new(audio::CompConfig {
            pipeline: PipelineId(1),
            ..support::comp(1, EndpointKind::Host)
        })
        .unwrap();

    let err = f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap_err();

    assert_eq!(err.errno(), -22);
    assert!(!err.is_fatal());
}

// ── Boundaries ───────────────────────────────────────────────────────────────

#[test]
fn crossing_to_another_core_stops_with_epipe_and_no_mutation() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    three_stage(&f, 2, 4, 1);
    bridge(&f, 90, 1, 3, 4);

    let report = f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    assert_eq!(report.boundary(), &[PipelineId(2)]);
    assert_eq!(report.status.errno(), -32);
    for id in 4..=6 {
        assert_eq!(f.state(id), CompState::Ready);
        assert_eq!(f.trigger_count(id), 0);
    }
}

#[test]
fn pipelines_scheduled_together_are_walked_as_one() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.linear(
        playback(2, 0).scheduled_by(PipelineId(1)),
        &[(4, EndpointKind::Internal), (5, EndpointKind::Dai)],
        40,
    )
    .unwrap();
    bridge(&f, 90, 1, 2, 4);

    let report = f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    assert_eq!(report.status, WalkStatus::Complete);
    assert_eq!(f.state(5), CompState::Active);
    let order = f.rec.order();
    let pos = |id| order.iter().position(|c| *c == id).unwrap();
    assert!(pos(2) < pos(4));
}

#[test]
fn same_sched_id_on_another_core_is_a_boundary() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.linear(
        playback(2, 1).scheduled_by(PipelineId(1)),
        &[(4, EndpointKind::Internal), (5, EndpointKind::Dai)],
        40,
    )
    .unwrap();
    bridge(&f, 90, 1, 2, 4);

    let report = f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    assert_eq!(report.boundary(), &[PipelineId(2)]);
    assert_eq!(f.state(4), CompState::Ready);
}

/// Upstream pipeline 1 (`1 → 2`, core 1) feeds capture pipeline 2
/// (`3 → 4`, core 0) through buffer 90.
fn capture_pair(f: &Fixture, upstream_source: EndpointKind) {
    f.linear(
        playback(1, 1),
        &[(1, upstream_source), (2, EndpointKind::Internal)],
        10,
    )
    .unwrap();
    f.linear(
        capture(2, 0),
        &[(3, EndpointKind::Internal), (4, EndpointKind::Host)],
        30,
    )
    .unwrap();
    bridge(f, 90, 1, 2, 3);
}

#[test]
fn capture_start_into_inactive_upstream_is_enodata() {
    let f = Fixture::new();
    capture_pair(&f, EndpointKind::Host);

    let err = f.topology.trigger(CompId(4), TriggerCmd::Start).unwrap_err();

    assert_eq!(err, TriggerError::NoData { pipeline: PipelineId(1) });
    assert_eq!(err.errno(), -61);
    assert!(!err.is_fatal());
    assert!(f.rec.order().is_empty());
    for id in 1..=4 {
        assert_eq!(f.state(id), CompState::Ready);
    }
}

#[test]
fn capture_release_into_inactive_upstream_is_enodata() {
    let f = Fixture::new();
    capture_pair(&f, EndpointKind::Internal);

    let err = f.topology.trigger(CompId(4), TriggerCmd::Release).unwrap_err();

    assert!(matches!(err, TriggerError::NoData { .. }));
}

#[test]
fn hardware_sourced_upstream_is_a_plain_boundary() {
    let f = Fixture::new();
    capture_pair(&f, EndpointKind::Dai);

    let report = f.topology.trigger(CompId(4), TriggerCmd::Start).unwrap();

    assert_eq!(report.boundary(), &[PipelineId(1)]);
    assert_eq!(f.state(3), CompState::Active);
    assert_eq!(f.state(1), CompState::Ready);
}

#[test]
fn running_upstream_is_a_plain_boundary() {
    let f = Fixture::new();
    capture_pair(&f, EndpointKind::Host);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    let report = f.topology.trigger(CompId(4), TriggerCmd::Start).unwrap();

    assert_eq!(report.boundary(), &[PipelineId(1)]);
    assert_eq!(f.state(4), CompState::Active);
}

#[test]
fn capture_stop_never_reports_enodata() {
    let f = Fixture::new();
    capture_pair(&f, EndpointKind::Host);

    let report = f.topology.trigger(CompId(4), TriggerCmd::Stop).unwrap();

    assert_eq!(report.boundary(), &[PipelineId(1)]);
}

// ── Nested walks ─────────────────────────────────────────────────────────────

#[test]
fn driver_may_trigger_another_pipeline_from_its_callback() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    three_stage(&f, 2, 4, 0);
    f.rec.on_trigger(2, OnTrigger::Nested(CompId(4), TriggerCmd::Start));

    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    assert!(f.rec.nested()[0].is_ok());
    for id in 1..=6 {
        assert_eq!(f.state(id), CompState::Active);
    }
}

#[test]
fn nested_walk_reaching_the_caller_is_fatal() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.rec.on_trigger(2, OnTrigger::Nested(CompId(1), TriggerCmd::Stop));

    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    let nested = f.rec.nested();
    let err = nested[0].clone().unwrap_err();
    assert_eq!(err, TriggerError::Reentered(CompId(2)));
    assert!(err.is_fatal());
}
