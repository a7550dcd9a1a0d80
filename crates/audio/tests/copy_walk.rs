//! Copy pass: order, running-only members, xrun accounting.
#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

mod support;

use audio::{BufferId, CompError, CompId, CopyError, EndpointKind, PipelineId, TriggerCmd};
use support::{bridge, playback, three_stage, Fixture};

#[test]
fn copy_runs_upstream_first_and_moves_data() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    let stats = f.topology.pipeline_copy(PipelineId(1)).unwrap();

    assert_eq!(f.rec.copies(), vec![1, 2, 3]);
    assert_eq!(stats.copied, 3);
    assert_eq!(stats.bytes, 48);
    // The sink reads everything, the middle buffer is drained too.
    assert_eq!(f.topology.buffer(BufferId(10)).unwrap().available(), 0);
    assert_eq!(f.topology.buffer(BufferId(11)).unwrap().available(), 0);
    assert_eq!(f.topology.comp_info(CompId(2)).unwrap().copy_count, 1);
}

#[test]
fn idle_components_are_not_copied() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);

    let stats = f.topology.pipeline_copy(PipelineId(1)).unwrap();

    assert!(f.rec.copies().is_empty());
    assert_eq!(stats.copied, 0);
}

#[test]
fn paused_pipeline_is_not_copied() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();
    f.topology.trigger(CompId(1), TriggerCmd::Pause).unwrap();

    f.topology.pipeline_copy(PipelineId(1)).unwrap();

    assert!(f.rec.copies().is_empty());
}

#[test]
fn draining_pipeline_keeps_copying() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();
    f.topology.trigger(CompId(1), TriggerCmd::Drain).unwrap();

    let stats = f.topology.pipeline_copy(PipelineId(1)).unwrap();

    assert_eq!(stats.copied, 3);
}

#[test]
fn copy_error_is_an_xrun() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();
    f.rec.fail_copy(2);

    let err = f.topology.pipeline_copy(PipelineId(1)).unwrap_err();

    assert_eq!(
        err,
        CopyError::Xrun {
            comp: CompId(2),
            error: CompError::Driver(5)
        }
    );
    assert_eq!(err.errno(), -5);
    assert_eq!(f.rec.copies(), vec![1, 2]);
    assert_eq!(
        f.topology.pipeline_info(PipelineId(1)).unwrap().xrun_count,
        1
    );
}

#[test]
fn copy_covers_pipelines_driven_by_the_same_task() {
    let f = Fixture::new();
    three_stage(&f, 1, 1, 0);
    f.linear(
        playback(2, 0).scheduled_by(PipelineId(1)),
        &[(4, EndpointKind::Internal), (5, EndpointKind::Dai)],
        40,
    )
    .unwrap();
    bridge(&f, 90, 1, 2, 4);
    f.topology.trigger(CompId(1), TriggerCmd::Start).unwrap();

    f.topology.pipeline_copy(PipelineId(1)).unwrap();

    let copies = f.rec.copies();
    assert_eq!(copies.len(), 5);
    let pos = |id| copies.iter().position(|c| *c == id).unwrap();
    assert!(pos(2) < pos(4));
    assert!(pos(4) < pos(5));
}

#[test]
fn copy_of_unknown_pipeline_is_an_error() {
    let f = Fixture::new();

    let err = f.topology.pipeline_copy(PipelineId(7)).unwrap_err();

    assert_eq!(err.errno(), -19);
}
