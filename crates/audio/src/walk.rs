//! Graph walks: the Trigger Walk and the per-pipeline copy, params, prepare
//! and reset passes.
//!
//! # Trigger Walk
//!
//! Two phases:
//!
//! 1. **Discovery** (one lock hold). Breadth-first over buffer edges in both
//!    directions from the start component. Neighbors in the start
//!    pipeline, or in a pipeline scheduled together with it, join the walk.
//!    Any other neighbor pipeline is a boundary: for a capture
//!    `Start`/`Release` an upstream boundary pipeline that cannot supply
//!    data aborts the whole walk with `ENODATA` before anything changes;
//!    otherwise it is recorded for the caller (`EPIPE`) and left untouched.
//! 2. **Delivery**. The discovered set is ordered topologically,
//!    upstream-first for start-like commands and downstream-first for the
//!    rest. Each component is then one locked step: check the transition,
//!    take its operations out, unlock, call `trigger`, relock, put them back
//!    and commit the state if the driver accepted.
//!
//! A failing component (or one answering [`TriggerOutcome::PathStop`])
//! prunes everything after it in walk direction; other branches keep going
//! and nothing already committed is rolled back.

use alloc::sync::Arc;

use platform::config::{MAX_COMPONENTS, MAX_COMP_PORTS, MAX_PIPELINES};
use platform::errno::{reply, EPIPE};

use crate::buffer::CompBuffer;
use crate::component::{CompError, ComponentOps, CopyIo, CopyStatus, StreamParams, TriggerOutcome};
use crate::error::{CopyError, GraphError, TriggerError};
use crate::pipeline::{Direction, Pipeline};
use crate::state::{CompState, Transition, TriggerCmd};
use crate::topology::{Graph, Topology};
use crate::{CompId, PipelineId};

type CompList = heapless::Vec<CompId, MAX_COMPONENTS>;
type BufList = heapless::Vec<Arc<CompBuffer>, MAX_COMP_PORTS>;

// ── Results ──────────────────────────────────────────────────────────────────

/// How far a successful walk got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkStatus {
    /// Every reachable component in the scheduling domain was visited.
    Complete,
    /// Propagation stopped at these pipelines; each must be triggered
    /// separately (`EPIPE`).
    BoundaryStop(heapless::Vec<PipelineId, MAX_PIPELINES>),
}

impl WalkStatus {
    /// `0`, or `-EPIPE` for a boundary stop.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Complete => 0,
            Self::BoundaryStop(_) => reply(EPIPE),
        }
    }
}

/// Outcome of a successful Trigger Walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkReport {
    /// Components whose driver was called, in call order.
    pub visited: CompList,
    /// Whether the walk stopped at a boundary.
    pub status: WalkStatus,
}

impl WalkReport {
    /// Pipelines left for a separate trigger.
    #[must_use]
    pub fn boundary(&self) -> &[PipelineId] {
        match &self.status {
            WalkStatus::Complete => &[],
            WalkStatus::BoundaryStop(list) => list,
        }
    }
}

/// Totals of one copy pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Components whose `copy` moved data.
    pub copied: u32,
    /// Components that reported nothing to do.
    pub idle: u32,
    /// Bytes reported moved.
    pub bytes: usize,
}

// ── Driver context ───────────────────────────────────────────────────────────

/// What a component's `trigger` callback sees.
pub struct TriggerContext<'a> {
    topology: &'a Topology,
    comp: CompId,
    pipeline: PipelineId,
    cmd: TriggerCmd,
    from: CompState,
    to: CompState,
    already_set: bool,
}

impl TriggerContext<'_> {
    /// Component being triggered.
    #[must_use]
    pub fn comp(&self) -> CompId {
        self.comp
    }

    /// Its pipeline.
    #[must_use]
    pub fn pipeline(&self) -> PipelineId {
        self.pipeline
    }

    /// Command being delivered.
    #[must_use]
    pub fn cmd(&self) -> TriggerCmd {
        self.cmd
    }

    /// State before the command.
    #[must_use]
    pub fn from(&self) -> CompState {
        self.from
    }

    /// State committed if the callback succeeds.
    #[must_use]
    pub fn to(&self) -> CompState {
        self.to
    }

    /// The component is already in the target state.
    #[must_use]
    pub fn already_set(&self) -> bool {
        self.already_set
    }

    /// Run a Trigger Walk from `start` while this callback is in progress.
    ///
    /// The topology lock is not held, so this is safe as long as the nested
    /// walk does not reach the component being triggered; if it does, it
    /// fails with the fatal [`TriggerError::Reentered`].
    ///
    /// # Errors
    ///
    /// Whatever the nested walk returns.
    pub fn trigger_nested(&self, start: CompId, cmd: TriggerCmd) -> Result<WalkReport, TriggerError> {
        self.topology.trigger(start, cmd)
    }
}

// ── Planning (under the lock) ────────────────────────────────────────────────

struct Plan {
    order: CompList,
    boundary: heapless::Vec<PipelineId, MAX_PIPELINES>,
}

/// A pipeline can feed a capture start if its source streams or is hardware.
fn can_supply(g: &Graph, p: &Pipeline) -> bool {
    p.source
        .and_then(|id| g.comp(id))
        .is_some_and(|src| src.state.is_running() || src.cfg.endpoint.is_hardware())
}

fn discover(g: &Graph, start: CompId, cmd: TriggerCmd) -> Result<Plan, TriggerError> {
    let first = g.comp(start).ok_or(GraphError::UnknownComponent(start))?;
    let home = g
        .pipeline(first.pipeline())
        .ok_or(GraphError::UnknownPipeline(first.pipeline()))?;
    let capture_start = cmd.needs_source_data() && home.cfg.direction == Direction::Capture;

    let mut found = CompList::new();
    let mut boundary = heapless::Vec::new();
    found.push(start).map_err(|_| GraphError::CapacityExceeded)?;
    let mut head = 0usize;

    while let Some(&id) = found.get(head) {
        head = head.saturating_add(1);
        let comp = g.comp(id).ok_or(GraphError::Corrupted)?;
        let up = g.upstream(comp);
        let down = g.downstream(comp);
        let neighbors = up.iter().map(|n| (*n, true)).chain(down.iter().map(|n| (*n, false)));
        for (next, is_upstream) in neighbors {
            if found.contains(&next) {
                continue;
            }
            let peer = g.comp(next).ok_or(GraphError::Corrupted)?;
            let peer_ppl = g.pipeline(peer.pipeline()).ok_or(GraphError::Corrupted)?;
            if peer_ppl.id() == home.id() || peer_ppl.scheduled_with(home) {
                found.push(next).map_err(|_| GraphError::CapacityExceeded)?;
                continue;
            }
            if capture_start && is_upstream && !can_supply(g, peer_ppl) {
                platform::debug!("{} {}: {} cannot supply data", start, cmd, peer_ppl.id());
                return Err(TriggerError::NoData {
                    pipeline: peer_ppl.id(),
                });
            }
            if !boundary.contains(&peer_ppl.id()) {
                boundary
                    .push(peer_ppl.id())
                    .map_err(|_| GraphError::CapacityExceeded)?;
            }
        }
    }

    let mut order = topo_order(g, &found)?;
    if !cmd.is_start_like() {
        order.reverse();
    }
    Ok(Plan { order, boundary })
}

/// Stable producer-before-consumer order of `set`.
///
/// Ties keep `set` order. A cycle is broken by emitting the earliest
/// remaining member.
fn topo_order(g: &Graph, set: &[CompId]) -> Result<CompList, GraphError> {
    let mut pending: heapless::Vec<usize, MAX_COMPONENTS> = heapless::Vec::new();
    for id in set {
        let comp = g.comp(*id).ok_or(GraphError::Corrupted)?;
        let producers = g.upstream(comp).iter().filter(|p| set.contains(p)).count();
        pending.push(producers).map_err(|_| GraphError::CapacityExceeded)?;
    }

    let mut done: heapless::Vec<bool, MAX_COMPONENTS> = set.iter().map(|_| false).collect();
    let mut order = CompList::new();
    while order.len() < set.len() {
        let ready = set.iter().enumerate().position(|(i, _)| {
            !done.get(i).copied().unwrap_or(true) && pending.get(i).copied() == Some(0)
        });
        let next = ready.or_else(|| done.iter().position(|d| !d));
        let Some(i) = next else { break };
        let id = *set.get(i).ok_or(GraphError::Corrupted)?;
        if let Some(d) = done.get_mut(i) {
            *d = true;
        }
        order.push(id).map_err(|_| GraphError::CapacityExceeded)?;

        let comp = g.comp(id).ok_or(GraphError::Corrupted)?;
        for consumer in g.downstream(comp) {
            if let Some(j) = set.iter().position(|c| *c == consumer) {
                if let Some(n) = pending.get_mut(j) {
                    *n = n.saturating_sub(1);
                }
            }
        }
    }
    Ok(order)
}

/// Everything reachable from `from` inside `plan`, in walk direction.
fn prune(g: &Graph, from: CompId, downstream: bool, plan: &[CompId], skip: &mut CompList) {
    let mut queue = CompList::new();
    let _ = queue.push(from);
    let mut head = 0usize;
    while let Some(&id) = queue.get(head) {
        head = head.saturating_add(1);
        let Some(comp) = g.comp(id) else { continue };
        let next = if downstream {
            g.downstream(comp)
        } else {
            g.upstream(comp)
        };
        for n in next {
            if plan.contains(&n) && !skip.contains(&n) && !queue.contains(&n) {
                let _ = skip.push(n);
                let _ = queue.push(n);
            }
        }
    }
}

fn take_ops(g: &mut Graph, id: CompId) -> Result<alloc::boxed::Box<dyn ComponentOps>, TriggerError> {
    let comp = g.comp_mut(id).ok_or(GraphError::UnknownComponent(id))?;
    comp.ops.take().ok_or(TriggerError::Reentered(id))
}

// ── Walks ────────────────────────────────────────────────────────────────────

enum Step {
    Call {
        ops: alloc::boxed::Box<dyn ComponentOps>,
        pipeline: PipelineId,
        from: CompState,
        transition: Transition,
    },
    Refused(CompError),
}

impl Topology {
    /// Apply `cmd` to the subgraph reachable from `start`.
    ///
    /// # Errors
    ///
    /// - [`TriggerError::NoData`]: capture start into an inactive upstream
    ///   pipeline; nothing was changed.
    /// - [`TriggerError::Component`]: first component that refused; other
    ///   branches were still walked and keep their new state.
    /// - [`TriggerError::Reentered`]: fatal, the walk met a component that
    ///   is mid-callback.
    pub fn trigger(&self, start: CompId, cmd: TriggerCmd) -> Result<WalkReport, TriggerError> {
        let plan = self.with_graph(|g| discover(g, start, cmd))?;
        let downstream = cmd.is_start_like();

        let mut visited = CompList::new();
        let mut skip = CompList::new();
        let mut failure: Option<TriggerError> = None;

        for id in &plan.order {
            if skip.contains(id) {
                continue;
            }
            let step = self.with_graph(|g| -> Result<Step, TriggerError> {
                let ops = take_ops(g, *id)?;
                let comp = g.comp_mut(*id).ok_or(GraphError::Corrupted)?;
                match comp.state.on_trigger(cmd, comp.resume_to) {
                    Ok(transition) => Ok(Step::Call {
                        ops,
                        pipeline: comp.pipeline(),
                        from: comp.state,
                        transition,
                    }),
                    Err(e) => {
                        comp.ops = Some(ops);
                        Ok(Step::Refused(e.into()))
                    }
                }
            })?;

            let outcome = match step {
                Step::Refused(error) => Err(error),
                Step::Call {
                    mut ops,
                    pipeline,
                    from,
                    transition,
                } => {
                    let mut cx = TriggerContext {
                        topology: self,
                        comp: *id,
                        pipeline,
                        cmd,
                        from,
                        to: transition.to,
                        already_set: transition.already_set,
                    };
                    let result = ops.trigger(&mut cx);
                    self.with_graph(|g| {
                        let comp = g.comp_mut(*id).ok_or(GraphError::Corrupted)?;
                        comp.ops = Some(ops);
                        if result.is_ok() {
                            comp.commit(cmd, transition.to);
                        }
                        Ok::<_, GraphError>(())
                    })?;
                    visited.push(*id).map_err(|_| GraphError::CapacityExceeded)?;
                    result
                }
            };

            match outcome {
                Ok(TriggerOutcome::Continue) => {}
                Ok(TriggerOutcome::PathStop) => {
                    platform::trace!("{} {}: path stop", id, cmd);
                    self.with_graph(|g| prune(g, *id, downstream, &plan.order, &mut skip));
                }
                Err(error) => {
                    platform::warn!("{} {} failed: {}", id, cmd, error);
                    self.with_graph(|g| prune(g, *id, downstream, &plan.order, &mut skip));
                    failure.get_or_insert(TriggerError::Component { comp: *id, error });
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        let status = if plan.boundary.is_empty() {
            WalkStatus::Complete
        } else {
            platform::debug!("{} {}: stopped at {} boundary pipelines", start, cmd, plan.boundary.len());
            WalkStatus::BoundaryStop(plan.boundary)
        };
        Ok(WalkReport { visited, status })
    }

    /// Members of `pid` plus every pipeline it drives on the same core, in
    /// producer-before-consumer order.
    fn domain_order(&self, pid: PipelineId, with_driven: bool) -> Result<CompList, GraphError> {
        self.with_graph(|g| {
            let owner = g.pipeline(pid).ok_or(GraphError::UnknownPipeline(pid))?;
            if !owner.complete {
                return Err(GraphError::PipelineIncomplete(pid));
            }
            let mut set = CompList::new();
            for p in g.pipelines.iter() {
                let driven = with_driven
                    && p.cfg.sched_id() == pid
                    && p.cfg.core == owner.cfg.core
                    && p.complete;
                if p.id() == pid || driven {
                    for m in &p.members {
                        set.push(*m).map_err(|_| GraphError::CapacityExceeded)?;
                    }
                }
            }
            topo_order(g, &set)
        })
    }

    /// One copy pass over the pipeline's scheduling domain.
    ///
    /// Only `Active`/`Drain` components are copied. `NoData` from a
    /// component is not an error.
    ///
    /// # Errors
    ///
    /// [`CopyError::Xrun`] on the first failing component; its pipeline's
    /// xrun counter is incremented and the pass stops.
    pub fn pipeline_copy(&self, pid: PipelineId) -> Result<CopyStats, CopyError> {
        let order = self.domain_order(pid, true)?;
        let mut stats = CopyStats::default();

        for id in &order {
            let taken = self.with_graph(|g| -> Option<(alloc::boxed::Box<dyn ComponentOps>, BufList, BufList)> {
                let comp = g.comp(*id)?;
                if !comp.state.is_running() || comp.in_transition() {
                    return None;
                }
                let collect = |ids: &[crate::BufferId]| -> BufList {
                    ids.iter()
                        .filter_map(|b| g.buffer(*b).map(|slot| slot.buf.clone()))
                        .collect()
                };
                let sources = collect(&comp.sources);
                let sinks = collect(&comp.sinks);
                let ops = g.comp_mut(*id)?.ops.take()?;
                Some((ops, sources, sinks))
            });
            let Some((mut ops, sources, sinks)) = taken else {
                continue;
            };

            let mut io = CopyIo {
                sources: &sources,
                sinks: &sinks,
            };
            let result = ops.copy(&mut io);

            self.with_graph(|g| {
                let comp = g.comp_mut(*id).ok_or(GraphError::Corrupted)?;
                comp.ops = Some(ops);
                comp.copy_count = comp.copy_count.saturating_add(1);
                let owner = comp.pipeline();
                if result.is_err() {
                    if let Some(p) = g.pipeline_mut(owner) {
                        p.xrun_count = p.xrun_count.saturating_add(1);
                    }
                }
                Ok::<_, GraphError>(())
            })?;

            match result {
                Ok(CopyStatus::Copied(n)) => {
                    stats.copied = stats.copied.saturating_add(1);
                    stats.bytes = stats.bytes.saturating_add(n);
                }
                Ok(CopyStatus::NoData) => stats.idle = stats.idle.saturating_add(1),
                Err(error) => {
                    platform::warn!("{} xrun at {}: {}", pid, id, error);
                    return Err(CopyError::Xrun { comp: *id, error });
                }
            }
        }
        Ok(stats)
    }

    /// Run `f` on one component's operations with the lock released.
    fn call_ops<R>(
        &self,
        id: CompId,
        f: impl FnOnce(&mut dyn ComponentOps) -> R,
    ) -> Result<R, TriggerError> {
        let mut ops = self.with_graph(|g| take_ops(g, id))?;
        let result = f(&mut *ops);
        self.with_graph(|g| {
            let comp = g.comp_mut(id).ok_or(GraphError::Corrupted)?;
            comp.ops = Some(ops);
            Ok::<_, GraphError>(())
        })?;
        Ok(result)
    }

    fn first_running(&self, members: &[CompId]) -> Option<CompId> {
        self.with_graph(|g| {
            members
                .iter()
                .copied()
                .find(|id| g.comp(*id).is_some_and(|c| c.state.is_running()))
        })
    }

    /// Deliver stream parameters to every member, upstream-first.
    ///
    /// # Errors
    ///
    /// `Busy` if the pipeline is streaming, otherwise the first driver
    /// refusal (later members are not called).
    pub fn pipeline_params(&self, pid: PipelineId, params: &StreamParams) -> Result<(), TriggerError> {
        let order = self.domain_order(pid, false)?;
        if let Some(comp) = self.first_running(&order) {
            return Err(TriggerError::Component {
                comp,
                error: CompError::Busy,
            });
        }
        for id in &order {
            self.call_ops(*id, |ops| ops.params(params))?
                .map_err(|error| TriggerError::Component { comp: *id, error })?;
        }
        Ok(())
    }

    /// Prepare every `Ready` member, upstream-first (`Ready → Prepare`).
    ///
    /// Members already prepared or streaming are left alone.
    ///
    /// # Errors
    ///
    /// The first driver refusal; members before it stay prepared.
    pub fn pipeline_prepare(&self, pid: PipelineId) -> Result<(), TriggerError> {
        let order = self.domain_order(pid, false)?;
        for id in &order {
            let ready = self.with_graph(|g| g.comp(*id).is_some_and(|c| c.state == CompState::Ready));
            if !ready {
                continue;
            }
            self.call_ops(*id, |ops| ops.prepare())?
                .map_err(|error| TriggerError::Component { comp: *id, error })?;
            self.with_graph(|g| {
                if let Some(comp) = g.comp_mut(*id) {
                    comp.state = CompState::Prepare;
                }
            });
        }
        Ok(())
    }

    /// Return an idle pipeline to its freshly completed condition:
    /// every member `reset` (downstream-first) and back to `Ready`, every
    /// owned buffer emptied.
    ///
    /// # Errors
    ///
    /// `Busy` if any member is streaming; nothing is reset in that case.
    pub fn pipeline_reset(&self, pid: PipelineId) -> Result<(), TriggerError> {
        let mut order = self.domain_order(pid, false)?;
        if let Some(comp) = self.first_running(&order) {
            return Err(TriggerError::Component {
                comp,
                error: CompError::Busy,
            });
        }
        order.reverse();
        let mut failure = None;
        for id in &order {
            if let Err(error) = self.call_ops(*id, |ops| ops.reset())? {
                platform::warn!("{} reset failed: {}", id, error);
                failure.get_or_insert(TriggerError::Component { comp: *id, error });
            }
            self.with_graph(|g| {
                if let Some(comp) = g.comp_mut(*id) {
                    comp.state = CompState::Ready;
                    comp.resume_to = None;
                }
            });
        }
        let buffers: heapless::Vec<Arc<CompBuffer>, { platform::config::MAX_BUFFERS }> =
            self.with_graph(|g| {
                g.pipeline(pid)
                    .map(|p| {
                        p.buffers
                            .iter()
                            .filter_map(|b| g.buffer(*b).map(|slot| slot.buf.clone()))
                            .collect()
                    })
                    .unwrap_or_default()
            });
        for buf in &buffers {
            buf.reset();
        }
        failure.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use alloc::boxed::Box;

    use platform::mocks::{MockCache, MockHeap};
    use platform::CoreId;

    use super::*;
    use crate::component::{CompConfig, ComponentDriver, EndpointKind};
    use crate::driver::DriverRegistry;
    use crate::pipeline::PipelineConfig;
    use crate::topology::{BufferDesc, PipelineDesc};
    use crate::BufferId;

    struct Nop;

    impl ComponentOps for Nop {
        fn trigger(&mut self, _cx: &mut TriggerContext<'_>) -> Result<TriggerOutcome, CompError> {
            Ok(TriggerOutcome::Continue)
        }

        fn copy(&mut self, _io: &mut CopyIo<'_>) -> Result<CopyStatus, CompError> {
            Ok(CopyStatus::NoData)
        }
    }

    struct NopDriver;

    impl ComponentDriver for NopDriver {
        fn new(&self, _cfg: &CompConfig, _heap: &dyn platform::Allocator) -> Result<Box<dyn ComponentOps>, CompError> {
            Ok(Box::new(Nop))
        }
    }

    fn topology() -> Topology {
        let mut drivers = DriverRegistry::new();
        drivers.register(1, Arc::new(NopDriver)).unwrap();
        Topology::new(drivers, Arc::new(MockHeap::new()), Arc::new(MockCache::new()))
    }

    fn comp(id: u32, endpoint: EndpointKind) -> CompConfig {
        CompConfig {
            id: CompId(id),
            pipeline: PipelineId(0),
            comp_type: 1,
            endpoint,
        }
    }

    fn chain(t: &Topology) {
        let comps = [
            comp(1, EndpointKind::Host),
            comp(2, EndpointKind::Internal),
            comp(3, EndpointKind::Dai),
        ];
        let buffers = [
            BufferDesc { id: BufferId(10), size: 64, producer: CompId(1), consumer: CompId(2) },
            BufferDesc { id: BufferId(11), size: 64, producer: CompId(2), consumer: CompId(3) },
        ];
        t.build(&PipelineDesc {
            pipeline: PipelineConfig::new(PipelineId(1), CoreId::PRIMARY, Direction::Playback),
            comps: &comps,
            buffers: &buffers,
        })
        .unwrap();
    }

    #[test]
    fn topo_order_puts_producers_first() {
        let t = topology();
        chain(&t);
        let order = t.with_graph(|g| topo_order(g, &[CompId(3), CompId(1), CompId(2)]).unwrap());
        assert_eq!(order.as_slice(), &[CompId(1), CompId(2), CompId(3)]);
    }

    #[test]
    fn stop_walks_downstream_first() {
        let t = topology();
        chain(&t);
        t.trigger(CompId(1), TriggerCmd::Start).unwrap();
        let report = t.trigger(CompId(1), TriggerCmd::Stop).unwrap();
        assert_eq!(report.visited.as_slice(), &[CompId(3), CompId(2), CompId(1)]);
        assert_eq!(report.status, WalkStatus::Complete);
    }

    #[test]
    fn prepare_moves_ready_members_only() {
        let t = topology();
        chain(&t);
        t.pipeline_prepare(PipelineId(1)).unwrap();
        assert_eq!(t.comp_info(CompId(2)).unwrap().state, CompState::Prepare);
        t.trigger(CompId(1), TriggerCmd::Start).unwrap();
        t.pipeline_prepare(PipelineId(1)).unwrap();
        assert_eq!(t.comp_info(CompId(2)).unwrap().state, CompState::Active);
    }

    #[test]
    fn reset_refuses_streaming_pipeline() {
        let t = topology();
        chain(&t);
        t.trigger(CompId(1), TriggerCmd::Start).unwrap();
        let err = t.pipeline_reset(PipelineId(1)).unwrap_err();
        assert!(matches!(err, TriggerError::Component { error: CompError::Busy, .. }));
    }

    #[test]
    fn copy_skips_idle_pipeline() {
        let t = topology();
        chain(&t);
        let stats = t.pipeline_copy(PipelineId(1)).unwrap();
        assert_eq!(stats, CopyStats::default());
        assert_eq!(t.comp_info(CompId(1)).unwrap().copy_count, 0);
    }

    #[test]
    fn boundary_status_maps_to_epipe() {
        let mut list = heapless::Vec::new();
        list.push(PipelineId(2)).unwrap();
        assert_eq!(WalkStatus::BoundaryStop(list).errno(), -32);
        assert_eq!(WalkStatus::Complete.errno(), 0);
    }
}
