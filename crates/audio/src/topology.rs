//! Topology arena and construction.
//!
//! Pipelines, components and buffers live in fixed-capacity tables addressed
//! by host-assigned ids. Graph edges are the `sources`/`sinks` id lists on
//! each component plus the producer/consumer ids on each buffer, so no
//! record ever points at another.
//!
//! # Locking
//!
//! The whole arena sits behind one [`CriticalSectionRawMutex`]. The lock is
//! held for a single step (one lookup, one state commit, one table edit) and
//! never while a driver callback runs. Driver operations are moved out of
//! the arena for the duration of the callback; a walk that reaches a
//! component whose operations are out has re-entered it.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::config::{MAX_BUFFERS, MAX_COMPONENTS, MAX_PIPELINES};
use platform::{Allocator, CacheOps, MemCaps, MemZone};

use crate::buffer::CompBuffer;
use crate::component::{CompConfig, CompInfo, Component, ComponentOps};
use crate::driver::DriverRegistry;
use crate::error::GraphError;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineInfo};
use crate::state::CompState;
use crate::{BufferId, CompId, PipelineId};

/// Buffer to create and connect as part of a [`PipelineDesc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Buffer id.
    pub id: BufferId,
    /// Size in bytes.
    pub size: usize,
    /// Producer component.
    pub producer: CompId,
    /// Consumer component.
    pub consumer: CompId,
}

/// Everything needed to build one pipeline in a single call.
#[derive(Debug, Clone, Copy)]
pub struct PipelineDesc<'a> {
    /// Pipeline parameters.
    pub pipeline: PipelineConfig,
    /// Components, in creation order.
    pub comps: &'a [CompConfig],
    /// Buffers with their connections.
    pub buffers: &'a [BufferDesc],
}

pub(crate) struct BufferSlot {
    pub(crate) id: BufferId,
    pub(crate) pipeline: PipelineId,
    pub(crate) producer: Option<CompId>,
    pub(crate) consumer: Option<CompId>,
    pub(crate) buf: Arc<CompBuffer>,
}

/// The arena, only ever touched under the topology lock.
#[derive(Default)]
pub(crate) struct Graph {
    pub(crate) pipelines: heapless::Vec<Pipeline, MAX_PIPELINES>,
    pub(crate) comps: heapless::Vec<Component, MAX_COMPONENTS>,
    pub(crate) buffers: heapless::Vec<BufferSlot, MAX_BUFFERS>,
}

type Rejected = (GraphError, Option<Box<dyn ComponentOps>>);

/// Resources unlinked from the arena, released after the lock is dropped.
#[derive(Default)]
struct Removed {
    ops: heapless::Vec<Box<dyn ComponentOps>, MAX_COMPONENTS>,
    buffers: heapless::Vec<Arc<CompBuffer>, MAX_BUFFERS>,
}

impl Graph {
    pub(crate) fn comp(&self, id: CompId) -> Option<&Component> {
        self.comps.iter().find(|c| c.id() == id)
    }

    pub(crate) fn comp_mut(&mut self, id: CompId) -> Option<&mut Component> {
        self.comps.iter_mut().find(|c| c.id() == id)
    }

    pub(crate) fn pipeline(&self, id: PipelineId) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.id() == id)
    }

    pub(crate) fn pipeline_mut(&mut self, id: PipelineId) -> Option<&mut Pipeline> {
        self.pipelines.iter_mut().find(|p| p.id() == id)
    }

    pub(crate) fn buffer(&self, id: BufferId) -> Option<&BufferSlot> {
        self.buffers.iter().find(|b| b.id == id)
    }

    /// Producers feeding `comp`, one per connected input buffer.
    pub(crate) fn upstream(&self, comp: &Component) -> heapless::Vec<CompId, { platform::config::MAX_COMP_PORTS }> {
        comp.sources
            .iter()
            .filter_map(|b| self.buffer(*b).and_then(|slot| slot.producer))
            .collect()
    }

    /// Consumers fed by `comp`, one per connected output buffer.
    pub(crate) fn downstream(&self, comp: &Component) -> heapless::Vec<CompId, { platform::config::MAX_COMP_PORTS }> {
        comp.sinks
            .iter()
            .filter_map(|b| self.buffer(*b).and_then(|slot| slot.consumer))
            .collect()
    }

    pub(crate) fn pipeline_info(&self, p: &Pipeline) -> PipelineInfo {
        let endpoint = match p.cfg.direction {
            crate::Direction::Playback => p.source,
            crate::Direction::Capture => p.sink,
        };
        let state = endpoint
            .and_then(|id| self.comp(id))
            .map_or(CompState::Uninit, |c| c.state);
        PipelineInfo {
            config: p.cfg,
            source: p.source,
            sink: p.sink,
            state,
            complete: p.complete,
            xrun_count: p.xrun_count,
            members: p.members.len(),
        }
    }

    /// Unlink a component and every buffer attached to it.
    fn unlink_comp(&mut self, id: CompId, removed: &mut Removed) -> Result<(), GraphError> {
        let pos = self
            .comps
            .iter()
            .position(|c| c.id() == id)
            .ok_or(GraphError::UnknownComponent(id))?;
        let comp = self.comps.swap_remove(pos);
        if let Some(p) = self.pipeline_mut(comp.pipeline()) {
            p.members.retain(|m| *m != id);
        }
        for buf in comp.sources.iter().chain(comp.sinks.iter()) {
            self.unlink_buffer(*buf, removed);
        }
        if let Some(ops) = comp.ops {
            removed
                .ops
                .push(ops)
                .map_err(|_| GraphError::CapacityExceeded)?;
        }
        Ok(())
    }

    /// Unlink a buffer and detach it from both endpoints.
    fn unlink_buffer(&mut self, id: BufferId, removed: &mut Removed) {
        let Some(pos) = self.buffers.iter().position(|b| b.id == id) else {
            return;
        };
        let slot = self.buffers.swap_remove(pos);
        for comp in self.comps.iter_mut() {
            comp.sources.retain(|b| *b != id);
            comp.sinks.retain(|b| *b != id);
        }
        if let Some(p) = self.pipeline_mut(slot.pipeline) {
            p.buffers.retain(|b| *b != id);
        }
        // Capacity equals the arena's, so this cannot overflow.
        let _ = removed.buffers.push(slot.buf);
    }

    /// Insert a freshly created component. On refusal the operations are
    /// handed back so the caller can free them outside the lock.
    fn insert_comp(&mut self, cfg: CompConfig, ops: Box<dyn ComponentOps>) -> Result<(), Rejected> {
        if self.comp(cfg.id).is_some() {
            return Err((GraphError::DuplicateComponent(cfg.id), Some(ops)));
        }
        if self.comps.is_full() {
            return Err((GraphError::CapacityExceeded, Some(ops)));
        }
        let Some(p) = self.pipeline_mut(cfg.pipeline) else {
            return Err((GraphError::UnknownPipeline(cfg.pipeline), Some(ops)));
        };
        if p.complete {
            return Err((GraphError::PipelineComplete(cfg.pipeline), Some(ops)));
        }
        if p.members.push(cfg.id).is_err() {
            return Err((GraphError::CapacityExceeded, Some(ops)));
        }
        if let Err(comp) = self.comps.push(Component::new(cfg, ops)) {
            if let Some(p) = self.pipeline_mut(cfg.pipeline) {
                p.members.retain(|m| *m != cfg.id);
            }
            return Err((GraphError::CapacityExceeded, comp.ops));
        }
        Ok(())
    }

    fn ensure_idle(&self, id: CompId) -> Result<(), GraphError> {
        let comp = self.comp(id).ok_or(GraphError::UnknownComponent(id))?;
        if comp.state.is_running() || comp.in_transition() {
            return Err(GraphError::Busy(id));
        }
        Ok(())
    }
}

/// Shared topology: the locked arena plus the services used to build it.
///
/// Shared between cores behind an `Arc`.
pub struct Topology {
    pub(crate) graph: Mutex<CriticalSectionRawMutex, RefCell<Graph>>,
    drivers: DriverRegistry,
    pub(crate) heap: Arc<dyn Allocator>,
    cache: Arc<dyn CacheOps>,
    /// Freed buffers a caller still held a handle to.
    orphans: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<Arc<CompBuffer>, MAX_BUFFERS>>>,
}

impl Topology {
    /// Empty topology using `drivers` to create components and `heap` for
    /// buffer storage.
    #[must_use]
    pub fn new(drivers: DriverRegistry, heap: Arc<dyn Allocator>, cache: Arc<dyn CacheOps>) -> Self {
        Self {
            graph: Mutex::new(RefCell::new(Graph::default())),
            drivers,
            heap,
            cache,
            orphans: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    pub(crate) fn with_graph<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        self.graph.lock(|g| f(&mut g.borrow_mut()))
    }

    // ── Pipelines ────────────────────────────────────────────────────────────

    /// Create an empty pipeline.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicatePipeline`] or [`GraphError::CapacityExceeded`].
    pub fn pipeline_new(&self, cfg: PipelineConfig) -> Result<(), GraphError> {
        self.with_graph(|g| {
            if g.pipeline(cfg.id).is_some() {
                return Err(GraphError::DuplicatePipeline(cfg.id));
            }
            g.pipelines
                .push(Pipeline::new(cfg))
                .map_err(|_| GraphError::CapacityExceeded)
        })
    }

    /// Mark a pipeline complete: every member moves `Uninit → Ready` and the
    /// source/sink endpoints are resolved.
    ///
    /// The source is the first member (creation order) with no producer in
    /// the same pipeline; the sink is the first with no consumer in it.
    ///
    /// # Errors
    ///
    /// Unknown, empty or already complete pipelines are rejected.
    pub fn pipeline_complete(&self, id: PipelineId) -> Result<(), GraphError> {
        self.with_graph(|g| {
            let p = g.pipeline(id).ok_or(GraphError::UnknownPipeline(id))?;
            if p.complete {
                return Err(GraphError::PipelineComplete(id));
            }
            if p.members.is_empty() {
                return Err(GraphError::PipelineEmpty(id));
            }
            let in_pipeline = |c: &CompId| g.comp(*c).is_some_and(|c| c.pipeline() == id);
            let mut source = None;
            let mut sink = None;
            for member in &p.members {
                let comp = g.comp(*member).ok_or(GraphError::Corrupted)?;
                if source.is_none() && !g.upstream(comp).iter().any(in_pipeline) {
                    source = Some(*member);
                }
                if sink.is_none() && !g.downstream(comp).iter().any(in_pipeline) {
                    sink = Some(*member);
                }
            }
            let members = p.members.clone();
            for member in &members {
                if let Some(comp) = g.comp_mut(*member) {
                    if comp.state == CompState::Uninit {
                        comp.state = CompState::Ready;
                    }
                }
            }
            let p = g.pipeline_mut(id).ok_or(GraphError::Corrupted)?;
            p.source = source;
            p.sink = sink;
            p.complete = true;
            Ok(())
        })
    }

    /// Destroy a pipeline with all its components and buffers.
    ///
    /// # Errors
    ///
    /// [`GraphError::Busy`] if any member is streaming or mid-callback;
    /// nothing is freed in that case.
    pub fn pipeline_free(&self, id: PipelineId) -> Result<(), GraphError> {
        let removed = self.with_graph(|g| {
            let p = g.pipeline(id).ok_or(GraphError::UnknownPipeline(id))?;
            for member in &p.members {
                g.ensure_idle(*member)?;
            }
            let members = p.members.clone();
            let buffers = p.buffers.clone();
            let mut removed = Removed::default();
            for member in &members {
                g.unlink_comp(*member, &mut removed)?;
            }
            for buf in &buffers {
                g.unlink_buffer(*buf, &mut removed);
            }
            g.pipelines.retain(|p| p.id() != id);
            Ok::<_, GraphError>(removed)
        })?;
        self.release(removed);
        Ok(())
    }

    // ── Components ───────────────────────────────────────────────────────────

    /// Create a component through its type's driver.
    ///
    /// # Errors
    ///
    /// Unknown driver or pipeline, duplicate id, a complete pipeline, a full
    /// table, or the driver's own refusal.
    pub fn comp_new(&self, cfg: CompConfig) -> Result<(), GraphError> {
        let driver = self
            .drivers
            .get(cfg.comp_type)
            .ok_or(GraphError::UnknownDriver(cfg.comp_type))?;
        self.with_graph(|g| {
            let p = g
                .pipeline(cfg.pipeline)
                .ok_or(GraphError::UnknownPipeline(cfg.pipeline))?;
            if p.complete {
                return Err(GraphError::PipelineComplete(cfg.pipeline));
            }
            if g.comp(cfg.id).is_some() {
                return Err(GraphError::DuplicateComponent(cfg.id));
            }
            Ok(())
        })?;
        let ops = driver.new(&cfg, &*self.heap).map_err(GraphError::Driver)?;
        if let Err((e, ops)) = self.with_graph(|g| g.insert_comp(cfg, ops)) {
            if let Some(mut ops) = ops {
                ops.free(&*self.heap);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Destroy a component and every buffer attached to it.
    ///
    /// # Errors
    ///
    /// [`GraphError::Busy`] while the component streams or is mid-callback.
    pub fn comp_free(&self, id: CompId) -> Result<(), GraphError> {
        let removed = self.with_graph(|g| {
            g.ensure_idle(id)?;
            let mut removed = Removed::default();
            g.unlink_comp(id, &mut removed)?;
            Ok::<_, GraphError>(removed)
        })?;
        self.release(removed);
        Ok(())
    }

    // ── Buffers ──────────────────────────────────────────────────────────────

    /// Allocate a ring buffer of `size` bytes owned by `pipeline`.
    ///
    /// # Errors
    ///
    /// Allocation failure is returned as-is, never retried.
    pub fn buffer_new(&self, id: BufferId, pipeline: PipelineId, size: usize) -> Result<(), GraphError> {
        self.with_graph(|g| {
            g.pipeline(pipeline)
                .ok_or(GraphError::UnknownPipeline(pipeline))?;
            if g.buffer(id).is_some() {
                return Err(GraphError::DuplicateBuffer(id));
            }
            Ok(())
        })?;
        let block = self
            .heap
            .alloc(MemZone::Buffer, MemCaps::RAM | MemCaps::CACHE | MemCaps::SHARED, size)?;
        let buf = Arc::new(CompBuffer::new(id, block, self.cache.clone()));
        let result = self.with_graph(|g| {
            if g.buffer(id).is_some() {
                return Err(GraphError::DuplicateBuffer(id));
            }
            let p = g
                .pipeline_mut(pipeline)
                .ok_or(GraphError::UnknownPipeline(pipeline))?;
            p.buffers.push(id).map_err(|_| GraphError::CapacityExceeded)?;
            let slot = BufferSlot {
                id,
                pipeline,
                producer: None,
                consumer: None,
                buf: buf.clone(),
            };
            if g.buffers.push(slot).is_err() {
                if let Some(p) = g.pipeline_mut(pipeline) {
                    p.buffers.retain(|b| *b != id);
                }
                return Err(GraphError::CapacityExceeded);
            }
            Ok(())
        });
        if result.is_err() {
            self.release_buffer(buf);
        }
        result
    }

    /// Attach `buffer` between `producer` and `consumer`.
    ///
    /// # Errors
    ///
    /// Unknown ids, an already connected buffer, or full port lists.
    pub fn connect(&self, producer: CompId, buffer: BufferId, consumer: CompId) -> Result<(), GraphError> {
        self.with_graph(|g| {
            let slot = g.buffer(buffer).ok_or(GraphError::UnknownBuffer(buffer))?;
            if slot.producer.is_some() || slot.consumer.is_some() {
                return Err(GraphError::BufferAttached(buffer));
            }
            let p = g.comp(producer).ok_or(GraphError::UnknownComponent(producer))?;
            let c = g.comp(consumer).ok_or(GraphError::UnknownComponent(consumer))?;
            if p.sinks.is_full() || c.sources.is_full() {
                return Err(GraphError::CapacityExceeded);
            }
            g.comp_mut(producer)
                .ok_or(GraphError::Corrupted)?
                .sinks
                .push(buffer)
                .map_err(|_| GraphError::CapacityExceeded)?;
            g.comp_mut(consumer)
                .ok_or(GraphError::Corrupted)?
                .sources
                .push(buffer)
                .map_err(|_| GraphError::CapacityExceeded)?;
            let slot = g
                .buffers
                .iter_mut()
                .find(|b| b.id == buffer)
                .ok_or(GraphError::Corrupted)?;
            slot.producer = Some(producer);
            slot.consumer = Some(consumer);
            Ok(())
        })
    }

    // ── Atomic build ─────────────────────────────────────────────────────────

    /// Build a whole pipeline: create it, its components and buffers,
    /// connect them and complete it.
    ///
    /// Any failure (including an allocation failure) frees everything
    /// already allocated for this pipeline before returning.
    ///
    /// # Errors
    ///
    /// The first error encountered.
    pub fn build(&self, desc: &PipelineDesc<'_>) -> Result<(), GraphError> {
        let id = desc.pipeline.id;
        self.pipeline_new(desc.pipeline)?;
        let result = self.build_members(desc);
        if let Err(e) = result {
            platform::warn!("{} build failed: {}", id, e);
            // Nothing in a half-built pipeline can be streaming.
            let _ = self.pipeline_free(id);
        }
        result
    }

    fn build_members(&self, desc: &PipelineDesc<'_>) -> Result<(), GraphError> {
        let id = desc.pipeline.id;
        for comp in desc.comps {
            self.comp_new(CompConfig {
                pipeline: id,
                ..*comp
            })?;
        }
        for buf in desc.buffers {
            self.buffer_new(buf.id, id, buf.size)?;
            self.connect(buf.producer, buf.id, buf.consumer)?;
        }
        self.pipeline_complete(id)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Snapshot of a component.
    pub fn comp_info(&self, id: CompId) -> Option<CompInfo> {
        self.with_graph(|g| g.comp(id).map(Component::info))
    }

    /// Snapshot of a pipeline.
    pub fn pipeline_info(&self, id: PipelineId) -> Option<PipelineInfo> {
        self.with_graph(|g| g.pipeline(id).map(|p| g.pipeline_info(p)))
    }

    /// Shared handle to a buffer.
    pub fn buffer(&self, id: BufferId) -> Option<Arc<CompBuffer>> {
        self.with_graph(|g| g.buffer(id).map(|b| b.buf.clone()))
    }

    /// Producer and consumer of a buffer.
    pub fn buffer_ends(&self, id: BufferId) -> Option<(Option<CompId>, Option<CompId>)> {
        self.with_graph(|g| g.buffer(id).map(|b| (b.producer, b.consumer)))
    }

    /// Ids of every pipeline, in creation order.
    pub fn pipelines(&self) -> heapless::Vec<PipelineId, MAX_PIPELINES> {
        self.with_graph(|g| g.pipelines.iter().map(Pipeline::id).collect())
    }

    // ── Release ──────────────────────────────────────────────────────────────

    fn release(&self, removed: Removed) {
        for mut ops in removed.ops {
            ops.free(&*self.heap);
        }
        for buf in removed.buffers {
            self.release_buffer(buf);
        }
        self.reclaim();
    }

    fn release_buffer(&self, buf: Arc<CompBuffer>) {
        match Arc::try_unwrap(buf) {
            Ok(buf) => self.heap.free(buf.into_storage()),
            Err(shared) => {
                platform::debug!("{} freed while still referenced, deferring", shared.id());
                let rejected = self.orphans.lock(|o| o.borrow_mut().push(shared));
                if let Err(shared) = rejected {
                    // Every slot is parked already; the storage goes with the last handle.
                    platform::warn!("{} dropped without returning its storage", shared.id());
                }
            }
        }
    }

    /// Return the storage of freed buffers whose last outside handle has
    /// since been dropped. Returns how many are still held elsewhere.
    ///
    /// Runs after every free; call it directly once a long-lived
    /// [`Topology::buffer`] handle is let go.
    pub fn reclaim(&self) -> usize {
        let parked = self.orphans.lock(|o| core::mem::take(&mut *o.borrow_mut()));
        for buf in parked {
            match Arc::try_unwrap(buf) {
                Ok(buf) => self.heap.free(buf.into_storage()),
                Err(shared) => {
                    // Capacity matches what was taken out.
                    let _ = self.orphans.lock(|o| o.borrow_mut().push(shared));
                }
            }
        }
        self.deferred()
    }

    /// Freed buffers whose storage is still out because a handle survives.
    pub fn deferred(&self) -> usize {
        self.orphans.lock(|o| o.borrow().len())
    }
}
