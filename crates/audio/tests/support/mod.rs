//! Scripted component driver shared by the audio integration tests.
//!
//! Every trigger and copy is recorded; per-component behaviour is set from
//! the test after the topology is built.
#![allow(
    dead_code,
    missing_docs,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use audio::{
    BufferDesc, BufferId, CompConfig, CompError, CompId, CompState, ComponentDriver, ComponentOps,
    CopyIo, CopyStatus, Direction, EndpointKind, PipelineConfig, PipelineDesc, PipelineId,
    Topology, TriggerCmd, TriggerContext, TriggerError, TriggerOutcome, WalkReport,
};
use platform::mocks::{MockCache, MockHeap};
use platform::{Allocator, CoreId};

pub const COMP_TYPE: u32 = 7;

/// What a component's trigger callback does.
#[derive(Debug, Clone, Copy)]
pub enum OnTrigger {
    Continue,
    PathStop,
    Fail(CompError),
    /// Run a nested walk from this component, then continue.
    Nested(CompId, TriggerCmd),
}

/// One delivered trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub comp: CompId,
    pub cmd: TriggerCmd,
    pub from: CompState,
    pub to: CompState,
    pub already_set: bool,
}

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    nested: Mutex<Vec<Result<WalkReport, TriggerError>>>,
    copies: Mutex<Vec<CompId>>,
    freed: Mutex<Vec<CompId>>,
    script: Mutex<HashMap<CompId, OnTrigger>>,
    copy_fail: Mutex<HashSet<CompId>>,
}

impl Recorder {
    pub fn on_trigger(&self, comp: u32, behaviour: OnTrigger) {
        self.script.lock().unwrap().insert(CompId(comp), behaviour);
    }

    pub fn fail_copy(&self, comp: u32) {
        self.copy_fail.lock().unwrap().insert(CompId(comp));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Components triggered, in call order.
    pub fn order(&self) -> Vec<u32> {
        self.events().iter().map(|e| e.comp.0).collect()
    }

    pub fn nested(&self) -> Vec<Result<WalkReport, TriggerError>> {
        self.nested.lock().unwrap().clone()
    }

    pub fn copies(&self) -> Vec<u32> {
        self.copies.lock().unwrap().iter().map(|c| c.0).collect()
    }

    pub fn freed(&self) -> Vec<u32> {
        self.freed.lock().unwrap().iter().map(|c| c.0).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
        self.copies.lock().unwrap().clear();
    }
}

pub struct ScriptedDriver(pub Arc<Recorder>);

struct ScriptedOps {
    id: CompId,
    rec: Arc<Recorder>,
}

impl ComponentDriver for ScriptedDriver {
    fn new(&self, cfg: &CompConfig, _heap: &dyn Allocator) -> Result<Box<dyn ComponentOps>, CompError> {
        Ok(Box::new(ScriptedOps {
            id: cfg.id,
            rec: self.0.clone(),
        }))
    }
}

impl ComponentOps for ScriptedOps {
    fn trigger(&mut self, cx: &mut TriggerContext<'_>) -> Result<TriggerOutcome, CompError> {
        self.rec.events.lock().unwrap().push(Event {
            comp: cx.comp(),
            cmd: cx.cmd(),
            from: cx.from(),
            to: cx.to(),
            already_set: cx.already_set(),
        });
        let behaviour = self
            .rec
            .script
            .lock()
            .unwrap()
            .get(&self.id)
            .copied()
            .unwrap_or(OnTrigger::Continue);
        match behaviour {
            OnTrigger::Continue => Ok(TriggerOutcome::Continue),
            OnTrigger::PathStop => Ok(TriggerOutcome::PathStop),
            OnTrigger::Fail(e) => Err(e),
            OnTrigger::Nested(start, cmd) => {
                let result = cx.trigger_nested(start, cmd);
                self.rec.nested.lock().unwrap().push(result);
                Ok(TriggerOutcome::Continue)
            }
        }
    }

    /// Sources pass their bytes through; a component without sources
    /// produces 16 bytes of its own id.
    fn copy(&mut self, io: &mut CopyIo<'_>) -> Result<CopyStatus, CompError> {
        self.rec.copies.lock().unwrap().push(self.id);
        if self.rec.copy_fail.lock().unwrap().contains(&self.id) {
            return Err(CompError::Driver(5));
        }
        let mut chunk = [0u8; 16];
        let n = match io.sources.first() {
            Some(src) => src.read(&mut chunk),
            None => {
                chunk.fill(self.id.0 as u8);
                chunk.len()
            }
        };
        if n == 0 {
            return Ok(CopyStatus::NoData);
        }
        for sink in io.sinks {
            sink.write(&chunk[..n]).map_err(|_| CompError::Driver(32))?;
        }
        Ok(CopyStatus::Copied(n))
    }

    fn free(&mut self, _heap: &dyn Allocator) {
        self.rec.freed.lock().unwrap().push(self.id);
    }
}

pub struct Fixture {
    pub topology: Topology,
    pub rec: Arc<Recorder>,
    pub heap: Arc<MockHeap>,
    pub cache: Arc<MockCache>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_heap(MockHeap::new())
    }

    pub fn with_heap(heap: MockHeap) -> Self {
        let rec = Arc::new(Recorder::default());
        let heap = Arc::new(heap);
        let cache = Arc::new(MockCache::new());
        let mut drivers = audio::DriverRegistry::new();
        drivers
            .register(COMP_TYPE, Arc::new(ScriptedDriver(rec.clone())))
            .unwrap();
        let topology = Topology::new(drivers, heap.clone(), cache.clone());
        Self {
            topology,
            rec,
            heap,
            cache,
        }
    }

    pub fn state(&self, comp: u32) -> CompState {
        self.topology.comp_info(CompId(comp)).unwrap().state
    }

    pub fn trigger_count(&self, comp: u32) -> u32 {
        self.topology.comp_info(CompId(comp)).unwrap().trigger_count
    }

    /// Linear pipeline `ids[0] → ids[1] → …`; buffer `i` connects
    /// `ids[i]` to `ids[i + 1]` and gets id `buf_base + i`.
    pub fn linear(
        &self,
        cfg: PipelineConfig,
        ids: &[(u32, EndpointKind)],
        buf_base: u32,
    ) -> Result<(), audio::GraphError> {
        let comps: Vec<CompConfig> = ids.iter().map(|(id, ep)| comp(*id, *ep)).collect();
        let buffers: Vec<BufferDesc> = ids
            .windows(2)
            .enumerate()
            .map(|(i, w)| buffer(buf_base + i as u32, w[0].0, w[1].0))
            .collect();
        self.topology.build(&PipelineDesc {
            pipeline: cfg,
            comps: &comps,
            buffers: &buffers,
        })
    }
}

pub fn core(n: u8) -> CoreId {
    CoreId::new(n).unwrap()
}

pub fn playback(id: u32, core_id: u8) -> PipelineConfig {
    PipelineConfig::new(PipelineId(id), core(core_id), Direction::Playback)
}

pub fn capture(id: u32, core_id: u8) -> PipelineConfig {
    PipelineConfig::new(PipelineId(id), core(core_id), Direction::Capture)
}

pub fn comp(id: u32, endpoint: EndpointKind) -> CompConfig {
    CompConfig {
        id: CompId(id),
        pipeline: PipelineId(0),
        comp_type: COMP_TYPE,
        endpoint,
    }
}

pub fn buffer(id: u32, producer: u32, consumer: u32) -> BufferDesc {
    BufferDesc {
        id: BufferId(id),
        size: 64,
        producer: CompId(producer),
        consumer: CompId(consumer),
    }
}

/// `host → internal → dai` playback pipeline on `core_id`.
pub fn three_stage(f: &Fixture, pipeline: u32, first: u32, core_id: u8) {
    f.linear(
        playback(pipeline, core_id),
        &[
            (first, EndpointKind::Host),
            (first + 1, EndpointKind::Internal),
            (first + 2, EndpointKind::Dai),
        ],
        first * 10,
    )
    .unwrap();
}

/// Join an already built component of one pipeline to a component of
/// another through a buffer owned by `owner`.
pub fn bridge(f: &Fixture, id: u32, owner: u32, producer: u32, consumer: u32) {
    f.topology
        .buffer_new(BufferId(id), PipelineId(owner), 64)
        .unwrap();
    f.topology
        .connect(CompId(producer), BufferId(id), CompId(consumer))
        .unwrap();
}
