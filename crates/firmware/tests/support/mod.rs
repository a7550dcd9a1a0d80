//! System rig shared by the firmware integration tests.
//!
//! Components come from a scripted driver that records every trigger and
//! passes bytes through on copy. Platform services are the std mocks.
#![allow(
    dead_code,
    missing_docs,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use audio::{
    BufferDesc, BufferId, CompConfig, CompError, CompId, CompState, ComponentDriver, ComponentOps,
    CopyIo, CopyStatus, Direction, DriverRegistry, EndpointKind, PipelineConfig, PipelineDesc,
    PipelineId, TriggerContext, TriggerOutcome,
};
use firmware::{PanicSink, Platform, System, SystemConfig, SystemError};
use platform::mocks::{ManualClock, MockCache, MockHeap, MockHost, MockIrq, MockTimer};
use platform::{Allocator, CoreId};

pub const COMP_TYPE: u32 = 3;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct Recorder {
    triggers: Mutex<Vec<u32>>,
    copy_fail: Mutex<HashSet<u32>>,
}

impl Recorder {
    /// Components triggered, in call order.
    pub fn order(&self) -> Vec<u32> {
        self.triggers.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.triggers.lock().unwrap().clear();
    }

    pub fn fail_copy(&self, comp: u32) {
        self.copy_fail.lock().unwrap().insert(comp);
    }
}

struct Driver(Arc<Recorder>);

struct Ops {
    id: u32,
    rec: Arc<Recorder>,
}

impl ComponentDriver for Driver {
    fn new(&self, cfg: &CompConfig, _heap: &dyn Allocator) -> Result<Box<dyn ComponentOps>, CompError> {
        Ok(Box::new(Ops {
            id: cfg.id.0,
            rec: self.0.clone(),
        }))
    }
}

impl ComponentOps for Ops {
    fn trigger(&mut self, _cx: &mut TriggerContext<'_>) -> Result<TriggerOutcome, CompError> {
        self.rec.triggers.lock().unwrap().push(self.id);
        Ok(TriggerOutcome::Continue)
    }

    fn copy(&mut self, io: &mut CopyIo<'_>) -> Result<CopyStatus, CompError> {
        if self.rec.copy_fail.lock().unwrap().contains(&self.id) {
            return Err(CompError::Driver(32));
        }
        let mut chunk = [0u8; 8];
        let n = match io.sources.first() {
            Some(src) => src.read(&mut chunk),
            None => {
                chunk.fill(self.id as u8);
                chunk.len()
            }
        };
        if n == 0 {
            return Ok(CopyStatus::NoData);
        }
        for sink in io.sinks {
            sink.write(&chunk[..n]).map_err(|_| CompError::Driver(28))?;
        }
        Ok(CopyStatus::Copied(n))
    }
}

/// Every fatal fault handed to the sink.
#[derive(Default)]
pub struct PanicLog(Mutex<Vec<(CoreId, SystemError)>>);

impl PanicLog {
    pub fn faults(&self) -> Vec<(CoreId, SystemError)> {
        self.0.lock().unwrap().clone()
    }
}

impl PanicSink for PanicLog {
    fn fatal(&self, core: CoreId, err: SystemError) {
        self.0.lock().unwrap().push((core, err));
    }
}

pub struct Rig {
    pub sys: Arc<System>,
    pub rec: Arc<Recorder>,
    pub host: Arc<MockHost>,
    pub timer: Arc<MockTimer>,
    pub clock: Arc<ManualClock>,
    pub panics: Arc<PanicLog>,
}

impl Rig {
    pub fn new(config: SystemConfig) -> Self {
        init_logging();
        let rec = Arc::new(Recorder::default());
        let host = Arc::new(MockHost::new());
        let timer = Arc::new(MockTimer::new());
        let clock = Arc::new(ManualClock::new());
        let panics = Arc::new(PanicLog::default());
        let mut drivers = DriverRegistry::new();
        drivers
            .register(COMP_TYPE, Arc::new(Driver(rec.clone())))
            .unwrap();
        let platform = Platform {
            heap: Arc::new(MockHeap::new()),
            cache: Arc::new(MockCache::new()),
            irq: Arc::new(MockIrq::new()),
            timer: timer.clone(),
            clock: clock.clone(),
            host: host.clone(),
        };
        let sys = System::new(config, platform, drivers)
            .unwrap()
            .with_panic_sink(panics.clone());
        Self {
            sys: Arc::new(sys),
            rec,
            host,
            timer,
            clock,
            panics,
        }
    }

    /// Power `n` up and let it take the power-up message.
    pub fn bring_up(&self, n: u8) {
        self.sys.power_up(core(n)).unwrap();
        self.sys.handle_idc(core(n));
    }

    pub fn state(&self, comp: u32) -> CompState {
        self.sys.topology().comp_info(CompId(comp)).unwrap().state
    }

    pub fn copy_count(&self, comp: u32) -> u32 {
        self.sys.topology().comp_info(CompId(comp)).unwrap().copy_count
    }

    /// Linear pipeline `ids[0] → ids[1] → …`; buffer `i` gets id
    /// `buf_base + i`.
    pub fn linear(&self, cfg: PipelineConfig, ids: &[(u32, EndpointKind)], buf_base: u32) {
        let comps: Vec<CompConfig> = ids
            .iter()
            .map(|(id, endpoint)| CompConfig {
                id: CompId(*id),
                pipeline: PipelineId(0),
                comp_type: COMP_TYPE,
                endpoint: *endpoint,
            })
            .collect();
        let buffers: Vec<BufferDesc> = ids
            .windows(2)
            .enumerate()
            .map(|(i, w)| BufferDesc {
                id: BufferId(buf_base + i as u32),
                size: 64,
                producer: CompId(w[0].0),
                consumer: CompId(w[1].0),
            })
            .collect();
        self.sys
            .topology()
            .build(&PipelineDesc {
                pipeline: cfg,
                comps: &comps,
                buffers: &buffers,
            })
            .unwrap();
    }

    /// `host → internal → dai` playback pipeline with components
    /// `first..first + 3` and buffers `first * 10 ..`.
    pub fn three_stage(&self, pipeline: u32, first: u32, core_id: u8) {
        self.linear(
            playback(pipeline, core_id),
            &[
                (first, EndpointKind::Host),
                (first + 1, EndpointKind::Internal),
                (first + 2, EndpointKind::Dai),
            ],
            first * 10,
        );
    }

    /// Join two built components through a buffer owned by `owner`.
    pub fn bridge(&self, id: u32, owner: u32, producer: u32, consumer: u32) {
        let topology = self.sys.topology();
        topology
            .buffer_new(BufferId(id), PipelineId(owner), 64)
            .unwrap();
        topology
            .connect(CompId(producer), BufferId(id), CompId(consumer))
            .unwrap();
    }

    /// Service `n`'s IDC interrupt on its own thread until the guard drops.
    pub fn serve(&self, n: u8) -> Server {
        let stop = Arc::new(AtomicBool::new(false));
        let sys = self.sys.clone();
        let flag = stop.clone();
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                sys.handle_idc(core(n));
                std::thread::yield_now();
            }
        });
        Server {
            stop,
            handle: Some(handle),
        }
    }
}

/// Receiver thread of one core.
pub struct Server {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
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
