//! Top-level system object.
//!
//! `System` owns the shared topology, the IDC bus, the outbound host queue
//! and a core-indexed table of [`CoreContext`]s. Each core only touches its
//! own context entry; everything cross-core goes through the topology lock
//! or an IDC message.
//!
//! ```text
//!  host cmd ─▶ apply_trigger(from, ppl, cmd)
//!                 │ owner == from ──▶ Trigger Walk ──▶ LL task schedule/cancel
//!                 └ owner != from ──▶ IDC Trigger (call) ──▶ owner's Trigger Walk
//!                                        └─ boundary list in the reply
//!  boundary stops ─▶ returned to the host, or continued when propagating
//! ```

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::cell::RefCell;

use audio::{
    DriverRegistry, GraphError, PipelineId, PipelineInfo, StreamParams, Topology, TriggerCmd,
    WalkReport, WalkStatus,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use idc::{IdcBus, IdcMessage, IdcMsgType, IdcReply, SendMode};
use platform::config::{MAX_CORES, MAX_PIPELINES};
use platform::errno::{reply, EINVAL};
use platform::{
    Allocator, CacheOps, CoreId, CycleClock, DomainTimer, HostMailbox, HostMessage, InterCoreIrq,
};
use schedule::{ScheduleError, TickReport};

use crate::config::SystemConfig;
use crate::core_context::CoreContext;
use crate::error::SystemError;
use crate::ipc::{IpcPriority, OutboundQueue};
use crate::pipeline_task::{task_id, PipelineTask};

/// Receives faults that must not be answered as a normal host reply.
pub trait PanicSink: Send + Sync {
    /// `err` happened on `core` and is fatal.
    fn fatal(&self, core: CoreId, err: SystemError);
}

/// Platform services the system is built on.
#[derive(Clone)]
pub struct Platform {
    /// Allocator service.
    pub heap: Arc<dyn Allocator>,
    /// Cache maintenance of the calling core.
    pub cache: Arc<dyn CacheOps>,
    /// Inter-core doorbell.
    pub irq: Arc<dyn InterCoreIrq>,
    /// LL domain timer.
    pub timer: Arc<dyn DomainTimer>,
    /// Cycle counter.
    pub clock: Arc<dyn CycleClock>,
    /// Outbound host window.
    pub host: Arc<dyn HostMailbox>,
}

type ContextSlot = Mutex<CriticalSectionRawMutex, RefCell<Option<Arc<CoreContext>>>>;

type Boundary = heapless::Vec<PipelineId, MAX_PIPELINES>;

/// The whole DSP: shared graph plus one context per powered core.
pub struct System {
    config: SystemConfig,
    topology: Arc<Topology>,
    bus: IdcBus,
    outbound: Arc<OutboundQueue>,
    host: Arc<dyn HostMailbox>,
    timer: Arc<dyn DomainTimer>,
    clock: Arc<dyn CycleClock>,
    contexts: [ContextSlot; MAX_CORES],
    panic_sink: Option<Arc<dyn PanicSink>>,
}

impl System {
    /// Validate `config` and bring up the primary core.
    ///
    /// # Errors
    ///
    /// [`SystemError::InvalidConfig`].
    pub fn new(
        config: SystemConfig,
        platform: Platform,
        drivers: DriverRegistry,
    ) -> Result<Self, SystemError> {
        config.validate()?;
        let bus = IdcBus::new(config.cores, platform.irq, platform.cache.clone());
        bus.set_powered(CoreId::PRIMARY, false);
        bus.set_powered(config.primary, true);
        let system = Self {
            config,
            topology: Arc::new(Topology::new(drivers, platform.heap, platform.cache)),
            bus,
            outbound: Arc::new(OutboundQueue::new(config.ipc_queue_depth, config.ipc_coalesce)),
            host: platform.host,
            timer: platform.timer,
            clock: platform.clock,
            contexts: core::array::from_fn(|_| Mutex::new(RefCell::new(None))),
            panic_sink: None,
        };
        system.install(config.primary);
        platform::info!("system up: {} cores, primary {}", config.cores, config.primary);
        Ok(system)
    }

    /// Route fatal faults to `sink`.
    #[must_use]
    pub fn with_panic_sink(mut self, sink: Arc<dyn PanicSink>) -> Self {
        self.panic_sink = Some(sink);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Shared audio graph.
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Inter-core mailboxes.
    pub fn bus(&self) -> &IdcBus {
        &self.bus
    }

    /// Outbound host queue.
    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    /// Context of `core`, if it is powered.
    pub fn context(&self, core: CoreId) -> Option<Arc<CoreContext>> {
        self.contexts
            .get(core.index())?
            .lock(|slot| slot.borrow().clone())
    }

    fn install(&self, core: CoreId) {
        let ctx = Arc::new(CoreContext::new(
            core,
            &self.config,
            self.timer.clone(),
            self.clock.clone(),
        ));
        if let Some(slot) = self.contexts.get(core.index()) {
            slot.lock(|s| *s.borrow_mut() = Some(ctx));
        }
    }

    fn check_core(&self, core: CoreId) -> Result<(), SystemError> {
        if core.index() >= self.config.cores {
            return Err(SystemError::InvalidCore(core));
        }
        Ok(())
    }

    fn powered(&self, core: CoreId) -> Result<Arc<CoreContext>, SystemError> {
        self.check_core(core)?;
        self.context(core).ok_or(SystemError::CoreDown(core))
    }

    fn pipeline(&self, pid: PipelineId) -> Result<PipelineInfo, SystemError> {
        self.topology
            .pipeline_info(pid)
            .ok_or(SystemError::UnknownPipeline(pid))
    }

    /// Hand fatal faults to the panic sink; pass every error through.
    fn escalate(&self, core: CoreId, err: SystemError) -> SystemError {
        if err.is_fatal() {
            platform::error!("{}: fatal: {}", core, err);
            if let Some(sink) = &self.panic_sink {
                sink.fatal(core, err);
            }
        }
        err
    }

    // ── Core power ───────────────────────────────────────────────────────────

    /// Power `core` up and give it a fresh context. No-op if it is up.
    ///
    /// # Errors
    ///
    /// [`SystemError::InvalidCore`] for a core the part does not have, or
    /// the power-up message could not be posted.
    pub fn power_up(&self, core: CoreId) -> Result<(), SystemError> {
        self.check_core(core).map_err(|e| self.escalate(core, e))?;
        if self.context(core).is_some() {
            return Ok(());
        }
        self.bus
            .send(self.config.primary, IdcMessage::power_up(core), SendMode::NonBlocking)
            .map_err(|e| {
                platform::warn!("{} power-up message not sent: {}", core, e);
                self.escalate(core, e.into())
            })?;
        self.install(core);
        self.bus.set_powered(core, true);
        platform::info!("{} powered up", core);
        Ok(())
    }

    /// Power `core` down and drop its context. The core takes the
    /// power-down message, and anything else still waiting for it, before
    /// its context goes.
    ///
    /// # Errors
    ///
    /// [`SystemError::CoreBusy`] while it has scheduled tasks, or for the
    /// primary core.
    pub fn power_down(&self, core: CoreId) -> Result<(), SystemError> {
        self.check_core(core).map_err(|e| self.escalate(core, e))?;
        if core == self.config.primary {
            return Err(SystemError::CoreBusy(core));
        }
        let Some(ctx) = self.context(core) else {
            return Ok(());
        };
        if ctx.is_busy() {
            platform::warn!("{} still has tasks, staying up", core);
            return Err(SystemError::CoreBusy(core));
        }
        self.drain(&ctx);
        if let Err(e) = self
            .bus
            .send(self.config.primary, IdcMessage::power_down(core), SendMode::NonBlocking)
        {
            platform::warn!("{} power-down message not sent: {}", core, e);
        }
        self.drain(&ctx);
        self.bus.set_powered(core, false);
        if let Some(slot) = self.contexts.get(core.index()) {
            slot.lock(|s| s.borrow_mut().take());
        }
        platform::info!("{} powered down", core);
        Ok(())
    }

    // ── Triggers ─────────────────────────────────────────────────────────────

    /// Apply a host trigger, issued on core `from`, to pipeline `pid`.
    ///
    /// A pipeline owned by another core is triggered there through a
    /// blocking IDC `Trigger`. Locally the Trigger Walk runs from the
    /// pipeline's trigger endpoint and the pipeline task is scheduled or
    /// cancelled to match. Pipelines past a boundary stop are continued
    /// only with `propagate_across_cores`; otherwise they are returned in
    /// [`WalkStatus::BoundaryStop`] for the host to trigger.
    ///
    /// # Errors
    ///
    /// Unknown pipeline, powered-down core, `ENODATA` on a capture start
    /// whose upstream cannot supply, or a component failure.
    pub fn apply_trigger(
        &self,
        from: CoreId,
        pid: PipelineId,
        cmd: TriggerCmd,
    ) -> Result<WalkStatus, SystemError> {
        self.trigger_from(from, pid, cmd)
            .map_err(|e| self.escalate(from, e))
    }

    fn trigger_from(
        &self,
        from: CoreId,
        pid: PipelineId,
        cmd: TriggerCmd,
    ) -> Result<WalkStatus, SystemError> {
        self.check_core(from)?;
        let boundary = self.trigger_one(from, pid, cmd)?;
        if boundary.is_empty() {
            return Ok(WalkStatus::Complete);
        }
        if !self.config.propagate_across_cores {
            return Ok(WalkStatus::BoundaryStop(boundary));
        }

        let mut done: Boundary = heapless::Vec::new();
        let _ = done.push(pid);
        let mut work = boundary;
        let mut next = 0usize;
        while let Some(far) = work.get(next).copied() {
            next = next.saturating_add(1);
            if done.contains(&far) {
                continue;
            }
            let _ = done.push(far);
            platform::debug!("{} {} continues into {}", pid, cmd, far);
            for p in self.trigger_one(from, far, cmd)? {
                if !work.contains(&p) {
                    let _ = work.push(p);
                }
            }
        }
        Ok(WalkStatus::Complete)
    }

    /// Walk `pid` on the core that owns it and return the pipelines the
    /// walk stopped at. Another core answers with its list in the reply.
    fn trigger_one(&self, from: CoreId, pid: PipelineId, cmd: TriggerCmd) -> Result<Boundary, SystemError> {
        let owner = self.pipeline(pid)?.config.core;
        if owner == from {
            let report = self.walk_local(owner, pid, cmd)?;
            return Ok(report.boundary().iter().copied().collect());
        }
        let reply = self.call(from, IdcMessage::trigger(owner, pid.0, cmd.to_raw()))?;
        Ok(reply.words().iter().map(|w| PipelineId(*w)).collect())
    }

    /// Blocking IDC from `from`, handling `from`'s own mailboxes meanwhile.
    fn call(&self, from: CoreId, msg: IdcMessage) -> Result<IdcReply, SystemError> {
        Ok(self
            .bus
            .call(from, msg, |source, m| self.on_idc(from, source, m))?)
    }

    /// Take every record waiting for `ctx`'s core.
    fn drain(&self, ctx: &CoreContext) -> usize {
        let core = ctx.core();
        let handled = self
            .bus
            .handle_irq(core, |source, msg| self.on_idc(core, source, msg));
        ctx.count_idc(handled);
        handled
    }

    /// Trigger Walk on a pipeline owned by `core`, plus task bookkeeping.
    fn walk_local(
        &self,
        core: CoreId,
        pid: PipelineId,
        cmd: TriggerCmd,
    ) -> Result<WalkReport, SystemError> {
        let ctx = self.powered(core)?;
        let info = self.pipeline(pid)?;
        let endpoint = info
            .trigger_endpoint()
            .ok_or(SystemError::Graph(GraphError::PipelineIncomplete(pid)))?;
        let report = self.topology.trigger(endpoint, cmd).map_err(|e| {
            platform::warn!("{} {} failed: {}", pid, cmd, e);
            e
        })?;
        if !report.boundary().is_empty() {
            platform::debug!("{} {} stopped at {} boundaries", pid, cmd, report.boundary().len());
        }
        self.update_task(&ctx, &info, cmd)?;
        Ok(report)
    }

    /// Schedule or cancel the LL task driving `info`'s pipeline.
    fn update_task(
        &self,
        ctx: &CoreContext,
        info: &PipelineInfo,
        cmd: TriggerCmd,
    ) -> Result<(), SystemError> {
        let sched = info.config.sched_id();
        let driver = if info.owns_task() {
            *info
        } else {
            self.pipeline(sched)?
        };
        if driver.config.core != ctx.core() {
            platform::warn!("{} is driven from another core, no task", info.config.id);
            return Ok(());
        }
        match cmd {
            TriggerCmd::Start | TriggerCmd::Release | TriggerCmd::Resume => {
                let topology = self.topology.clone();
                let outbound = self.outbound.clone();
                ctx.ensure_pipeline_task(
                    sched,
                    driver.config.priority,
                    self.config.ticks_for(driver.config.period_us),
                    move || Box::new(PipelineTask::new(sched, topology, outbound)),
                )?;
                ctx.ll().schedule_task(task_id(sched), 0, 0)?;
            }
            TriggerCmd::Stop
            | TriggerCmd::Pause
            | TriggerCmd::Xrun
            | TriggerCmd::Suspend
            | TriggerCmd::Reset
                if info.owns_task() && ctx.has_pipeline_task(sched) =>
            {
                match ctx.ll().cancel(task_id(sched)) {
                    // Stopped from inside its own run; it completes itself.
                    Ok(()) | Err(ScheduleError::Running(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ── Other pipeline walks ─────────────────────────────────────────────────

    /// Prepare `pid`, on its owning core.
    ///
    /// # Errors
    ///
    /// As [`Topology::pipeline_prepare`], or an IDC failure.
    pub fn pipeline_prepare(&self, from: CoreId, pid: PipelineId) -> Result<(), SystemError> {
        self.walk_on_owner(from, pid, IdcMsgType::Prepare)
            .map_err(|e| self.escalate(from, e))
    }

    /// Reset `pid`, on its owning core. The pipeline must be stopped.
    ///
    /// # Errors
    ///
    /// As [`Topology::pipeline_reset`], or an IDC failure.
    pub fn pipeline_reset(&self, from: CoreId, pid: PipelineId) -> Result<(), SystemError> {
        self.walk_on_owner(from, pid, IdcMsgType::Reset)
            .map_err(|e| self.escalate(from, e))
    }

    fn walk_on_owner(
        &self,
        from: CoreId,
        pid: PipelineId,
        kind: IdcMsgType,
    ) -> Result<(), SystemError> {
        self.check_core(from)?;
        let owner = self.pipeline(pid)?.config.core;
        if owner != from {
            self.call(from, IdcMessage::new(kind, owner, pid.0, 0))?;
            return Ok(());
        }
        self.powered(owner)?;
        match kind {
            IdcMsgType::Reset => self.topology.pipeline_reset(pid)?,
            _ => self.topology.pipeline_prepare(pid)?,
        }
        Ok(())
    }

    /// Apply stream parameters to `pid`.
    ///
    /// # Errors
    ///
    /// As [`Topology::pipeline_params`].
    pub fn pipeline_params(&self, pid: PipelineId, params: &StreamParams) -> Result<(), SystemError> {
        Ok(self.topology.pipeline_params(pid, params)?)
    }

    /// Release `pid`'s task and free the pipeline.
    ///
    /// # Errors
    ///
    /// The pipeline or its task is still running.
    pub fn pipeline_free(&self, pid: PipelineId) -> Result<(), SystemError> {
        let info = self.pipeline(pid)?;
        if let Some(ctx) = self.context(info.config.core) {
            ctx.free_pipeline_task(pid)?;
        }
        Ok(self.topology.pipeline_free(pid)?)
    }

    // ── Per-core entry points ────────────────────────────────────────────────

    /// LL timer interrupt on `core`: one tick plus the deferred pass.
    /// Does nothing while the core's domain timer is off.
    ///
    /// # Errors
    ///
    /// [`SystemError::CoreDown`].
    pub fn tick(&self, core: CoreId) -> Result<TickReport, SystemError> {
        let ctx = self.powered(core)?;
        if !self.timer.is_enabled(core) {
            return Ok(TickReport::default());
        }
        let report = ctx.ll().tick();
        ctx.ll().run_deferred();
        Ok(report)
    }

    /// IDC interrupt on `core`: handle every waiting message.
    pub fn handle_idc(&self, core: CoreId) -> usize {
        self.context(core).map_or(0, |ctx| self.drain(&ctx))
    }

    /// Receive-side dispatch. A remote trigger is not propagated further;
    /// its boundary list goes back to the initiating core, which owns
    /// propagation.
    fn on_idc(&self, core: CoreId, source: CoreId, msg: &IdcMessage) -> Result<IdcReply, i32> {
        platform::debug!("{} got {} from {}", core, msg, source);
        let pid = PipelineId(msg.data0);
        let result = match msg.kind {
            IdcMsgType::PowerUp | IdcMsgType::PowerDown | IdcMsgType::Notify => Ok(IdcReply::new()),
            IdcMsgType::Trigger => {
                let cmd = TriggerCmd::from_raw(msg.data1).ok_or(reply(EINVAL))?;
                self.walk_local(core, pid, cmd)
                    .map(|report| report.boundary().iter().map(|p| p.0).collect())
            }
            IdcMsgType::Prepare | IdcMsgType::Reset => self
                .walk_on_owner(core, pid, msg.kind)
                .map(|()| IdcReply::new()),
        };
        result.map_err(|e| self.escalate(core, e).errno())
    }

    /// Idle loop body of `core`: run runnable EDF work and, on the primary
    /// core, drain the outbound queue. Returns the messages delivered.
    pub fn idle(&self, core: CoreId) -> usize {
        if let Some(ctx) = self.context(core) {
            ctx.edf().run();
        }
        if core != self.config.primary {
            return 0;
        }
        self.outbound.drain(self.host.as_ref())
    }

    /// Queue a message for the host.
    ///
    /// # Errors
    ///
    /// [`IpcError::QueueFull`](crate::IpcError::QueueFull).
    pub fn enqueue_outbound(&self, msg: HostMessage, priority: IpcPriority) -> Result<(), SystemError> {
        Ok(self.outbound.enqueue(msg, priority)?)
    }

    /// Send a notification from `from` to `to` without waiting.
    ///
    /// # Errors
    ///
    /// Busy mailbox or invalid target.
    pub fn notify_core(&self, from: CoreId, to: CoreId, data0: u32, data1: u32) -> Result<(), SystemError> {
        self.bus
            .send(from, IdcMessage::notify(to, data0, data1), SendMode::NonBlocking)
            .map_err(|e| self.escalate(from, e.into()))
    }
}
