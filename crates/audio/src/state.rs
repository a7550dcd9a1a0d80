//! Component run-state machine.
//!
//! `CompState` is a pure, allocation-free state machine. It decides what a
//! trigger command does to one component; it never calls drivers. The
//! Trigger Walk consults it before invoking a driver and commits the new
//! state only after the driver accepted the command.
//!
//! ```text
//!            complete            prepare
//!  Uninit ────────────▶ Ready ────────────▶ Prepare
//!                        ▲ │ ▲                 │
//!                   Stop │ │ └─────Start───────┘
//!                        │ ▼ Start
//!   Paused ◀──Pause──── Active ──Drain──▶ Drain
//!     └──────Release─────▶ ▲
//! ```
//!
//! `Suspend` parks any started state and `Resume` restores it.

/// Run state of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompState {
    /// Created but its pipeline is not complete yet.
    Uninit,
    /// Connected and idle.
    Ready,
    /// Prepared for streaming; transient until `Start`.
    Prepare,
    /// Streaming was paused; buffers are preserved.
    Paused,
    /// Streaming: `copy` runs every tick.
    Active,
    /// Draining remaining data; `copy` still runs until `Stop`.
    Drain,
    /// Suspended for power management; remembers the state to resume to.
    Suspend,
}

impl CompState {
    /// `true` while the component's `copy` should run.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Active | Self::Drain)
    }
}

impl core::fmt::Display for CompState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Uninit => "uninit",
            Self::Ready => "ready",
            Self::Prepare => "prepare",
            Self::Paused => "paused",
            Self::Active => "active",
            Self::Drain => "drain",
            Self::Suspend => "suspend",
        })
    }
}

/// Trigger command propagated by the Trigger Walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerCmd {
    /// Start streaming.
    Start,
    /// Stop streaming and return to `Ready`.
    Stop,
    /// Pause streaming.
    Pause,
    /// Resume from pause.
    Release,
    /// Let buffered data play out.
    Drain,
    /// Park for power management.
    Suspend,
    /// Return from `Suspend`.
    Resume,
    /// Return an idle component to `Ready`.
    Reset,
    /// Over/underrun recovery: force a streaming component back to `Ready`.
    Xrun,
}

impl TriggerCmd {
    /// Commands that bring data paths up are walked upstream-first so
    /// producers are ready before consumers pull.
    #[must_use]
    pub const fn is_start_like(self) -> bool {
        matches!(self, Self::Start | Self::Release | Self::Resume)
    }

    /// Commands that may trip the no-data rule on capture paths.
    #[must_use]
    pub const fn needs_source_data(self) -> bool {
        matches!(self, Self::Start | Self::Release)
    }

    /// Wire encoding used in IDC data words.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Stop => 0,
            Self::Start => 1,
            Self::Pause => 2,
            Self::Release => 3,
            Self::Suspend => 4,
            Self::Resume => 5,
            Self::Reset => 6,
            Self::Xrun => 8,
            Self::Drain => 9,
        }
    }

    /// Decode an IDC data word.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Stop,
            1 => Self::Start,
            2 => Self::Pause,
            3 => Self::Release,
            4 => Self::Suspend,
            5 => Self::Resume,
            6 => Self::Reset,
            8 => Self::Xrun,
            9 => Self::Drain,
            _ => return None,
        })
    }
}

impl core::fmt::Display for TriggerCmd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Pause => "PAUSE",
            Self::Release => "RELEASE",
            Self::Drain => "DRAIN",
            Self::Suspend => "SUSPEND",
            Self::Resume => "RESUME",
            Self::Reset => "RESET",
            Self::Xrun => "XRUN",
        })
    }
}

/// Outcome of applying a command to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the command.
    pub to: CompState,
    /// The component was already in `to`; the driver is still told.
    pub already_set: bool,
}

/// The command is not valid from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidTransition {
    /// State the component was in.
    pub from: CompState,
    /// Rejected command.
    pub cmd: TriggerCmd,
}

impl CompState {
    /// Compute the transition `cmd` causes from `self`.
    ///
    /// `resume_to` is the state remembered when the component was suspended;
    /// it is only consulted for [`TriggerCmd::Resume`].
    ///
    /// Transitions:
    /// - `Ready | Prepare --Start--> Active`
    /// - `Paused --Release--> Active`
    /// - `Active --Pause--> Paused`
    /// - `Active | Paused | Drain --Stop--> Ready`
    /// - `Active --Drain--> Drain`
    /// - `Ready | Prepare | Paused | Active | Drain --Suspend--> Suspend`
    /// - `Suspend --Resume--> resume_to`
    /// - `Prepare | Paused --Reset--> Ready`
    /// - `Active | Paused | Drain --Xrun--> Ready`
    ///
    /// A command whose target is the current state yields
    /// `already_set = true`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for every other combination, including
    /// any command on an `Uninit` component.
    pub fn on_trigger(
        self,
        cmd: TriggerCmd,
        resume_to: Option<CompState>,
    ) -> Result<Transition, InvalidTransition> {
        use CompState as S;
        use TriggerCmd as C;

        let invalid = InvalidTransition { from: self, cmd };
        let moved = |to| Ok(Transition { to, already_set: false });
        let already = Ok(Transition {
            to: self,
            already_set: true,
        });

        match (cmd, self) {
            (_, S::Uninit) => Err(invalid),

            (C::Start, S::Ready | S::Prepare) => moved(S::Active),
            (C::Start | C::Release, S::Active) => already,
            (C::Release, S::Paused) => moved(S::Active),

            (C::Pause, S::Active) => moved(S::Paused),
            (C::Pause, S::Paused) => already,

            (C::Stop, S::Active | S::Paused | S::Drain) => moved(S::Ready),
            (C::Stop, S::Ready | S::Prepare) => already,

            (C::Drain, S::Active) => moved(S::Drain),
            (C::Drain, S::Drain) => already,

            (C::Suspend, S::Suspend) => already,
            (C::Suspend, _) => moved(S::Suspend),
            (C::Resume, S::Suspend) => resume_to.map_or(Err(invalid), moved),

            (C::Reset, S::Prepare | S::Paused) => moved(S::Ready),
            (C::Reset, S::Ready) => already,

            (C::Xrun, S::Active | S::Paused | S::Drain) => moved(S::Ready),
            (C::Xrun, S::Ready | S::Prepare) => already,

            _ => Err(invalid),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn to(state: CompState, cmd: TriggerCmd) -> CompState {
        state.on_trigger(cmd, None).unwrap().to
    }

    #[test]
    fn start_pause_release_stop_cycle() {
        let s = to(CompState::Ready, TriggerCmd::Start);
        assert_eq!(s, CompState::Active);
        let s = to(s, TriggerCmd::Pause);
        assert_eq!(s, CompState::Paused);
        let s = to(s, TriggerCmd::Release);
        assert_eq!(s, CompState::Active);
        assert_eq!(to(s, TriggerCmd::Stop), CompState::Ready);
    }

    #[test]
    fn uninit_rejects_everything() {
        for cmd in [TriggerCmd::Start, TriggerCmd::Stop, TriggerCmd::Reset] {
            assert!(CompState::Uninit.on_trigger(cmd, None).is_err());
        }
    }

    #[test]
    fn release_requires_paused() {
        let err = CompState::Ready
            .on_trigger(TriggerCmd::Release, None)
            .unwrap_err();
        assert_eq!(err.from, CompState::Ready);
    }

    #[test]
    fn same_target_is_already_set() {
        let t = CompState::Active.on_trigger(TriggerCmd::Start, None).unwrap();
        assert!(t.already_set);
        assert_eq!(t.to, CompState::Active);
        let t = CompState::Ready.on_trigger(TriggerCmd::Stop, None).unwrap();
        assert!(t.already_set);
    }

    #[test]
    fn drain_then_stop() {
        let s = to(CompState::Active, TriggerCmd::Drain);
        assert!(s.is_running());
        assert_eq!(to(s, TriggerCmd::Stop), CompState::Ready);
    }

    #[test]
    fn resume_restores_remembered_state() {
        let t = CompState::Suspend
            .on_trigger(TriggerCmd::Resume, Some(CompState::Paused))
            .unwrap();
        assert_eq!(t.to, CompState::Paused);
        assert!(CompState::Suspend
            .on_trigger(TriggerCmd::Resume, None)
            .is_err());
    }

    #[test]
    fn reset_refuses_streaming_component() {
        assert!(CompState::Active.on_trigger(TriggerCmd::Reset, None).is_err());
        assert_eq!(to(CompState::Paused, TriggerCmd::Reset), CompState::Ready);
    }

    #[test]
    fn raw_encoding_round_trips_every_command() {
        for cmd in [
            TriggerCmd::Start,
            TriggerCmd::Stop,
            TriggerCmd::Pause,
            TriggerCmd::Release,
            TriggerCmd::Drain,
            TriggerCmd::Suspend,
            TriggerCmd::Resume,
            TriggerCmd::Reset,
            TriggerCmd::Xrun,
        ] {
            assert_eq!(TriggerCmd::from_raw(cmd.to_raw()), Some(cmd));
        }
        assert_eq!(TriggerCmd::from_raw(7), None);
    }
}
