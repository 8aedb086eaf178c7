//! Playback lifecycle state machine
//!
//! A pure transition table drives the whole lifecycle: `send` looks up
//! `(current state, action)` and either applies the resulting state or
//! rejects the action as a no-op. Rejection is a signal, not an error.
//!
//! Publication follows two channels with different semantics:
//! - current state on a `watch` channel (latest value, readable any time)
//! - transitions on a `broadcast` channel (events, no replay for late
//!   subscribers)

use crate::clock::TimeSource;
use crate::error::PlaybackError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::debug;
use url::Url;

/// State a resolved buffer/seek returns playback to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeTarget {
    Playing,
    Paused,
}

impl ResumeTarget {
    fn resolved_state(self) -> PlaybackState {
        match self {
            ResumeTarget::Playing => PlaybackState::Playing,
            ResumeTarget::Paused => PlaybackState::Paused,
        }
    }
}

/// Playback lifecycle states
///
/// Only `Buffering` and `Seeking` carry resumable info; no other state
/// remembers where playback should return to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "details", rename_all = "snake_case")]
pub enum PlaybackState {
    /// No content loaded
    Idle,
    /// Loading the given content URL
    Loading(Url),
    /// Content loaded, playback not yet requested
    Ready,
    /// Content is playing
    Playing,
    /// Playback paused by user or system
    Paused,
    /// Stalled waiting for data; resumes to the carried target
    Buffering(ResumeTarget),
    /// Seeking to a position; resumes to the carried target
    Seeking { target: f64, resume_to: ResumeTarget },
    /// Content played to the end
    Ended,
    /// Playback failed
    Failed(PlaybackError),
}

impl PlaybackState {
    /// True while playback is in motion or will resume into motion
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Playing
                | PlaybackState::Buffering(ResumeTarget::Playing)
                | PlaybackState::Seeking {
                    resume_to: ResumeTarget::Playing,
                    ..
                }
        )
    }

    /// True when a `Play` action would start or resume playback
    pub fn can_play(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready | PlaybackState::Paused | PlaybackState::Ended
        )
    }

    /// True when a `Pause` action is meaningful
    pub fn can_pause(&self) -> bool {
        self.is_active()
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading(_) => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Buffering(_) => write!(f, "buffering"),
            PlaybackState::Seeking { .. } => write!(f, "seeking"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Actions fed into the state machine
///
/// User actions come from the UI, player events from the platform media
/// player adapter, and the rest from app lifecycle / audio session
/// notifications. Observational events with no entry in the transition
/// table (`StartedPlaying`, `DidPause`, `StartedSeeking`, `BecameActive`)
/// are rejected as no-ops but still useful to co-located trackers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "details", rename_all = "snake_case")]
pub enum PlaybackAction {
    // User actions
    Load(Url),
    Play,
    Pause,
    Seek(f64),
    Stop,
    Retry,

    // Player events
    BecameReady,
    StartedPlaying,
    DidPause,
    StartedBuffering,
    FinishedBuffering,
    StartedSeeking,
    FinishedSeeking,
    ReachedEnd,
    Failed(PlaybackError),

    // App lifecycle and audio session events
    EnteredBackground,
    BecameActive,
    SessionInterrupted,
    SessionResumed,
}

/// An accepted state change, created once per accepted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackTransition {
    pub from: PlaybackState,
    pub to: PlaybackState,
    pub action: PlaybackAction,
    pub timestamp: DateTime<Utc>,
}

impl PlaybackTransition {
    /// False for accepted actions that map a state onto itself
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Total transition function over `(state, action)`
///
/// Every pair not matched here is undefined and rejected by `send`.
fn next_state(state: &PlaybackState, action: &PlaybackAction) -> Option<PlaybackState> {
    use PlaybackAction as A;
    use PlaybackState as S;

    match (state, action) {
        (S::Idle, A::Load(url)) => Some(S::Loading(url.clone())),

        (S::Loading(_), A::BecameReady) => Some(S::Ready),
        (S::Loading(_), A::Failed(error)) => Some(S::Failed(error.clone())),
        (S::Loading(_), A::Stop) => Some(S::Idle),

        (S::Ready, A::Play) => Some(S::Playing),
        (S::Ready, A::Stop) => Some(S::Idle),
        (S::Ready, A::Load(url)) => Some(S::Loading(url.clone())),

        (S::Playing, A::Pause) => Some(S::Paused),
        (S::Playing, A::StartedBuffering) => Some(S::Buffering(ResumeTarget::Playing)),
        (S::Playing, A::Seek(target)) => Some(S::Seeking {
            target: *target,
            resume_to: ResumeTarget::Playing,
        }),
        (S::Playing, A::ReachedEnd) => Some(S::Ended),
        (S::Playing, A::Failed(error)) => Some(S::Failed(error.clone())),
        (S::Playing, A::Stop) => Some(S::Idle),
        (S::Playing, A::EnteredBackground) => Some(S::Paused),
        (S::Playing, A::SessionInterrupted) => Some(S::Paused),

        (S::Paused, A::Play) => Some(S::Playing),
        (S::Paused, A::StartedBuffering) => Some(S::Buffering(ResumeTarget::Paused)),
        (S::Paused, A::Seek(target)) => Some(S::Seeking {
            target: *target,
            resume_to: ResumeTarget::Paused,
        }),
        (S::Paused, A::Stop) => Some(S::Idle),
        (S::Paused, A::Load(url)) => Some(S::Loading(url.clone())),
        (S::Paused, A::SessionResumed) => Some(S::Playing),

        (S::Buffering(resume_to), A::FinishedBuffering) => Some(resume_to.resolved_state()),
        (S::Buffering(_), A::Pause) => Some(S::Buffering(ResumeTarget::Paused)),
        (S::Buffering(_), A::Play) => Some(S::Buffering(ResumeTarget::Playing)),
        (S::Buffering(_), A::Failed(error)) => Some(S::Failed(error.clone())),
        (S::Buffering(_), A::Stop) => Some(S::Idle),

        (S::Seeking { resume_to, .. }, A::FinishedSeeking) => Some(resume_to.resolved_state()),
        (S::Seeking { target, .. }, A::Pause) => Some(S::Seeking {
            target: *target,
            resume_to: ResumeTarget::Paused,
        }),
        (S::Seeking { target, .. }, A::Play) => Some(S::Seeking {
            target: *target,
            resume_to: ResumeTarget::Playing,
        }),
        (S::Seeking { .. }, A::Failed(error)) => Some(S::Failed(error.clone())),
        (S::Seeking { .. }, A::Stop) => Some(S::Idle),

        (S::Ended, A::Play) => Some(S::Playing),
        (S::Ended, A::Stop) => Some(S::Idle),
        (S::Ended, A::Load(url)) => Some(S::Loading(url.clone())),

        (S::Failed(error), A::Retry) if error.is_recoverable() => Some(S::Idle),
        (S::Failed(_), A::Load(url)) => Some(S::Loading(url.clone())),
        (S::Failed(_), A::Stop) => Some(S::Idle),

        _ => None,
    }
}

/// Playback lifecycle state machine
///
/// Single-writer: `send` takes `&mut self` because the lookup and
/// replace are not atomic across each other. Callers serialize sends
/// behind one mutex or task; observers read published snapshots instead.
pub struct PlaybackStateMachine {
    state: PlaybackState,
    clock: TimeSource,
    state_tx: watch::Sender<PlaybackState>,
    transition_tx: broadcast::Sender<PlaybackTransition>,
}

impl PlaybackStateMachine {
    /// Create a machine in `Idle` with the given time source
    pub fn new(clock: TimeSource) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        let (transition_tx, _) = broadcast::channel(64);

        Self {
            state: PlaybackState::Idle,
            clock,
            state_tx,
            transition_tx,
        }
    }

    /// Current state
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Pure lookup: would `send(action)` be accepted right now?
    pub fn can_perform(&self, action: &PlaybackAction) -> bool {
        next_state(&self.state, action).is_some()
    }

    /// Feed an action into the machine
    ///
    /// Returns the transition if the action is defined for the current
    /// state; otherwise `None` and the state is unchanged.
    pub fn send(&mut self, action: PlaybackAction) -> Option<PlaybackTransition> {
        let Some(to) = next_state(&self.state, &action) else {
            debug!(state = %self.state, ?action, "action rejected");
            return None;
        };

        let from = std::mem::replace(&mut self.state, to.clone());
        let transition = PlaybackTransition {
            from,
            to,
            action,
            timestamp: (self.clock)(),
        };

        self.state_tx.send_replace(self.state.clone());
        let _ = self.transition_tx.send(transition.clone());

        debug!(from = %transition.from, to = %transition.to, "playback transition");

        Some(transition)
    }

    /// Subscribe to the latest state (current value available on read)
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to transition events (no replay of missed events)
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<PlaybackTransition> {
        self.transition_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_time_source;

    fn machine() -> PlaybackStateMachine {
        PlaybackStateMachine::new(system_time_source())
    }

    fn test_url() -> Url {
        Url::parse("https://example.com/movie.m3u8").unwrap()
    }

    fn playing_machine() -> PlaybackStateMachine {
        let mut m = machine();
        m.send(PlaybackAction::Load(test_url())).unwrap();
        m.send(PlaybackAction::BecameReady).unwrap();
        m.send(PlaybackAction::Play).unwrap();
        m
    }

    #[test]
    fn test_load_through_playing() {
        let mut m = machine();

        let t = m.send(PlaybackAction::Load(test_url())).unwrap();
        assert_eq!(t.from, PlaybackState::Idle);
        assert_eq!(t.to, PlaybackState::Loading(test_url()));
        assert!(t.changed());

        m.send(PlaybackAction::BecameReady).unwrap();
        assert_eq!(*m.state(), PlaybackState::Ready);

        m.send(PlaybackAction::Play).unwrap();
        assert_eq!(*m.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_undefined_pair_is_noop() {
        let mut m = machine();

        // Play from Idle is not in the table
        assert!(!m.can_perform(&PlaybackAction::Play));
        assert!(m.send(PlaybackAction::Play).is_none());
        assert_eq!(*m.state(), PlaybackState::Idle);

        // Observational player events never transition
        let mut m = playing_machine();
        assert!(m.send(PlaybackAction::StartedPlaying).is_none());
        assert!(m.send(PlaybackAction::DidPause).is_none());
        assert_eq!(*m.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_buffering_round_trips_to_resume_target() {
        // Buffer while playing, resume playing
        let mut m = playing_machine();
        m.send(PlaybackAction::StartedBuffering).unwrap();
        assert_eq!(*m.state(), PlaybackState::Buffering(ResumeTarget::Playing));
        m.send(PlaybackAction::FinishedBuffering).unwrap();
        assert_eq!(*m.state(), PlaybackState::Playing);

        // Buffer while paused, resume paused
        let mut m = playing_machine();
        m.send(PlaybackAction::Pause).unwrap();
        m.send(PlaybackAction::StartedBuffering).unwrap();
        assert_eq!(*m.state(), PlaybackState::Buffering(ResumeTarget::Paused));
        m.send(PlaybackAction::FinishedBuffering).unwrap();
        assert_eq!(*m.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_pause_during_buffering_retargets_resume() {
        let mut m = playing_machine();
        m.send(PlaybackAction::StartedBuffering).unwrap();

        let t = m.send(PlaybackAction::Pause).unwrap();
        assert_eq!(t.to, PlaybackState::Buffering(ResumeTarget::Paused));

        m.send(PlaybackAction::FinishedBuffering).unwrap();
        assert_eq!(*m.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_seek_carries_target_and_resume() {
        let mut m = playing_machine();
        m.send(PlaybackAction::Seek(42.5)).unwrap();
        assert_eq!(
            *m.state(),
            PlaybackState::Seeking {
                target: 42.5,
                resume_to: ResumeTarget::Playing
            }
        );

        // Pause mid-seek keeps the target, changes the resume
        m.send(PlaybackAction::Pause).unwrap();
        assert_eq!(
            *m.state(),
            PlaybackState::Seeking {
                target: 42.5,
                resume_to: ResumeTarget::Paused
            }
        );

        m.send(PlaybackAction::FinishedSeeking).unwrap();
        assert_eq!(*m.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_background_and_interruption_pause_playback() {
        let mut m = playing_machine();
        m.send(PlaybackAction::EnteredBackground).unwrap();
        assert_eq!(*m.state(), PlaybackState::Paused);

        m.send(PlaybackAction::Play).unwrap();
        m.send(PlaybackAction::SessionInterrupted).unwrap();
        assert_eq!(*m.state(), PlaybackState::Paused);

        m.send(PlaybackAction::SessionResumed).unwrap();
        assert_eq!(*m.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_retry_requires_recoverable_error() {
        let mut m = machine();
        m.send(PlaybackAction::Load(test_url())).unwrap();
        m.send(PlaybackAction::Failed(PlaybackError::Network("reset".into())))
            .unwrap();

        assert!(m.can_perform(&PlaybackAction::Retry));
        m.send(PlaybackAction::Retry).unwrap();
        assert_eq!(*m.state(), PlaybackState::Idle);

        // Non-recoverable failure rejects Retry but still allows Load
        let mut m = machine();
        m.send(PlaybackAction::Load(test_url())).unwrap();
        m.send(PlaybackAction::Failed(PlaybackError::Drm("license".into())))
            .unwrap();

        assert!(m.send(PlaybackAction::Retry).is_none());
        assert!(matches!(m.state(), PlaybackState::Failed(_)));
        m.send(PlaybackAction::Load(test_url())).unwrap();
        assert!(matches!(m.state(), PlaybackState::Loading(_)));
    }

    #[test]
    fn test_ended_restarts_or_reloads() {
        let mut m = playing_machine();
        m.send(PlaybackAction::ReachedEnd).unwrap();
        assert_eq!(*m.state(), PlaybackState::Ended);

        m.send(PlaybackAction::Play).unwrap();
        assert_eq!(*m.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_can_perform_has_no_side_effect() {
        let m = machine();
        assert!(m.can_perform(&PlaybackAction::Load(test_url())));
        assert_eq!(*m.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_derived_predicates() {
        assert!(PlaybackState::Playing.is_active());
        assert!(PlaybackState::Buffering(ResumeTarget::Playing).is_active());
        assert!(!PlaybackState::Buffering(ResumeTarget::Paused).is_active());
        assert!(PlaybackState::Seeking {
            target: 1.0,
            resume_to: ResumeTarget::Playing
        }
        .is_active());

        assert!(PlaybackState::Ready.can_play());
        assert!(PlaybackState::Paused.can_play());
        assert!(PlaybackState::Ended.can_play());
        assert!(!PlaybackState::Playing.can_play());

        assert!(PlaybackState::Playing.can_pause());
        assert!(PlaybackState::Buffering(ResumeTarget::Playing).can_pause());
        assert!(!PlaybackState::Paused.can_pause());
    }

    #[tokio::test]
    async fn test_state_watch_and_transition_broadcast() {
        let mut m = machine();
        let state_rx = m.subscribe_state();
        let mut transition_rx = m.subscribe_transitions();

        m.send(PlaybackAction::Load(test_url())).unwrap();

        assert_eq!(*state_rx.borrow(), PlaybackState::Loading(test_url()));
        let event = transition_rx.recv().await.unwrap();
        assert_eq!(event.from, PlaybackState::Idle);

        // Late subscribers see the latest state but no past transitions
        let late_state = m.subscribe_state();
        assert_eq!(*late_state.borrow(), PlaybackState::Loading(test_url()));
        let mut late_transitions = m.subscribe_transitions();
        assert!(matches!(
            late_transitions.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn test_transitions_are_timestamped_by_injected_clock() {
        use crate::clock::ManualClock;
        use chrono::{Duration, TimeZone, Utc};

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        let mut m = PlaybackStateMachine::new(clock.time_source());

        let t1 = m.send(PlaybackAction::Load(test_url())).unwrap();
        assert_eq!(t1.timestamp, start);

        clock.advance(Duration::seconds(3));
        let t2 = m.send(PlaybackAction::BecameReady).unwrap();
        assert_eq!(t2.timestamp, start + Duration::seconds(3));
    }
}
