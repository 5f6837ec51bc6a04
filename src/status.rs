//! Assistant activity status
//!
//! [`StatusMachine`] is the single source of truth for what the assistant is
//! doing. Callers can only request transitions; requests that are not valid
//! from the current state are ignored. Speaking and listening are tracked as
//! separate conditions so a stale "ended" signal for one of them never resets
//! a state the other has since entered.

use std::fmt;

use tokio::sync::broadcast;

/// Capacity of the transition broadcast channel
const TRANSITION_CAPACITY: usize = 64;

/// Current activity phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// Waiting for input
    #[default]
    Idle,
    /// Capturing speech
    Listening,
    /// Waiting on the generation backend
    Thinking,
    /// Vocalizing a reply
    Speaking,
    /// A failure is being reported
    Error,
}

impl Status {
    /// Display label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Listening => "LISTENING",
            Self::Thinking => "THINKING",
            Self::Speaking => "SPEAKING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An effective status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Status before the change
    pub from: Status,
    /// Status after the change
    pub to: Status,
}

/// Status state machine
#[derive(Debug)]
pub struct StatusMachine {
    current: Status,
    listening: bool,
    speaking: bool,
    tx: broadcast::Sender<Transition>,
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusMachine {
    /// Create a machine in the idle state
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            current: Status::Idle,
            listening: false,
            speaking: false,
            tx,
        }
    }

    /// Current status
    #[must_use]
    pub const fn current(&self) -> Status {
        self.current
    }

    /// Whether a capture session is open
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    /// Whether an utterance is being vocalized
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Subscribe to effective transitions
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.tx.subscribe()
    }

    /// Capture started: Idle → Listening
    pub fn begin_listening(&mut self) -> bool {
        self.listening = true;
        self.current == Status::Idle && self.set(Status::Listening)
    }

    /// Capture ended: Listening → Idle
    ///
    /// Ignored if another state has been entered since listening began.
    pub fn end_listening(&mut self) -> bool {
        self.listening = false;
        self.current == Status::Listening && self.set(Status::Idle)
    }

    /// A user message was accepted: any → Thinking
    pub fn begin_thinking(&mut self) -> bool {
        self.set(Status::Thinking)
    }

    /// Vocalization started: Thinking or Idle → Speaking
    pub fn begin_speaking(&mut self) -> bool {
        self.speaking = true;
        matches!(self.current, Status::Thinking | Status::Idle) && self.set(Status::Speaking)
    }

    /// Vocalization ended: Speaking → Idle
    pub fn end_speaking(&mut self) -> bool {
        self.speaking = false;
        self.current == Status::Speaking && self.set(Status::Idle)
    }

    /// Unrecoverable condition: any → Error
    pub fn fail(&mut self) -> bool {
        self.set(Status::Error)
    }

    /// Failure has been surfaced: Error → Idle
    pub fn recover(&mut self) -> bool {
        self.current == Status::Error && self.set(Status::Idle)
    }

    /// End of a request cycle: Thinking or Error → Idle
    ///
    /// Leaves Speaking (and Listening) untouched.
    pub fn settle(&mut self) -> bool {
        matches!(self.current, Status::Thinking | Status::Error) && self.set(Status::Idle)
    }

    fn set(&mut self, next: Status) -> bool {
        if self.current == next {
            return false;
        }
        let transition = Transition {
            from: self.current,
            to: next,
        };
        self.current = next;
        tracing::debug!(from = %transition.from, to = %transition.to, "status changed");
        // No subscribers is fine
        let _ = self.tx.send(transition);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<Transition>) -> Vec<Status> {
        let mut seen = Vec::new();
        while let Ok(t) = rx.try_recv() {
            seen.push(t.to);
        }
        seen
    }

    #[test]
    fn test_initial_state() {
        let machine = StatusMachine::new();
        assert_eq!(machine.current(), Status::Idle);
        assert!(!machine.is_listening());
        assert!(!machine.is_speaking());
    }

    #[test]
    fn test_reply_cycle() {
        let mut machine = StatusMachine::new();
        let mut rx = machine.subscribe();

        assert!(machine.begin_thinking());
        assert!(machine.begin_speaking());
        assert!(!machine.settle());
        assert!(machine.end_speaking());

        assert_eq!(
            drain(&mut rx),
            [Status::Thinking, Status::Speaking, Status::Idle]
        );
    }

    #[test]
    fn test_listening_cycle() {
        let mut machine = StatusMachine::new();
        assert!(machine.begin_listening());
        assert_eq!(machine.current(), Status::Listening);
        assert!(machine.end_listening());
        assert_eq!(machine.current(), Status::Idle);
    }

    #[test]
    fn test_listening_only_from_idle() {
        let mut machine = StatusMachine::new();
        machine.begin_thinking();
        assert!(!machine.begin_listening());
        assert_eq!(machine.current(), Status::Thinking);
        assert!(machine.is_listening());
    }

    #[test]
    fn test_stale_listening_end_does_not_clobber_speaking() {
        let mut machine = StatusMachine::new();
        machine.begin_listening();
        machine.begin_thinking();
        machine.begin_speaking();

        assert!(!machine.end_listening());
        assert_eq!(machine.current(), Status::Speaking);
    }

    #[test]
    fn test_stale_speaking_end_does_not_clobber_listening() {
        let mut machine = StatusMachine::new();
        machine.begin_listening();

        assert!(!machine.end_speaking());
        assert_eq!(machine.current(), Status::Listening);
    }

    #[test]
    fn test_listening_does_not_interrupt_speaking() {
        let mut machine = StatusMachine::new();
        machine.begin_speaking();
        assert!(!machine.begin_listening());
        assert_eq!(machine.current(), Status::Speaking);
    }

    #[test]
    fn test_fail_and_recover() {
        let mut machine = StatusMachine::new();
        machine.begin_thinking();
        assert!(machine.fail());
        assert_eq!(machine.current(), Status::Error);
        assert!(machine.recover());
        assert_eq!(machine.current(), Status::Idle);
        assert!(!machine.recover());
    }

    #[test]
    fn test_settle_from_thinking() {
        let mut machine = StatusMachine::new();
        machine.begin_thinking();
        assert!(machine.settle());
        assert_eq!(machine.current(), Status::Idle);
    }

    #[test]
    fn test_repeated_state_is_not_a_transition() {
        let mut machine = StatusMachine::new();
        let mut rx = machine.subscribe();
        machine.begin_thinking();
        assert!(!machine.begin_thinking());
        assert_eq!(drain(&mut rx), [Status::Thinking]);
    }
}
