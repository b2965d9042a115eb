use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Run state shared by all engines.
///
/// `Running -> Paused <-> Running -> Destroyed`. An engine is Running as
/// soon as its constructor returns; before that there is no engine. Destroyed
/// is terminal: `play` after `destroy` stays destroyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Paused,
    Destroyed,
}

impl EngineState {
    pub fn is_stepping(self) -> bool {
        self == EngineState::Running
    }

    pub fn is_destroyed(self) -> bool {
        self == EngineState::Destroyed
    }

    pub fn paused(self) -> Self {
        match self {
            EngineState::Running => EngineState::Paused,
            s => s,
        }
    }

    pub fn resumed(self) -> Self {
        match self {
            EngineState::Paused => EngineState::Running,
            s => s,
        }
    }
}

/// Owner side of a liveness flag. Async completions hold a
/// [`LivenessToken`] and must check it before touching the owner's state.
#[derive(Debug)]
pub struct Liveness {
    alive: Rc<Cell<bool>>,
}

#[derive(Clone, Debug)]
pub struct LivenessToken {
    alive: Weak<Cell<bool>>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            alive: Rc::new(Cell::new(true)),
        }
    }

    pub fn token(&self) -> LivenessToken {
        LivenessToken {
            alive: Rc::downgrade(&self.alive),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// Idempotent.
    pub fn kill(&self) {
        self.alive.set(false);
    }
}

impl Drop for Liveness {
    fn drop(&mut self) {
        self.alive.set(false);
    }
}

impl LivenessToken {
    pub fn is_alive(&self) -> bool {
        self.alive.upgrade().is_some_and(|a| a.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroyed_is_terminal() {
        let s = EngineState::Destroyed;
        assert_eq!(s.resumed(), EngineState::Destroyed);
        assert_eq!(s.paused(), EngineState::Destroyed);
        assert_eq!(EngineState::Running.paused().resumed(), EngineState::Running);
    }

    #[test]
    fn token_observes_kill_and_drop() {
        let owner = Liveness::new();
        let token = owner.token();
        assert!(token.is_alive());
        owner.kill();
        owner.kill();
        assert!(!token.is_alive());

        let owner = Liveness::new();
        let token = owner.token();
        drop(owner);
        assert!(!token.is_alive());
    }
}
