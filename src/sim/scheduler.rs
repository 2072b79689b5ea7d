// ---------------------------------------------------------------------------
// Deferred follow-up actions
// ---------------------------------------------------------------------------

/// Work to be done at the start of a later tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredAction {
    /// Rebuild actuator models and re-register them with the active profile.
    RefreshActuators,
}

#[derive(Debug, Clone, Copy)]
struct Task {
    action: DeferredAction,
    due: f64, // s, simulation time
}

/// Debounced queue of deferred actions keyed by simulation time.
///
/// Scheduling an action that is already pending pushes its due time back
/// instead of queueing it twice, so a burst of structural changes results in
/// a single refresh once things settle.
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, action: DeferredAction, due: f64) {
        match self.tasks.iter_mut().find(|t| t.action == action) {
            Some(task) => task.due = due,
            None => self.tasks.push(Task { action, due }),
        }
    }

    pub fn is_pending(&self, action: DeferredAction) -> bool {
        self.tasks.iter().any(|t| t.action == action)
    }

    /// Remove and return every action due at `now`.
    pub fn take_due(&mut self, now: f64) -> Vec<DeferredAction> {
        let mut due = Vec::new();
        self.tasks.retain(|t| {
            if t.due <= now {
                due.push(t.action);
                false
            } else {
                true
            }
        });
        due
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_when_due() {
        let mut s = Scheduler::new();
        s.schedule(DeferredAction::RefreshActuators, 1.0);
        assert!(s.take_due(0.5).is_empty());
        assert_eq!(s.take_due(1.0), vec![DeferredAction::RefreshActuators]);
        assert!(s.take_due(2.0).is_empty());
    }

    #[test]
    fn rescheduling_debounces() {
        let mut s = Scheduler::new();
        s.schedule(DeferredAction::RefreshActuators, 1.0);
        s.schedule(DeferredAction::RefreshActuators, 1.4);
        assert!(s.take_due(1.2).is_empty());
        assert!(s.is_pending(DeferredAction::RefreshActuators));
        assert_eq!(s.take_due(1.5).len(), 1);
    }
}
