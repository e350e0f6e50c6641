/// Where a producer is in waiting for its result.
///
/// ```text
///   Enqueued ──▶ Polling(0) ──not ready──▶ Polling(1) ──▶ ... ──▶ TimedOut
///                   │                          │
///                   └────────ready─────────────┴──────▶ Delivered
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum AwaitState<R> {
    /// The item is in the queue; nothing has been polled yet.
    Enqueued,

    /// `attempts` polls have come back not ready.
    Polling { attempts: u32 },

    /// The result arrived and has been consumed from the store, after
    /// `attempts` polls that came back not ready.
    Delivered { result: R, attempts: u32 },

    /// Every allowed attempt came back not ready.
    TimedOut { attempts: u32 },
}

impl<R> AwaitState<R> {
    /// Whether polling has finished, one way or the other.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AwaitState::Delivered { .. } | AwaitState::TimedOut { .. })
    }

    /// Number of polls that have come back not ready.
    pub fn attempts(&self) -> u32 {
        match self {
            AwaitState::Enqueued => 0,
            AwaitState::Polling { attempts }
            | AwaitState::Delivered { attempts, .. }
            | AwaitState::TimedOut { attempts } => *attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!AwaitState::<()>::Enqueued.is_terminal());
        assert!(!AwaitState::<()>::Polling { attempts: 2 }.is_terminal());
        assert!(AwaitState::Delivered { result: 1, attempts: 0 }.is_terminal());
        assert!(AwaitState::<()>::TimedOut { attempts: 3 }.is_terminal());
        assert_eq!(AwaitState::<()>::TimedOut { attempts: 3 }.attempts(), 3);
        assert_eq!(AwaitState::Delivered { result: "late", attempts: 4 }.attempts(), 4);
    }
}
