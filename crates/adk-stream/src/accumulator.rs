use crate::errors::AccumulatorError;
use crate::models::content::Fragment;
use crate::models::message::{Message, ABORTED_REASON};
use crate::models::role::Role;

#[derive(Debug, Default)]
enum State {
    #[default]
    Unopened,
    Open(Message),
    Closed(Message),
}

/// Owns the one in-flight message of a streaming exchange.
///
/// Every operation returns a fresh snapshot of the message; snapshots handed out
/// earlier are never affected by later operations. A closed accumulator may open a new
/// message, but the closed message itself can no longer change.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    state: State,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, role: Role) -> Result<Message, AccumulatorError> {
        if let State::Open(message) = &self.state {
            return Err(AccumulatorError::AlreadyOpen {
                id: message.id().to_string(),
            });
        }
        let message = Message::open(role);
        self.state = State::Open(message.clone());
        Ok(message)
    }

    /// Append fragments in order. An empty batch returns the message unchanged.
    pub fn append(&mut self, fragments: Vec<Fragment>) -> Result<Message, AccumulatorError> {
        let message = self.take_open()?;
        let message = if fragments.is_empty() {
            message
        } else {
            message.with_fragments(fragments)
        };
        self.state = State::Open(message.clone());
        Ok(message)
    }

    pub fn close(
        &mut self,
        termination_reason: Option<String>,
    ) -> Result<Message, AccumulatorError> {
        let message = self.take_open()?.closed(termination_reason.unwrap_or_default());
        self.state = State::Closed(message.clone());
        Ok(message)
    }

    /// Close the open message after a failed or abandoned exchange
    pub fn discard(&mut self) -> Result<Message, AccumulatorError> {
        let message = self.take_open()?.closed(ABORTED_REASON.to_string());
        self.state = State::Closed(message.clone());
        Ok(message)
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// The latest snapshot, whether open or closed
    pub fn current(&self) -> Option<&Message> {
        match &self.state {
            State::Unopened => None,
            State::Open(message) | State::Closed(message) => Some(message),
        }
    }

    fn take_open(&mut self) -> Result<Message, AccumulatorError> {
        match std::mem::take(&mut self.state) {
            State::Open(message) => Ok(message),
            State::Closed(message) => {
                let id = message.id().to_string();
                self.state = State::Closed(message);
                Err(AccumulatorError::AlreadyClosed { id })
            }
            State::Unopened => Err(AccumulatorError::NotOpen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(message: &Message) -> Vec<&str> {
        message
            .fragments()
            .iter()
            .map(|f| f.rendered_text.as_str())
            .collect()
    }

    #[test]
    fn test_lifecycle() -> Result<(), AccumulatorError> {
        let mut accumulator = MessageAccumulator::new();
        assert!(accumulator.current().is_none());

        let opened = accumulator.open(Role::Agent)?;
        assert!(opened.is_open());
        assert!(opened.termination_reason().is_none());
        assert!(opened.fragments().is_empty());

        let updated = accumulator.append(vec![Fragment::text("a"), Fragment::text("b")])?;
        assert_eq!(updated.id(), opened.id());
        assert_eq!(texts(&updated), vec!["a", "b"]);

        let closed = accumulator.close(Some("STOP".to_string()))?;
        assert!(!closed.is_open());
        assert_eq!(closed.termination_reason(), Some("STOP"));
        assert_eq!(texts(&closed), vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn test_snapshots_are_independent() -> Result<(), AccumulatorError> {
        let mut accumulator = MessageAccumulator::new();
        let opened = accumulator.open(Role::Agent)?;
        let first = accumulator.append(vec![Fragment::text("one")])?;
        let second = accumulator.append(vec![Fragment::text("two")])?;

        assert!(opened.fragments().is_empty());
        assert_eq!(texts(&first), vec!["one"]);
        assert_eq!(texts(&second), vec!["one", "two"]);
        Ok(())
    }

    #[test]
    fn test_adjacent_text_is_not_merged() -> Result<(), AccumulatorError> {
        let mut accumulator = MessageAccumulator::new();
        accumulator.open(Role::Agent)?;
        accumulator.append(vec![Fragment::text("Hel")])?;
        accumulator.append(vec![Fragment::text("lo")])?;
        let closed = accumulator.close(None)?;
        assert_eq!(closed.fragments().len(), 2);
        assert_eq!(closed.termination_reason(), Some(""));
        Ok(())
    }

    #[test]
    fn test_empty_append_is_noop() -> Result<(), AccumulatorError> {
        let mut accumulator = MessageAccumulator::new();
        accumulator.open(Role::Agent)?;
        let before = accumulator.append(vec![Fragment::text("x")])?;
        let after = accumulator.append(Vec::new())?;
        assert_eq!(before, after);
        Ok(())
    }

    #[test]
    fn test_open_twice_fails() -> Result<(), AccumulatorError> {
        let mut accumulator = MessageAccumulator::new();
        let opened = accumulator.open(Role::Agent)?;
        assert_eq!(
            accumulator.open(Role::Agent),
            Err(AccumulatorError::AlreadyOpen {
                id: opened.id().to_string()
            })
        );
        Ok(())
    }

    #[test]
    fn test_operations_before_open_fail() {
        let mut accumulator = MessageAccumulator::new();
        assert_eq!(
            accumulator.append(vec![Fragment::text("x")]),
            Err(AccumulatorError::NotOpen)
        );
        assert_eq!(accumulator.close(None), Err(AccumulatorError::NotOpen));
        assert_eq!(accumulator.discard(), Err(AccumulatorError::NotOpen));
    }

    #[test]
    fn test_closed_message_rejects_everything() -> Result<(), AccumulatorError> {
        let mut accumulator = MessageAccumulator::new();
        accumulator.open(Role::Agent)?;
        let closed = accumulator.close(Some("STOP".to_string()))?;
        let expected = Err(AccumulatorError::AlreadyClosed {
            id: closed.id().to_string(),
        });

        assert_eq!(accumulator.append(vec![Fragment::text("late")]), expected);
        assert_eq!(accumulator.close(None), expected);
        assert_eq!(accumulator.discard(), expected);
        // The closed message is untouched by the failed calls
        assert_eq!(accumulator.current(), Some(&closed));
        Ok(())
    }

    #[test]
    fn test_discard_marks_aborted_and_keeps_fragments() -> Result<(), AccumulatorError> {
        let mut accumulator = MessageAccumulator::new();
        accumulator.open(Role::Agent)?;
        accumulator.append(vec![Fragment::text("partial")])?;
        let discarded = accumulator.discard()?;
        assert!(!discarded.is_open());
        assert_eq!(discarded.termination_reason(), Some(ABORTED_REASON));
        assert_eq!(texts(&discarded), vec!["partial"]);
        assert!(matches!(
            accumulator.discard(),
            Err(AccumulatorError::AlreadyClosed { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_reopen_after_close() -> Result<(), AccumulatorError> {
        let mut accumulator = MessageAccumulator::new();
        let first = accumulator.open(Role::Agent)?;
        accumulator.close(None)?;
        let second = accumulator.open(Role::Agent)?;
        assert_ne!(first.id(), second.id());
        assert!(accumulator.is_open());
        Ok(())
    }
}
