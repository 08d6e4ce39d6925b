//! Reference session.
//!
//! Filters the catalog up front and pops from a queue; the real session
//! scans slots with a cursor. Both must reveal the same items.

use std::collections::VecDeque;

use reckon_core::SessionState;
use reckon_proto::{Item, ItemKinds};

use super::operation::{Operation, Outcome};

/// Reference implementation of one session.
#[derive(Debug, Clone)]
pub struct ModelSession {
    catalog: Vec<Item>,
    state: SessionState,
    queue: VecDeque<Item>,
    revealed: Vec<Item>,
}

impl ModelSession {
    /// Fresh session over `catalog`.
    pub fn new(catalog: Vec<Item>) -> Self {
        Self {
            catalog,
            state: SessionState::Created,
            queue: VecDeque::new(),
            revealed: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every item revealed so far, in order.
    pub fn revealed(&self) -> &[Item] {
        &self.revealed
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> Outcome {
        match op {
            Operation::LogIn { correct_key } => self.log_in(*correct_key),
            Operation::Init { kinds, limit } => self.init(Operation::kind_set(*kinds), *limit),
            Operation::Fetch => self.fetch(),
            Operation::FetchBatch { count } => self.fetch_batch(*count),
            Operation::SaveSummary { tamper } => self.save_summary(*tamper),
            Operation::LogOut => self.log_out(),
        }
    }

    fn log_in(&mut self, correct_key: bool) -> Outcome {
        if !correct_key {
            return Outcome::InvalidKey;
        }
        if self.state != SessionState::Created {
            return Outcome::Violation;
        }
        self.state = SessionState::Opened;
        Outcome::Done
    }

    fn init(&mut self, kinds: ItemKinds, limit: i8) -> Outcome {
        if self.state != SessionState::Opened || kinds.is_empty() || limit <= 0 {
            return Outcome::Flag(false);
        }
        self.start(kinds);
        Outcome::Flag(true)
    }

    fn start(&mut self, kinds: ItemKinds) {
        self.queue = self.catalog.iter().filter(|item| kinds.allows(item.kind())).cloned().collect();
        self.state = SessionState::Iterated;
    }

    // Whether iteration can proceed; `Err` is the outcome to report instead
    fn begin_fetch(&mut self) -> Result<(), Outcome> {
        match self.state {
            SessionState::Created | SessionState::Closed => Err(Outcome::Violation),
            SessionState::Depleted => Err(Outcome::Ended),
            SessionState::Opened => {
                self.start(ItemKinds::A);
                Ok(())
            },
            SessionState::Iterated => Ok(()),
        }
    }

    fn fetch(&mut self) -> Outcome {
        if let Err(outcome) = self.begin_fetch() {
            return outcome;
        }
        // Non-A items in the way are skipped for good
        while let Some(item) = self.queue.pop_front() {
            if let Item::A(found) = item {
                self.revealed.push(Item::A(found.clone()));
                return Outcome::Item(found);
            }
        }
        self.state = SessionState::Depleted;
        Outcome::Ended
    }

    fn fetch_batch(&mut self, count: i8) -> Outcome {
        let Ok(count) = usize::try_from(count) else {
            return Outcome::Violation;
        };
        if count == 0 {
            return Outcome::Violation;
        }
        if let Err(outcome) = self.begin_fetch() {
            return outcome;
        }

        let take = count.min(self.queue.len());
        let batch: Vec<Item> = self.queue.drain(..take).collect();
        if batch.len() < count {
            self.state = SessionState::Depleted;
        }
        if batch.is_empty() {
            return Outcome::Ended;
        }
        self.revealed.extend(batch.iter().cloned());
        Outcome::Items(batch)
    }

    fn save_summary(&self, tamper: bool) -> Outcome {
        if self.state != SessionState::Depleted {
            return Outcome::Violation;
        }
        Outcome::Flag(!tamper)
    }

    fn log_out(&mut self) -> Outcome {
        match self.state {
            SessionState::Opened | SessionState::Iterated | SessionState::Depleted => {
                self.state = SessionState::Closed;
                Outcome::Done
            },
            SessionState::Created | SessionState::Closed => Outcome::Violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use reckon_proto::{ItemA, ItemC};

    use super::*;

    fn catalog() -> Vec<Item> {
        vec![
            Item::A(ItemA { field_x: "a".into(), field_y: vec![], field_z: None }),
            Item::C(ItemC { field_x: true }),
        ]
    }

    #[test]
    fn default_iteration_skips_other_kinds() {
        let mut model = ModelSession::new(catalog());
        model.apply(&Operation::LogIn { correct_key: true });

        assert!(matches!(model.apply(&Operation::Fetch), Outcome::Item(_)));
        assert_eq!(model.apply(&Operation::Fetch), Outcome::Ended);
        assert_eq!(model.state(), SessionState::Depleted);
    }

    #[test]
    fn single_fetch_skips_other_allowed_kinds() {
        let mut model = ModelSession::new(catalog().into_iter().rev().collect());
        model.apply(&Operation::LogIn { correct_key: true });
        assert_eq!(model.apply(&Operation::Init { kinds: 0b111, limit: 2 }), Outcome::Flag(true));

        assert!(matches!(model.apply(&Operation::Fetch), Outcome::Item(_)));
        assert_eq!(model.apply(&Operation::FetchBatch { count: 1 }), Outcome::Ended);
        assert_eq!(model.revealed().len(), 1);
    }

    #[test]
    fn short_batch_depletes() {
        let mut model = ModelSession::new(catalog());
        model.apply(&Operation::LogIn { correct_key: true });
        assert_eq!(model.apply(&Operation::Init { kinds: 0b101, limit: 1 }), Outcome::Flag(true));

        assert!(matches!(model.apply(&Operation::FetchBatch { count: 3 }), Outcome::Items(items) if items.len() == 2));
        assert_eq!(model.state(), SessionState::Depleted);
        assert_eq!(model.apply(&Operation::SaveSummary { tamper: false }), Outcome::Flag(true));
    }
}
