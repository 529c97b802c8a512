use std::collections::HashMap;

use tracing::debug;

/// Identifies one inference request for a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    label: String,
    generation: u64,
}

impl RequestTicket {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Per-label request generation counters.
///
/// Starting a request hands out a ticket with the next generation for its
/// label. A response is accepted only if no newer request for that label
/// has already completed; older responses arriving late are discarded.
#[derive(Debug, Clone, Default)]
pub struct RequestGenerations {
    issued: HashMap<String, u64>,
    completed: HashMap<String, u64>,
}

impl RequestGenerations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request for `label`.
    pub fn begin(&mut self, label: &str) -> RequestTicket {
        let generation = self.issued.entry(label.to_owned()).or_insert(0);
        *generation += 1;
        debug!(label, generation = *generation, "inference request started");
        RequestTicket {
            label: label.to_owned(),
            generation: *generation,
        }
    }

    /// Whether a response for `ticket` would be accepted now.
    #[must_use]
    pub fn accepts(&self, ticket: &RequestTicket) -> bool {
        ticket.generation > self.completed.get(&ticket.label).copied().unwrap_or(0)
    }

    /// Records a response for `ticket`. Returns `false` if a newer request
    /// for the same label has already completed.
    pub fn complete(&mut self, ticket: &RequestTicket) -> bool {
        let last = self.completed.entry(ticket.label.clone()).or_insert(0);
        if ticket.generation <= *last {
            return false;
        }
        *last = ticket.generation;
        true
    }

    /// The newest generation handed out for `label`, 0 if none.
    #[must_use]
    pub fn latest(&self, label: &str) -> u64 {
        self.issued.get(label).copied().unwrap_or(0)
    }

    /// Whether a request newer than `ticket` has been started.
    #[must_use]
    pub fn is_superseded(&self, ticket: &RequestTicket) -> bool {
        self.latest(&ticket.label) > ticket.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_response_is_discarded() {
        let mut gens = RequestGenerations::new();
        let first = gens.begin("liver");
        let second = gens.begin("liver");
        assert!(gens.is_superseded(&first));

        assert!(gens.complete(&second));
        assert!(!gens.accepts(&first));
        assert!(!gens.complete(&first));
    }

    #[test]
    fn superseded_request_still_lands_if_first() {
        let mut gens = RequestGenerations::new();
        let first = gens.begin("liver");
        let second = gens.begin("liver");
        assert!(gens.complete(&first));
        assert!(gens.complete(&second));
        assert!(!gens.complete(&second));
    }

    #[test]
    fn labels_are_independent() {
        let mut gens = RequestGenerations::new();
        let liver = gens.begin("liver");
        let spleen = gens.begin("spleen");
        assert_eq!(liver.generation(), 1);
        assert_eq!(spleen.generation(), 1);
        assert!(gens.complete(&spleen));
        assert!(gens.complete(&liver));
        assert_eq!(gens.latest("kidney"), 0);
    }
}
