//! Uniform random selection policy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{backend::Backend, SelectionPolicy};

#[derive(Debug, Default)]
pub struct RandomChoice;

impl RandomChoice {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionPolicy for RandomChoice {
    fn candidate(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..backends.len());
        Some(backends[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Upstream;
    use crate::test_support::ScriptedConnector;

    #[test]
    fn draws_stay_within_the_set() {
        let backends: Vec<_> = (0..3)
            .map(|i| {
                Arc::new(Backend::new(
                    Upstream::parse("127.0.0.1", 7000 + i).unwrap(),
                    1,
                    Arc::new(ScriptedConnector::default()),
                ))
            })
            .collect();

        let lb = RandomChoice::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            let pick = lb.candidate(&backends).unwrap();
            seen.insert(pick.authority().to_string());
        }
        assert_eq!(seen.len(), 3);
        assert!(lb.candidate(&[]).is_none());
    }
}
