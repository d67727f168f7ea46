use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::app::{NewsError, Result};
use crate::domain::FeedKey;

/// Generation counter per cache partition.
///
/// Opening a session for a partition supersedes every earlier session of
/// the same partition; sessions of other partitions are unaffected.
#[derive(Default)]
pub struct SessionRegistry {
    generations: Mutex<HashMap<String, u64>>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn begin(self: &Arc<Self>, key: &FeedKey) -> SessionToken {
        let partition = key.partition();
        let generation = {
            let mut generations = self
                .generations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let generation = generations.entry(partition.clone()).or_insert(0);
            *generation += 1;
            *generation
        };

        debug!("Paging session {} opened for {}", generation, key);
        SessionToken {
            partition,
            generation,
            registry: Arc::clone(self),
        }
    }

    pub fn current(&self, partition: &str) -> Option<u64> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(partition)
            .copied()
    }
}

pub struct SessionToken {
    partition: String,
    generation: u64,
    registry: Arc<SessionRegistry>,
}

impl SessionToken {
    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.registry.current(&self.partition) == Some(self.generation)
    }

    /// Run `write` only while this session is current.
    ///
    /// The registry stays locked for the duration, so no newer session can
    /// open between the check and the write.
    pub fn commit<T>(&self, write: impl FnOnce() -> Result<T>) -> Result<T> {
        let generations = self
            .registry
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if generations.get(&self.partition) != Some(&self.generation) {
            return Err(NewsError::SessionSuperseded);
        }
        write()
    }
}
