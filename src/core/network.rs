//! Collective communication between metric workers.
//!
//! Metric state is combined across workers right before reduction. This
//! module provides the capability the metrics depend on: a [`Collective`]
//! that can all-gather opaque byte buffers, and typed helpers layered on
//! top of it. All-reduce is implemented as all-gather followed by a local
//! fold, which is the cheap choice for the small payloads metric states are.
//!
//! Every collective call is a barrier. All workers must reach it the same
//! number of times or the group deadlocks; nothing here times out.

use crate::core::error::{MetricsError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::{Arc, Barrier, Mutex};

/// A group of workers that can exchange buffers.
pub trait Collective: Send + Sync + Debug {
    /// Total number of workers in the group.
    fn world_size(&self) -> usize;

    /// Rank of this worker, in `0..world_size()`.
    fn rank(&self) -> usize;

    /// Gather one buffer from every worker. The result is ordered by rank
    /// and identical on every worker.
    fn all_gather_bytes(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>>;

    /// Whether there is more than one worker.
    fn is_distributed(&self) -> bool {
        self.world_size() > 1
    }
}

/// Single-process collective: every operation returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCollective;

impl Collective for LocalCollective {
    fn world_size(&self) -> usize {
        1
    }

    fn rank(&self) -> usize {
        0
    }

    fn all_gather_bytes(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        Ok(vec![local])
    }
}

/// Shared rendezvous area for [`ThreadCollective`] workers.
#[derive(Debug)]
struct ThreadGroupState {
    world_size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Option<Vec<u8>>>>,
}

/// In-process collective where each worker is a thread.
///
/// Create the whole group with [`ThreadCollective::group`] and hand one
/// handle to each thread.
#[derive(Debug, Clone)]
pub struct ThreadCollective {
    rank: usize,
    shared: Arc<ThreadGroupState>,
}

impl ThreadCollective {
    /// Create handles for `world_size` workers, indexed by rank.
    pub fn group(world_size: usize) -> Vec<ThreadCollective> {
        let world_size = world_size.max(1);
        let shared = Arc::new(ThreadGroupState {
            world_size,
            barrier: Barrier::new(world_size),
            slots: Mutex::new(vec![None; world_size]),
        });

        (0..world_size)
            .map(|rank| ThreadCollective {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Collective for ThreadCollective {
    fn world_size(&self) -> usize {
        self.shared.world_size
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn all_gather_bytes(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        {
            let mut slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| MetricsError::distributed("collective slots poisoned"))?;
            slots[self.rank] = Some(local);
        }

        self.shared.barrier.wait();

        let gathered = {
            let slots = self
                .shared
                .slots
                .lock()
                .map_err(|_| MetricsError::distributed("collective slots poisoned"))?;
            slots
                .iter()
                .enumerate()
                .map(|(rank, slot)| {
                    slot.clone().ok_or_else(|| {
                        MetricsError::distributed(format!("worker {} did not contribute", rank))
                    })
                })
                .collect::<Result<Vec<_>>>()
        };

        // Nobody may overwrite a slot until every worker has read the round.
        self.shared.barrier.wait();

        gathered
    }
}

/// Gather a serializable value from every worker, ordered by rank.
pub fn all_gather<T>(collective: &dyn Collective, local: &T) -> Result<Vec<T>>
where
    T: Serialize + DeserializeOwned + Clone,
{
    if !collective.is_distributed() {
        return Ok(vec![local.clone()]);
    }

    let bytes = bincode::serialize(local)?;
    let gathered = collective.all_gather_bytes(bytes)?;

    log::debug!(
        "rank {} gathered {} buffers",
        collective.rank(),
        gathered.len()
    );

    gathered
        .iter()
        .map(|buffer| bincode::deserialize(buffer).map_err(MetricsError::from))
        .collect()
}

/// All-reduce by all-gather: gather every worker's value, then fold them in
/// rank order with `reducer`.
pub fn all_reduce<T, F>(collective: &dyn Collective, local: &T, mut reducer: F) -> Result<T>
where
    T: Serialize + DeserializeOwned + Clone,
    F: FnMut(&mut T, T) -> Result<()>,
{
    let mut values = all_gather(collective, local)?.into_iter();
    let mut acc = values
        .next()
        .ok_or_else(|| MetricsError::distributed("all-reduce over an empty group"))?;
    for value in values {
        reducer(&mut acc, value)?;
    }
    Ok(acc)
}
