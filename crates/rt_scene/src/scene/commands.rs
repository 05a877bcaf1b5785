//! Deferred spawn and removal
//!
//! The simulation pass holds a mutable borrow of the instance store, so
//! spawns and removals requested while it runs are queued here and applied
//! once the pass is over, before the next frame starts.

use crate::error::SceneError;

use super::instance::Instance;
use super::instance_store::{InstanceHandle, InstanceStore};
use super::model_registry::ModelRegistry;

/// One queued change to the instance set
#[derive(Debug, Clone, PartialEq)]
pub enum PendingCommand {
    /// Add an instance
    Spawn(Instance),
    /// Remove an instance
    Remove(InstanceHandle),
}

/// Outcome of draining the queue
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Handles of instances that were added, in queue order
    pub spawned: Vec<InstanceHandle>,
    /// Number of instances removed
    pub removed: usize,
    /// Commands that could not be applied
    pub rejected: Vec<SceneError>,
}

impl ApplyReport {
    /// True when the instance set changed
    pub fn changed(&self) -> bool {
        !self.spawned.is_empty() || self.removed > 0
    }
}

/// FIFO of changes waiting for the end of the current pass
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Vec<PendingCommand>,
}

impl CommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an instance for insertion
    pub fn spawn(&mut self, instance: Instance) {
        self.pending.push(PendingCommand::Spawn(instance));
    }

    /// Queue an instance for removal
    pub fn remove(&mut self, handle: InstanceHandle) {
        self.pending.push(PendingCommand::Remove(handle));
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply every queued command in order
    ///
    /// Spawns referencing an unregistered model or carrying non-finite
    /// parameters are rejected, as are removals of stale handles. Rejections
    /// are logged and returned; the remaining commands still apply.
    pub fn apply(&mut self, store: &mut InstanceStore, registry: &ModelRegistry) -> ApplyReport {
        let mut report = ApplyReport::default();

        for command in self.pending.drain(..) {
            match command {
                PendingCommand::Spawn(instance) => {
                    if !registry.contains(instance.model) {
                        log::warn!("Dropping queued spawn of unknown {}", instance.model);
                        report.rejected.push(SceneError::UnknownModel(instance.model));
                        continue;
                    }
                    if let Err(err) = instance.validate() {
                        log::warn!("Dropping queued spawn: {}", err);
                        report.rejected.push(err);
                        continue;
                    }
                    report.spawned.push(store.add(instance));
                }
                PendingCommand::Remove(handle) => match store.remove(handle) {
                    Ok(_) => report.removed += 1,
                    Err(err) => {
                        log::warn!("Dropping queued removal: {}", err);
                        report.rejected.push(err);
                    }
                },
            }
        }

        if report.changed() {
            log::debug!(
                "Applied deferred commands: {} spawned, {} removed, {} rejected",
                report.spawned.len(),
                report.removed,
                report.rejected.len()
            );
        }
        report
    }

    /// Drop every queued command
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
