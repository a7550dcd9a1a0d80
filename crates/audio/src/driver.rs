//! Component driver registry.
//!
//! Maps a component type id to the driver that creates its operation table.
//! Filled once at firmware init, before the topology is shared between cores.

use alloc::sync::Arc;

use crate::component::ComponentDriver;
use crate::error::GraphError;

/// Maximum number of distinct component types.
pub const MAX_DRIVERS: usize = 16;

/// Type id → driver table.
#[derive(Default)]
pub struct DriverRegistry {
    entries: heapless::Vec<(u32, Arc<dyn ComponentDriver>), MAX_DRIVERS>,
}

impl DriverRegistry {
    /// Empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    /// Register `driver` for `comp_type`.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateDriver`] if the type is taken,
    /// [`GraphError::CapacityExceeded`] if the table is full.
    pub fn register(
        &mut self,
        comp_type: u32,
        driver: Arc<dyn ComponentDriver>,
    ) -> Result<(), GraphError> {
        if self.get(comp_type).is_some() {
            return Err(GraphError::DuplicateDriver(comp_type));
        }
        self.entries
            .push((comp_type, driver))
            .map_err(|_| GraphError::CapacityExceeded)
    }

    /// Driver for `comp_type`, if registered.
    #[must_use]
    pub fn get(&self, comp_type: u32) -> Option<&Arc<dyn ComponentDriver>> {
        self.entries
            .iter()
            .find(|(t, _)| *t == comp_type)
            .map(|(_, d)| d)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
