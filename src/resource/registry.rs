use std::sync::{Arc, Mutex};

use super::handle::ResourceHandle;
use super::{Resource, ResourceId};
use crate::utils::hash::FastHashMap;

/// Keeps track of every resource that has been handed to the framework, so their GPU
/// twins can be torn down when the application drops them, or when the framework shuts
/// down.
#[derive(Default)]
pub(crate) struct Registry {
    handles: Mutex<FastHashMap<ResourceId, Arc<ResourceHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Gets the handle of `resource`, registering it on first sight.
    pub fn handle(&self, resource: &dyn Resource) -> Arc<ResourceHandle> {
        let mut handles = self.handles.lock().unwrap();
        handles
            .entry(resource.id())
            .or_insert_with(|| Arc::new(ResourceHandle::new(resource)))
            .clone()
    }

    pub fn get(&self, id: ResourceId) -> Option<Arc<ResourceHandle>> {
        self.handles.lock().unwrap().get(&id).cloned()
    }

    /// Forgets every handle whose resource has been dropped by the application. Returns
    /// the ones that have not been destroyed yet.
    pub fn collect(&self) -> Vec<Arc<ResourceHandle>> {
        let mut handles = self.handles.lock().unwrap();
        let mut orphans = Vec::new();

        handles.retain(|_, handle| {
            if handle.is_reachable() {
                return true;
            }

            if !handle.is_destroyed() {
                orphans.push(handle.clone());
            }

            false
        });

        orphans
    }

    /// Returns every registered handle.
    pub fn handles(&self) -> Vec<Arc<ResourceHandle>> {
        self.handles.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}
