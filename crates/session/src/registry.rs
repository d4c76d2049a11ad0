//! Registry of running service instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use veilnet_core::event::{AppEvent, ServiceStatusChanged};
use veilnet_core::service::ServiceState;
use veilnet_bus::Publisher;

use crate::instance::Instance;

/// All services this node currently offers, keyed by instance ID.
///
/// State transitions go through the registry so every change is announced
/// on the bus for the state keeper to fold in.
pub struct ServiceRegistry {
    publisher: Arc<dyn Publisher>,
    services: Mutex<HashMap<String, Arc<Instance>>>,
}

impl ServiceRegistry {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            services: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, instance: Arc<Instance>) {
        self.services
            .lock()
            .expect("service registry poisoned")
            .insert(instance.id().to_string(), instance);
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Instance>> {
        self.services.lock().expect("service registry poisoned").remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Instance>> {
        self.services.lock().expect("service registry poisoned").get(id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<Instance>> {
        self.services
            .lock()
            .expect("service registry poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Advance a service's lifecycle state and announce the change.
    pub fn transition(&self, id: &str, next: ServiceState) -> bool {
        let Some(instance) = self.get(id) else {
            return false;
        };
        instance.set_state(next);
        self.publisher.publish(AppEvent::ServiceStatus(ServiceStatusChanged {
            id: id.to_string(),
            status: next,
        }));
        true
    }
}
