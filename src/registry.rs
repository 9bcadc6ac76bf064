//! Device registry: exclusive-ownership map from device id to device.

use std::collections::HashMap;

use crate::device::Device;
use crate::message::{DeviceId, Request, Response, StatusCode};

/// Owns every registered [`Device`] and dispatches requests to them.
///
/// Registration fails (returns `false`) if the id is already bound, mirroring
/// the original `IODeviceManager::registerDevice`. Dispatch always forces
/// the response's `id`/`device_id` to match the request, even if a device
/// handler mutates them (spec §4.7, §8 "Dispatch correlation").
#[derive(Default)]
pub struct Registry {
    devices: HashMap<DeviceId, Box<dyn Device>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device for a given id. Returns `false` if already bound.
    pub fn register(&mut self, id: DeviceId, device: Box<dyn Device>) -> bool {
        if self.devices.contains_key(&id) {
            return false;
        }
        self.devices.insert(id, device);
        true
    }

    /// Remove a device by id. Returns `true` if one was removed.
    pub fn unregister(&mut self, id: DeviceId) -> bool {
        self.devices.remove(&id).is_some()
    }

    /// Number of currently registered devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Dispatch a request to its device, or `DeviceNotFound` if unbound.
    pub fn dispatch(&mut self, request: &Request) -> Response {
        let Some(device) = self.devices.get_mut(&request.device_id) else {
            return Response::error(
                request.id,
                request.device_id,
                request.command,
                StatusCode::DeviceNotFound,
            );
        };
        let mut resp = device.handle(request);
        // Enforce correlation regardless of what the device did.
        resp.id = request.id;
        resp.device_id = request.device_id;
        resp
    }

    /// Fan out a tick to every registered device. Poll order is stable
    /// within this registry's lifetime but otherwise unspecified.
    pub fn poll_devices(&mut self) {
        for device in self.devices.values_mut() {
            device.poll();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RequestType;

    struct Echo;
    impl Device for Echo {
        fn handle(&mut self, request: &Request) -> Response {
            // Deliberately mutate the correlation fields to prove the
            // registry overwrites them.
            Response {
                id: request.id.wrapping_add(1),
                device_id: request.device_id.wrapping_add(1),
                status: StatusCode::Ok,
                command: request.command,
                payload: request.payload.clone(),
            }
        }
    }

    #[test]
    fn register_rejects_duplicate_id() {
        let mut reg = Registry::new();
        assert!(reg.register(1, Box::new(Echo)));
        assert!(!reg.register(1, Box::new(Echo)));
        assert_eq!(reg.device_count(), 1);
    }

    #[test]
    fn missing_device_returns_not_found() {
        let mut reg = Registry::new();
        let req = Request::new(5, 0x99, RequestType::Command, 1);
        let resp = reg.dispatch(&req);
        assert_eq!(resp.status, StatusCode::DeviceNotFound);
        assert_eq!(resp.id, 5);
        assert_eq!(resp.device_id, 0x99);
        assert!(resp.payload.is_empty());
    }

    #[test]
    fn dispatch_forces_correlation_even_if_device_lies() {
        let mut reg = Registry::new();
        reg.register(7, Box::new(Echo));
        let req = Request::new(42, 7, RequestType::Command, 0);
        let resp = reg.dispatch(&req);
        assert_eq!(resp.id, 42);
        assert_eq!(resp.device_id, 7);
    }

    #[test]
    fn unregister_removes_device() {
        let mut reg = Registry::new();
        reg.register(1, Box::new(Echo));
        assert!(reg.unregister(1));
        assert!(!reg.unregister(1));
        assert_eq!(reg.device_count(), 0);
    }
}
