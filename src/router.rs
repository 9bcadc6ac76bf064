//! Dispatch with override-handler precedence.
//!
//! The `Router` sits in front of the [`crate::registry::Registry`] and can
//! have an "override" handler installed that intercepts *every* request
//! regardless of device id — the mechanism a modem "takeover" session (or a
//! legacy addressing adapter) uses to steal the bus.

use crate::message::{Request, Response};
use crate::registry::Registry;

/// A broader capability than [`crate::device::Device`]: anything that can
/// answer a [`Request`], without necessarily being bound to a single device
/// id. The [`Router`] and the legacy network adapter both implement this so
/// they can stand in for the registry without being a `Device` themselves
/// (spec §9 "Polymorphism").
pub trait RequestHandler {
    /// Handle a single request and produce a response.
    fn handle_request(&mut self, request: &Request) -> Response;
}

impl RequestHandler for Registry {
    fn handle_request(&mut self, request: &Request) -> Response {
        self.dispatch(request)
    }
}

/// Routes every request to an override handler if one is installed,
/// otherwise to the device registry.
///
/// The override is modeled as owned (`Box<dyn RequestHandler>`) rather than
/// a borrowed pointer: Rust's ownership rules make a literal non-owning
/// pointer awkward to use safely, and an owned, install/relinquish handoff
/// gives the same observable behavior (set/clear take effect on the very
/// next dispatched request, and the override's prior owner gets it back on
/// `clear_override`).
pub struct Router {
    registry: Registry,
    override_handler: Option<Box<dyn RequestHandler>>,
}

impl Router {
    /// Wrap a registry with no override installed.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            override_handler: None,
        }
    }

    /// Install a global override handler, taking effect on the next
    /// dispatched request.
    pub fn set_override(&mut self, handler: Box<dyn RequestHandler>) {
        self.override_handler = Some(handler);
    }

    /// Remove any installed override, handing ownership back to the caller.
    /// Subsequent requests go to the registry.
    pub fn clear_override(&mut self) -> Option<Box<dyn RequestHandler>> {
        self.override_handler.take()
    }

    /// Whether an override is currently installed.
    pub fn has_override(&self) -> bool {
        self.override_handler.is_some()
    }

    /// Access the underlying registry (e.g. to register/unregister devices,
    /// or call `poll_devices` from the engine).
    pub fn registry(&mut self) -> &mut Registry {
        &mut self.registry
    }
}

impl RequestHandler for Router {
    fn handle_request(&mut self, request: &Request) -> Response {
        if let Some(handler) = self.override_handler.as_mut() {
            handler.handle_request(request)
        } else {
            self.registry.dispatch(request)
        }
    }
}
