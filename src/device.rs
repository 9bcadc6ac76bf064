//! Virtual device abstraction: the capability every disk/printer/clock/
//! network/modem handler implements.

use crate::message::{Request, Response};

/// A single virtual device behind a [`crate::registry::Registry`].
///
/// Implementations must not change `Request`/`Response` correlation fields
/// (`id`, `device_id`); the registry enforces this regardless.
pub trait Device {
    /// Handle one request, producing a response.
    fn handle(&mut self, request: &Request) -> Response;

    /// Called periodically so the device can advance its own state machine
    /// (e.g. the modem's TCP pump and listen poll). Devices may not assume
    /// any particular tick rate, only that ticks keep coming while the
    /// engine runs. Default: no-op.
    fn poll(&mut self) {}
}
