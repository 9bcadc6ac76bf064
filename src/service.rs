//! The I/O service loop (spec §4.5): one cooperative pass over every
//! registered transport.

use crate::router::RequestHandler;
use crate::transport::Transport;

/// Owns a flat list of transports and drives one pass of the cooperative
/// loop at a time. No thread of its own: callers (the engine, or a test)
/// decide when `service_once` runs.
#[derive(Default)]
pub struct IoService {
    transports: Vec<Box<dyn Transport>>,
}

impl IoService {
    /// Create a service with no transports registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transport. Order determines poll/drain order within a pass,
    /// not priority across passes.
    pub fn add_transport(&mut self, transport: Box<dyn Transport>) {
        self.transports.push(transport);
    }

    /// How many transports are registered.
    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    /// One pass: poll each transport, then drain its `receive()` in a tight
    /// loop, dispatching each request through `handler` and shipping the
    /// response back on the *same* transport before moving to the next one.
    ///
    /// Responses go out in request-arrival order per transport; there is no
    /// ordering guarantee across transports.
    pub fn service_once(&mut self, handler: &mut dyn RequestHandler) {
        for transport in &mut self.transports {
            transport.poll();
            while let Some(request) = transport.receive() {
                let response = handler.handle_request(&request);
                transport.send(&response);
            }
        }
    }
}
