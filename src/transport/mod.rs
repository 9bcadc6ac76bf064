//! Adapters between a byte [`crate::channel::Channel`] and [`Request`]/
//! [`Response`] messages.

use crate::message::{Request, Response};

pub mod legacy;
pub mod packet;

/// Turns bytes on a channel into requests, and responses back into bytes.
///
/// One transport owns (borrows) exactly one channel. `poll` does any
/// background byte-accumulation work; `receive` extracts at most one
/// complete request per call (callers loop until it returns `None`); `send`
/// ships a response back over the same transport the request came from.
pub trait Transport {
    /// Pull whatever bytes are currently available from the channel into
    /// this transport's internal accumulator. Default: no-op (some
    /// transports, like the legacy byte-based ones, do their reading inside
    /// `receive` instead).
    fn poll(&mut self) {}

    /// Try to extract one complete request. Returns `None` if no complete
    /// request is available right now (never blocks).
    fn receive(&mut self) -> Option<Request>;

    /// Send a response back over this transport.
    fn send(&mut self, response: &Response);
}
