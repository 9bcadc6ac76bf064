/*! FujiNet-NIO: an I/O runtime for a retro-computer peripheral bridge.

It presents disk, printer, network, clock, and modem peripherals to a
vintage host bus while the actual logic runs on a modern processor. A bus
transport turns wire bytes into [`message::Request`]s, a [`router::Router`]
dispatches each one to a registered [`device::Device`] (or to an override
handler that has taken over the bus), and an [`engine::Engine`] ties the
whole thing together on a single cooperative thread.

# Architecture overview

```text
 [ host bus ] <-> [ Transport ] -> Request -> [ Router ] -> [ Registry ] -> [ Device ]
                                                  |
                                          [ override handler ]
```

A typical composition wires up a packet-framed or legacy transport, a
modem device, and whatever else the host expects, registers them with an
[`engine::Engine`], and calls [`engine::Engine::tick`] on a fixed cadence.
*/
#![warn(missing_docs)]

pub mod channel;
pub mod codec;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod legacy_net;
pub mod message;
pub mod modem;
pub mod net;
pub mod registry;
pub mod router;
pub mod service;
pub mod transport;

pub use error::{Error, Result};
pub use message::{DeviceId, Request, RequestId, RequestType, Response, StatusCode};
