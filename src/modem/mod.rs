//! Modem device: AT-command state machine, ring buffers, dial/listen/answer
//! over TCP, and minimal Telnet option negotiation (spec §4.9).

pub mod at;
pub mod device;
pub mod ring;
pub mod telnet;

pub use device::ModemDevice;
