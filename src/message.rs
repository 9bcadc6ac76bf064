//! The request/response vocabulary shared by every transport and device.
//!
//! A [`Request`] is a transport's view of "the host wants something done to
//! device X"; a [`Response`] is the dispatcher's (or device's) answer.
//! Transports build `Request`s from wire bytes and never inspect payload
//! contents; devices never touch `id`/`device_id` except to read them.

/// 8-bit logical device address, scoped to this process.
pub type DeviceId = u8;

/// 32-bit monotonic counter assigned by the originating transport.
///
/// Unique within a transport's lifetime; used only to correlate a
/// [`Response`] back to its [`Request`].
pub type RequestId = u32;

/// High-level kind of operation a [`Request`] asks a device to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// Generic command/operation, device-specific meaning in `command`.
    Command,
    /// Host wants to read data from the device.
    Read,
    /// Host sends data to be written/stored.
    Write,
    /// Open a logical channel / file / session.
    Open,
    /// Close a logical channel / file / session.
    Close,
    /// Misc control (ioctl-style), not fitting the above.
    Control,
}

/// Unified view of a host -> device operation.
///
/// `device_id` is set by the transport from wire addressing; `params` and
/// `payload` are opaque below the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Correlates to [`Response::id`].
    pub id: RequestId,
    /// Which virtual device this is for.
    pub device_id: DeviceId,
    /// What kind of operation this is.
    pub kind: RequestType,
    /// Device-specific command/subcode.
    pub command: u8,
    /// Ordered sequence of parameters, opaque below the transport.
    pub params: Vec<u32>,
    /// Raw payload from host to device.
    pub payload: Vec<u8>,
}

impl Request {
    /// Build a request with no params and no payload.
    pub fn new(id: RequestId, device_id: DeviceId, kind: RequestType, command: u8) -> Self {
        Self {
            id,
            device_id,
            kind,
            command,
            params: Vec::new(),
            payload: Vec::new(),
        }
    }
}

/// Result of a device handling a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Success.
    Ok,
    /// No device registered for the requested id.
    DeviceNotFound,
    /// Device rejected the inputs.
    InvalidRequest,
    /// Temporary: try again.
    DeviceBusy,
    /// Prerequisite state missing (e.g. not connected).
    NotReady,
    /// Downstream I/O failure.
    IOError,
    /// Operation timed out.
    Timeout,
    /// Operation/command not supported.
    Unsupported,
    /// Unexpected invariant violation.
    InternalError,
}

impl StatusCode {
    /// Ordinal encoding used as `param[0]` by the packet-framed transport
    /// (spec §4.2: "inserts `response.status` as the first u8 parameter").
    pub fn to_wire_u8(self) -> u8 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::DeviceNotFound => 1,
            StatusCode::InvalidRequest => 2,
            StatusCode::DeviceBusy => 3,
            StatusCode::NotReady => 4,
            StatusCode::IOError => 5,
            StatusCode::Timeout => 6,
            StatusCode::Unsupported => 7,
            StatusCode::InternalError => 8,
        }
    }

    /// Inverse of [`StatusCode::to_wire_u8`]; unknown values map to
    /// `InternalError` rather than panicking.
    pub fn from_wire_u8(v: u8) -> StatusCode {
        match v {
            0 => StatusCode::Ok,
            1 => StatusCode::DeviceNotFound,
            2 => StatusCode::InvalidRequest,
            3 => StatusCode::DeviceBusy,
            4 => StatusCode::NotReady,
            5 => StatusCode::IOError,
            6 => StatusCode::Timeout,
            7 => StatusCode::Unsupported,
            _ => StatusCode::InternalError,
        }
    }
}

/// Device -> host response.
///
/// `id` and `device_id` MUST equal the originating request's; the
/// dispatcher enforces this even if a device mutates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Must match the originating [`Request::id`].
    pub id: RequestId,
    /// Must match the originating [`Request::device_id`].
    pub device_id: DeviceId,
    /// Outcome of the operation.
    pub status: StatusCode,
    /// Echoed/assigned command code, device-specific.
    pub command: u8,
    /// Raw payload back to the host.
    pub payload: Vec<u8>,
}

impl Response {
    /// Build a bare `Ok` response with no payload.
    pub fn ok(id: RequestId, device_id: DeviceId, command: u8) -> Self {
        Self {
            id,
            device_id,
            status: StatusCode::Ok,
            command,
            payload: Vec::new(),
        }
    }

    /// Build an error response (empty payload) with the given status.
    pub fn error(id: RequestId, device_id: DeviceId, command: u8, status: StatusCode) -> Self {
        Self {
            id,
            device_id,
            status,
            command,
            payload: Vec::new(),
        }
    }
}
