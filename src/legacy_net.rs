//! Legacy eight-slot network-id compatibility layer (spec §4.8).
//!
//! Vintage hosts that predate the binary network-service protocol address up
//! to eight open channels as device ids `0x71..0x78` and speak single-letter
//! verbs (`O`/`C`/`R`/`W`/`S`) in the request's `command` byte. This adapter
//! rewrites those requests into the modern network device's (`0xFD`) request
//! shape and keeps the per-slot bookkeeping the legacy wire format has no
//! room to carry itself. It implements [`RequestHandler`] so it can sit in
//! front of a [`crate::registry::Registry`] as a [`crate::router::Router`]
//! override, forwarding anything outside its device range untouched.

use log::{debug, warn};

use crate::message::{Request, RequestType, Response, StatusCode};
use crate::router::RequestHandler;

/// Device id the legacy range is translated to.
pub const MODERN_NETWORK_DEVICE: u8 = 0xFD;

const LEGACY_FIRST: u8 = 0x71;
const LEGACY_LAST: u8 = 0x78;

/// Bytes requested on a Status probe read, bounded so one status call can't
/// pull an unbounded amount of the stream into `pending_read` (spec §9 open
/// question (b)).
const STATUS_PROBE_LEN: u32 = 512;

/// Per-slot state (spec §3 "Legacy network slot"), one per legacy device id
/// in `0x71..0x78`. Created on Open, retained across frames, released on
/// Close.
#[derive(Debug, Default, Clone)]
struct Slot {
    handle: u16,
    next_read_offset: u32,
    next_write_offset: u32,
    awaiting_commit: bool,
    pending_read: Vec<u8>,
    pending_eof: bool,
}

/// Translates legacy single-letter-verb requests on `0x71..0x78` into the
/// modern network device's request shape, forwarding anything else
/// untouched to `backend`.
pub struct LegacyNetworkAdapter<H: RequestHandler> {
    backend: H,
    slots: [Option<Slot>; 8],
    next_id: u32,
}

impl<H: RequestHandler> LegacyNetworkAdapter<H> {
    /// Wrap `backend` (typically a [`crate::registry::Registry`] holding the
    /// modern network device at [`MODERN_NETWORK_DEVICE`]).
    pub fn new(backend: H) -> Self {
        Self {
            backend,
            slots: Default::default(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    /// Issue one request against the modern network device and return its
    /// raw response (still carrying the modern request's id, not the
    /// legacy caller's).
    fn forward(&mut self, kind: RequestType, params: Vec<u32>, payload: Vec<u8>) -> Response {
        let id = self.next_id();
        let mut req = Request::new(id, MODERN_NETWORK_DEVICE, kind, 0);
        req.params = params;
        req.payload = payload;
        self.backend.handle_request(&req)
    }

    fn handle_open(&mut self, slot_idx: usize, request: &Request) -> Response {
        // aux1 carries an HTTP-style method code; the modern device
        // interprets it, the legacy side only threads it through.
        let method = request.params.first().copied().unwrap_or(0);
        let resp = self.forward(RequestType::Open, vec![method], request.payload.clone());
        if resp.status != StatusCode::Ok {
            return Response::error(request.id, request.device_id, request.command, resp.status);
        }
        if resp.payload.len() < 2 {
            warn!("legacy-net open on slot {slot_idx}: backend returned no handle");
            return Response::error(request.id, request.device_id, request.command, StatusCode::InternalError);
        }
        let handle = u16::from_le_bytes([resp.payload[0], resp.payload[1]]);
        self.slots[slot_idx] = Some(Slot { handle, ..Slot::default() });
        debug!("legacy-net slot {slot_idx} opened, handle={handle}");
        Response::ok(request.id, request.device_id, request.command)
    }

    fn handle_read(&mut self, slot_idx: usize, request: &Request) -> Response {
        let max_len = request.params.first().copied().unwrap_or(0) as usize;
        let Some(slot) = self.slots[slot_idx].as_mut() else {
            return Response::error(request.id, request.device_id, request.command, StatusCode::NotReady);
        };

        if !slot.pending_read.is_empty() {
            let take = max_len.min(slot.pending_read.len());
            let data: Vec<u8> = slot.pending_read.drain(..take).collect();
            return ok_with_payload(request, data);
        }
        if max_len == 0 {
            return ok_with_payload(request, Vec::new());
        }

        let handle = slot.handle;
        let offset = slot.next_read_offset;
        let resp = self.forward(RequestType::Read, vec![handle as u32, offset, max_len as u32], Vec::new());
        if resp.status != StatusCode::Ok {
            return Response::error(request.id, request.device_id, request.command, resp.status);
        }
        let n = resp.payload.len();
        if let Some(slot) = self.slots[slot_idx].as_mut() {
            slot.next_read_offset = slot.next_read_offset.wrapping_add(n as u32);
            slot.pending_eof = n < max_len;
        }
        ok_with_payload(request, resp.payload)
    }

    fn handle_write(&mut self, slot_idx: usize, request: &Request) -> Response {
        let Some(slot) = self.slots[slot_idx].as_ref() else {
            return Response::error(request.id, request.device_id, request.command, StatusCode::NotReady);
        };
        let handle = slot.handle;
        let offset = slot.next_write_offset;
        // A nonzero aux param signals a known content length; zero/absent
        // means an indeterminate-length POST/PUT upload.
        let known_length = request.params.first().copied().unwrap_or(0) != 0;
        let resp = self.forward(RequestType::Write, vec![handle as u32, offset], request.payload.clone());
        if resp.status == StatusCode::Ok {
            if let Some(slot) = self.slots[slot_idx].as_mut() {
                slot.next_write_offset = slot.next_write_offset.wrapping_add(request.payload.len() as u32);
                if !known_length {
                    slot.awaiting_commit = true;
                }
            }
        }
        status_only(request, resp.status)
    }

    fn handle_close(&mut self, slot_idx: usize, request: &Request) -> Response {
        let Some(slot) = self.slots[slot_idx].take() else {
            return Response::ok(request.id, request.device_id, request.command);
        };
        let commit = u32::from(slot.awaiting_commit);
        let resp = self.forward(RequestType::Close, vec![slot.handle as u32, commit], Vec::new());
        debug!("legacy-net slot {slot_idx} closed (commit={commit})");
        status_only(request, resp.status)
    }

    fn handle_status(&mut self, slot_idx: usize, request: &Request) -> Response {
        // The one case the adapter invents a response without reaching the
        // backend: a Status on a slot that was never opened.
        let Some(slot) = self.slots[slot_idx].as_ref() else {
            return ok_with_payload(request, status_payload(0, false));
        };

        if !slot.pending_read.is_empty() || slot.pending_eof {
            let waiting = slot.pending_read.len() as u16;
            return ok_with_payload(request, status_payload(waiting, slot.pending_eof));
        }

        let handle = slot.handle;
        let offset = slot.next_read_offset;
        let resp = self.forward(RequestType::Read, vec![handle as u32, offset, STATUS_PROBE_LEN], Vec::new());
        if resp.status != StatusCode::Ok {
            return Response::error(request.id, request.device_id, request.command, resp.status);
        }
        let eof = (resp.payload.len() as u32) < STATUS_PROBE_LEN;
        let waiting = resp.payload.len() as u16;
        if let Some(slot) = self.slots[slot_idx].as_mut() {
            slot.pending_read = resp.payload;
            slot.pending_eof = eof;
        }
        ok_with_payload(request, status_payload(waiting, eof))
    }
}

/// Legacy status payload shape: 2-byte LE bytes-waiting count, then an EOF
/// flag byte.
fn status_payload(waiting: u16, eof: bool) -> Vec<u8> {
    let mut out = waiting.to_le_bytes().to_vec();
    out.push(u8::from(eof));
    out
}

fn ok_with_payload(request: &Request, payload: Vec<u8>) -> Response {
    let mut r = Response::ok(request.id, request.device_id, request.command);
    r.payload = payload;
    r
}

/// Propagate a backend status with no payload, correlated to the legacy
/// request's own id/device_id/command — used by Write/Close, whose legacy
/// responses never carry a body.
fn status_only(request: &Request, status: StatusCode) -> Response {
    Response {
        id: request.id,
        device_id: request.device_id,
        status,
        command: request.command,
        payload: Vec::new(),
    }
}

impl<H: RequestHandler> RequestHandler for LegacyNetworkAdapter<H> {
    fn handle_request(&mut self, request: &Request) -> Response {
        if !(LEGACY_FIRST..=LEGACY_LAST).contains(&request.device_id) {
            return self.backend.handle_request(request);
        }
        let slot_idx = (request.device_id - LEGACY_FIRST) as usize;
        match request.command {
            b'O' => self.handle_open(slot_idx, request),
            b'C' => self.handle_close(slot_idx, request),
            b'R' => self.handle_read(slot_idx, request),
            b'W' => self.handle_write(slot_idx, request),
            b'S' => self.handle_status(slot_idx, request),
            _ => Response::error(request.id, request.device_id, request.command, StatusCode::InvalidRequest),
        }
    }
}
