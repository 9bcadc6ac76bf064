//! The modem [`Device`]: AT command/data dichotomy, ring buffers, dial and
//! listen/answer over TCP, Telnet option negotiation, and the escape-to-
//! command-mode guard (spec §4.9).

use log::{debug, info, warn};

use crate::device::Device;
use crate::message::{Request, RequestType, Response};
use crate::modem::at::{parse_at_line, AtCommand, ResultCode, PERMITTED_BAUD_RATES};
use crate::modem::ring::ByteRing;
use crate::modem::telnet::{escape_outgoing, TelnetFilter};
use crate::net::{IoOutcome, TcpSocketOps};

const TO_HOST_CAPACITY: usize = 4096;
const TO_NET_CAPACITY: usize = 1024;

/// ~2s at a nominal 50ms tick.
pub const RING_INTERVAL_TICKS: u64 = 40;
/// ~60s.
pub const RING_TIMEOUT_TICKS: u64 = RING_INTERVAL_TICKS * 30;
/// ~1s.
pub const ANSWER_DELAY_TICKS: u64 = 20;
/// Window within which three `'+'` bytes must arrive to trigger the escape
/// to command mode.
const ESCAPE_GUARD_TICKS: u64 = 20;

const PUMP_CHUNK: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Command,
    Data,
}

#[derive(Default)]
struct EscapeDetector {
    count: u8,
    first_tick: Option<u64>,
}

impl EscapeDetector {
    fn note(&mut self, byte: u8, tick_now: u64) -> bool {
        if byte != b'+' {
            self.count = 0;
            self.first_tick = None;
            return false;
        }
        if self.count == 0 {
            self.first_tick = Some(tick_now);
        }
        self.count += 1;
        if self.count >= 3 {
            let within_window = self
                .first_tick
                .is_some_and(|t| tick_now.saturating_sub(t) <= ESCAPE_GUARD_TICKS);
            self.count = 0;
            self.first_tick = None;
            return within_window;
        }
        false
    }
}

/// A stream-oriented modem device (spec §4.9).
pub struct ModemDevice<S: TcpSocketOps> {
    socket_ops: S,
    socket: Option<S::Socket>,
    listener: Option<S::Listener>,
    pending_accept: Option<S::Socket>,

    mode: Mode,
    connected: bool,
    line_buf: String,
    /// Command-mode echo and result-code text, waiting to be read. Distinct
    /// from `to_host`: the rings carry network data, this carries the
    /// modem's own chatter, so the diagnostic cursors below track only
    /// actual network traffic.
    cmd_out: std::collections::VecDeque<u8>,
    echo: bool,
    verbose: bool,
    auto_answer_rings: u8,
    baud: u32,
    baud_lock: bool,
    listen_port: u16,

    to_host: ByteRing,
    to_net: ByteRing,
    host_write_cursor: u32,
    host_read_cursor: u32,
    net_write_cursor: u32,
    net_read_cursor: u32,

    telnet: TelnetFilter,
    telnet_enabled: bool,
    net_send_backlog: Vec<u8>,
    escape: EscapeDetector,

    tick_now: u64,
    pending_since_tick: Option<u64>,
    ring_last_emit_tick: Option<u64>,
    answer_after_tick: Option<u64>,
}

impl<S: TcpSocketOps> ModemDevice<S> {
    /// Build a modem with default settings (verbose, echo on, no
    /// auto-answer, 1200 baud, Telnet negotiation enabled).
    pub fn new(socket_ops: S, listen_port: u16) -> Self {
        Self {
            socket_ops,
            socket: None,
            listener: None,
            pending_accept: None,
            mode: Mode::Command,
            connected: false,
            line_buf: String::new(),
            cmd_out: std::collections::VecDeque::new(),
            echo: true,
            verbose: true,
            auto_answer_rings: 0,
            baud: 1200,
            baud_lock: false,
            listen_port,
            to_host: ByteRing::new(TO_HOST_CAPACITY),
            to_net: ByteRing::new(TO_NET_CAPACITY),
            host_write_cursor: 0,
            host_read_cursor: 0,
            net_write_cursor: 0,
            net_read_cursor: 0,
            telnet: TelnetFilter::new(),
            telnet_enabled: true,
            net_send_backlog: Vec::new(),
            escape: EscapeDetector::default(),
            tick_now: 0,
            pending_since_tick: None,
            ring_last_emit_tick: None,
            answer_after_tick: None,
        }
    }

    /// Build a modem seeded from a loaded [`crate::config::ModemDefaults`]
    /// record (echo, verbose, baud, listen port, auto-answer rings) instead
    /// of the hardcoded defaults `new` uses.
    pub fn with_defaults(socket_ops: S, defaults: &crate::config::ModemDefaults) -> Self {
        let mut modem = Self::new(socket_ops, defaults.listen_port);
        modem.echo = defaults.echo;
        modem.verbose = defaults.verbose;
        modem.auto_answer_rings = defaults.auto_answer_rings;
        modem.baud = defaults.baud;
        modem
    }

    /// Change the advertised baud rate. Rejected (returns `false`) if
    /// `baudLock` is set or the value isn't in [`PERMITTED_BAUD_RATES`].
    pub fn set_baud(&mut self, baud: u32) -> bool {
        if self.baud_lock || !PERMITTED_BAUD_RATES.contains(&baud) {
            return false;
        }
        self.baud = baud;
        true
    }

    /// Lock the baud rate against further changes.
    pub fn lock_baud(&mut self) {
        self.baud_lock = true;
    }

    /// Enable/disable local echo of command-mode input.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Enable/disable verbose (word) result codes in favor of numeric ones.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set how many rings to wait before auto-answering an incoming call.
    /// Zero disables auto-answer.
    pub fn set_auto_answer_rings(&mut self, rings: u8) {
        self.auto_answer_rings = rings;
    }

    /// Enable/disable Telnet IAC filtering on the data stream.
    pub fn set_telnet_enabled(&mut self, enabled: bool) {
        self.telnet_enabled = enabled;
    }

    fn emit_result(&mut self, code: ResultCode) {
        let line = code.render(self.verbose);
        self.cmd_out.extend(line.into_bytes());
    }

    fn emit_to_host(&mut self, bytes: &[u8]) {
        let n = self.to_host.push_slice(bytes);
        self.host_write_cursor = self.host_write_cursor.wrapping_add(n as u32);
        if n < bytes.len() {
            warn!("modem to-host ring overflow, dropped {} bytes", bytes.len() - n);
        }
    }

    fn hang_up(&mut self) {
        if let Some(socket) = self.socket.take() {
            self.socket_ops.close(socket);
        }
        self.connected = false;
        self.mode = Mode::Command;
        self.net_send_backlog.clear();
    }

    fn answer_pending(&mut self) {
        let Some(socket) = self.pending_accept.take() else {
            return;
        };
        self.socket = Some(socket);
        self.connected = true;
        self.mode = Mode::Data;
        self.pending_since_tick = None;
        self.ring_last_emit_tick = None;
        self.answer_after_tick = None;
        info!("modem answered incoming call");
        self.emit_result(ResultCode::Connect(self.baud));
    }

    fn process_at_line(&mut self) {
        let line = std::mem::take(&mut self.line_buf);
        let cmd = parse_at_line(&line);
        debug!("modem AT command: {line:?} -> {cmd:?}");
        match cmd {
            AtCommand::Noop => self.emit_result(ResultCode::Ok),
            AtCommand::Reset => {
                if self.connected {
                    self.hang_up();
                }
                self.echo = true;
                self.verbose = true;
                self.auto_answer_rings = 0;
                self.baud_lock = false;
                self.emit_result(ResultCode::Ok);
            }
            AtCommand::Dial { host, port } => self.dial(&host, port),
            AtCommand::HangUp => {
                self.hang_up();
                self.emit_result(ResultCode::Ok);
            }
            AtCommand::Answer => {
                if self.pending_accept.is_some() {
                    self.answer_pending();
                } else {
                    self.emit_result(ResultCode::Error);
                }
            }
            AtCommand::ReturnToData => {
                if self.connected {
                    self.mode = Mode::Data;
                    self.emit_result(ResultCode::Connect(self.baud));
                } else {
                    self.emit_result(ResultCode::Error);
                }
            }
            AtCommand::SetEcho(echo) => {
                self.echo = echo;
                self.emit_result(ResultCode::Ok);
            }
            AtCommand::SetVerbose(verbose) => {
                self.verbose = verbose;
                self.emit_result(ResultCode::Ok);
            }
            AtCommand::SetAutoAnswer(n) => {
                self.auto_answer_rings = n;
                self.emit_result(ResultCode::Ok);
            }
            AtCommand::QueryAutoAnswer => {
                let line = format!("{}\r\n", self.auto_answer_rings);
                self.cmd_out.extend(line.into_bytes());
            }
            AtCommand::Unknown => self.emit_result(ResultCode::Error),
        }
    }

    fn dial(&mut self, host: &str, port: u16) {
        match self.socket_ops.connect(host, port) {
            IoOutcome::Ready(socket) => {
                self.socket = Some(socket);
                self.connected = true;
                self.mode = Mode::Data;
                info!("modem dialed {host}:{port}");
                self.emit_result(ResultCode::Connect(self.baud));
            }
            IoOutcome::WouldBlock => {
                // Our StdTcpSocketOps connects synchronously; a WouldBlock
                // here would mean a connect-in-progress model we don't
                // implement yet. Treat as failure rather than wedge.
                warn!("modem dial {host}:{port}: connect did not complete synchronously");
                self.emit_result(ResultCode::NoCarrier);
            }
            IoOutcome::Fatal(e) => {
                warn!("modem dial {host}:{port} failed: {e}");
                self.emit_result(ResultCode::NoCarrier);
            }
        }
    }

    fn handle_write(&mut self, payload: &[u8]) {
        for &b in payload {
            match self.mode {
                Mode::Command => {
                    if self.echo {
                        self.cmd_out.push_back(b);
                    }
                    if b == b'\r' || b == b'\n' {
                        if !self.line_buf.is_empty() {
                            self.process_at_line();
                        }
                    } else {
                        self.line_buf.push(b as char);
                    }
                }
                Mode::Data => {
                    if self.escape.note(b, self.tick_now) {
                        info!("modem escaped to command mode");
                        self.mode = Mode::Command;
                        continue;
                    }
                    let n = self.to_net.push_slice(&[b]);
                    self.net_write_cursor = self.net_write_cursor.wrapping_add(n as u32);
                }
            }
        }
    }

    /// Command-mode chatter (echo, result codes) always drains first — this
    /// is what lets a `CONNECT` line emitted right as the mode flips to
    /// `Data` still reach the host. Network data only drains once that
    /// chatter is exhausted and the modem is actually in data mode.
    fn handle_read(&mut self, max_len: usize) -> Vec<u8> {
        let want_cmd = if max_len == 0 { self.cmd_out.len() } else { max_len.min(self.cmd_out.len()) };
        let mut out: Vec<u8> = self.cmd_out.drain(..want_cmd).collect();

        if self.mode == Mode::Data {
            let remaining = if max_len == 0 { self.to_host.len() } else { max_len - out.len() };
            let mut buf = vec![0u8; remaining.min(self.to_host.len())];
            let n = self.to_host.pop_into(&mut buf);
            buf.truncate(n);
            self.host_read_cursor = self.host_read_cursor.wrapping_add(n as u32);
            out.extend(buf);
        }
        out
    }

    fn status_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(26);
        out.push(u8::from(self.mode == Mode::Command));
        out.push(u8::from(self.connected));
        out.extend_from_slice(&(self.to_host.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.to_net.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.host_write_cursor.to_le_bytes());
        out.extend_from_slice(&self.host_read_cursor.to_le_bytes());
        out.extend_from_slice(&self.net_write_cursor.to_le_bytes());
        out.extend_from_slice(&self.net_read_cursor.to_le_bytes());
        out
    }

    fn pump_incoming(&mut self) {
        if self.socket.is_none() {
            return;
        }
        loop {
            let room = self.to_host.free_space();
            if room == 0 {
                break;
            }
            let mut scratch = vec![0u8; room.min(PUMP_CHUNK)];
            // Re-borrow `self.socket` fresh each iteration rather than
            // holding one binding live across the `send`/`emit_to_host`
            // calls below, which also need to borrow `self`.
            let outcome = self.socket_ops.recv(self.socket.as_mut().unwrap(), &mut scratch);
            match outcome {
                IoOutcome::Ready(0) => {
                    info!("modem peer closed the connection");
                    self.hang_up();
                    self.emit_result(ResultCode::NoCarrier);
                    break;
                }
                IoOutcome::Ready(n) => {
                    let chunk = &scratch[..n];
                    let (data, reply) = if self.telnet_enabled {
                        self.telnet.filter(chunk)
                    } else {
                        (chunk.to_vec(), Vec::new())
                    };
                    if !reply.is_empty() {
                        let _ = self.socket_ops.send(self.socket.as_mut().unwrap(), &reply);
                    }
                    self.emit_to_host(&data);
                }
                IoOutcome::WouldBlock => break,
                IoOutcome::Fatal(e) => {
                    warn!("modem socket read failed: {e}");
                    self.hang_up();
                    self.emit_result(ResultCode::NoCarrier);
                    break;
                }
            }
        }
    }

    fn pump_outgoing(&mut self) {
        if self.net_send_backlog.is_empty() {
            if self.to_net.is_empty() {
                return;
            }
            let mut chunk = vec![0u8; self.to_net.len().min(PUMP_CHUNK)];
            let n = self.to_net.pop_into(&mut chunk);
            chunk.truncate(n);
            self.net_send_backlog = if self.telnet_enabled {
                escape_outgoing(&chunk)
            } else {
                chunk
            };
        }
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match self.socket_ops.send(socket, &self.net_send_backlog) {
            IoOutcome::Ready(n) => {
                self.net_read_cursor = self.net_read_cursor.wrapping_add(n as u32);
                self.net_send_backlog.drain(..n);
            }
            IoOutcome::WouldBlock => {}
            IoOutcome::Fatal(e) => {
                warn!("modem socket write failed: {e}");
                self.hang_up();
                self.emit_result(ResultCode::NoCarrier);
            }
        }
    }

    fn pump_listen(&mut self) {
        if self.connected {
            return;
        }
        if self.listener.is_none() && self.auto_answer_rings > 0 {
            match self.socket_ops.listen(self.listen_port) {
                Ok(listener) => self.listener = Some(listener),
                Err(e) => warn!("modem failed to open listen socket: {e}"),
            }
        }
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        if self.pending_accept.is_none() {
            if let IoOutcome::Ready(socket) = self.socket_ops.accept(listener) {
                self.pending_accept = Some(socket);
                self.pending_since_tick = Some(self.tick_now);
                self.ring_last_emit_tick = None;
                self.answer_after_tick = None;
            }
        }
        let Some(since) = self.pending_since_tick else {
            return;
        };
        if self.tick_now.saturating_sub(since) >= RING_TIMEOUT_TICKS {
            info!("modem pending call timed out unanswered");
            if let Some(socket) = self.pending_accept.take() {
                self.socket_ops.close(socket);
            }
            self.pending_since_tick = None;
            self.emit_result(ResultCode::NoCarrier);
            return;
        }
        let should_ring = self
            .ring_last_emit_tick
            .is_none_or(|last| self.tick_now.saturating_sub(last) >= RING_INTERVAL_TICKS);
        if should_ring {
            self.emit_result(ResultCode::Ring);
            self.ring_last_emit_tick = Some(self.tick_now);
        }
        if self.auto_answer_rings > 0 && self.answer_after_tick.is_none() {
            self.answer_after_tick = Some(since + ANSWER_DELAY_TICKS);
        }
        if let Some(at) = self.answer_after_tick {
            if self.tick_now >= at {
                self.answer_pending();
            }
        }
    }
}

impl<S: TcpSocketOps> Device for ModemDevice<S> {
    fn handle(&mut self, request: &Request) -> Response {
        match request.kind {
            RequestType::Write => {
                self.handle_write(&request.payload);
                Response::ok(request.id, request.device_id, request.command)
            }
            RequestType::Read => {
                let max_len = request.params.first().copied().unwrap_or(0) as usize;
                let mut r = Response::ok(request.id, request.device_id, request.command);
                r.payload = self.handle_read(max_len);
                r
            }
            RequestType::Control => {
                let mut r = Response::ok(request.id, request.device_id, request.command);
                r.payload = self.status_payload();
                r
            }
            RequestType::Close => {
                self.hang_up();
                Response::ok(request.id, request.device_id, request.command)
            }
            RequestType::Open | RequestType::Command => {
                Response::ok(request.id, request.device_id, request.command)
            }
        }
    }

    fn poll(&mut self) {
        self.tick_now += 1;
        self.pump_listen();
        if self.connected {
            self.pump_incoming();
            self.pump_outgoing();
        }
    }
}
