//! Legacy packet-based transport (spec §4.4): the wire is itself
//! SLIP-framed and checksum-validated like the packet-framed transport, but
//! the exchange shape is command packet -> optional data packet -> status
//! packet -> optional response data packet, with no ACK/NAK byte — the
//! packet layer itself subsumes flow control.

use log::debug;

use crate::channel::Channel;
use crate::codec::{take_slip_frame, Packet, Param};
use crate::message::{Request, RequestType, Response, StatusCode};
use crate::transport::Transport;

/// `StatusCode` -> wire status byte, per spec §4.4. Distinct from the
/// packet-framed transport's ordinal encoding.
pub fn status_to_legacy_byte(status: StatusCode) -> u8 {
    match status {
        StatusCode::Ok => 0x00,
        StatusCode::InvalidRequest => 0x01,
        StatusCode::IOError => 0x27,
        StatusCode::NotReady => 0x2F,
        _ => 0x01,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingForCommand,
    WaitingForData,
}

struct PendingCommand {
    device: u8,
    command: u8,
    params: Vec<u32>,
}

/// Legacy packet-based transport instance.
pub struct PacketBasedLegacyTransport<C: Channel> {
    channel: C,
    rx_buffer: Vec<u8>,
    next_id: u32,
    state: State,
    pending: Option<PendingCommand>,
    needs_data: fn(u8) -> bool,
}

fn default_needs_data(command: u8) -> bool {
    matches!(command, b'W' | b'P' | b'S')
}

impl<C: Channel> PacketBasedLegacyTransport<C> {
    /// Build a transport with the default data-phase policy (`W`, `P`, `S`
    /// commands carry a host->peripheral data packet).
    pub fn new(channel: C) -> Self {
        Self::with_needs_data(channel, default_needs_data)
    }

    /// Build a transport with a custom data-phase policy.
    pub fn with_needs_data(channel: C, needs_data: fn(u8) -> bool) -> Self {
        Self {
            channel,
            rx_buffer: Vec::new(),
            next_id: 0,
            state: State::WaitingForCommand,
            pending: None,
            needs_data,
        }
    }

    fn take_packet(&mut self) -> Option<Packet> {
        loop {
            let frame = take_slip_frame(&mut self.rx_buffer)?;
            match Packet::parse(&frame) {
                Some(pkt) => return Some(pkt),
                None => {
                    debug!("dropping unparseable legacy packet frame ({} bytes)", frame.len());
                    continue;
                }
            }
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}

impl<C: Channel> Transport for PacketBasedLegacyTransport<C> {
    fn poll(&mut self) {
        let mut scratch = [0u8; 256];
        while self.channel.available() {
            let n = self.channel.read(&mut scratch);
            if n == 0 {
                break;
            }
            self.rx_buffer.extend_from_slice(&scratch[..n]);
        }
    }

    fn receive(&mut self) -> Option<Request> {
        match self.state {
            State::WaitingForCommand => {
                let pkt = self.take_packet()?;
                if (self.needs_data)(pkt.command) {
                    self.pending = Some(PendingCommand {
                        device: pkt.device,
                        command: pkt.command,
                        params: pkt.param_values(),
                    });
                    self.state = State::WaitingForData;
                    None
                } else {
                    let id = self.next_id();
                    Some(Request {
                        id,
                        device_id: pkt.device,
                        kind: RequestType::Command,
                        command: pkt.command,
                        params: pkt.param_values(),
                        payload: pkt.payload,
                    })
                }
            }
            State::WaitingForData => {
                let pkt = self.take_packet()?;
                let pending = self
                    .pending
                    .take()
                    .expect("WaitingForData implies a pending command");
                self.state = State::WaitingForCommand;
                let id = self.next_id();
                Some(Request {
                    id,
                    device_id: pending.device,
                    kind: RequestType::Command,
                    command: pending.command,
                    params: pending.params,
                    payload: pkt.payload,
                })
            }
        }
    }

    fn send(&mut self, response: &Response) {
        let mut status_pkt = Packet::new(response.device_id, response.command);
        status_pkt.params.push(Param::u8(status_to_legacy_byte(response.status)));
        self.channel.write(&status_pkt.serialize());

        if response.status == StatusCode::Ok && !response.payload.is_empty() {
            let mut data_pkt = Packet::new(response.device_id, response.command);
            data_pkt.payload = response.payload.clone();
            self.channel.write(&data_pkt.serialize());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PairChannel;

    fn push_packet(ch: &mut PairChannel, device: u8, command: u8, params: Vec<Param>, payload: Vec<u8>) {
        let mut pkt = Packet::new(device, command);
        pkt.params = params;
        pkt.payload = payload;
        ch.push_input(&pkt.serialize());
    }

    #[test]
    fn status_byte_mapping_matches_spec() {
        assert_eq!(status_to_legacy_byte(StatusCode::Ok), 0x00);
        assert_eq!(status_to_legacy_byte(StatusCode::InvalidRequest), 0x01);
        assert_eq!(status_to_legacy_byte(StatusCode::IOError), 0x27);
        assert_eq!(status_to_legacy_byte(StatusCode::NotReady), 0x2F);
        assert_eq!(status_to_legacy_byte(StatusCode::Timeout), 0x01);
    }

    #[test]
    fn command_with_no_data_phase_dispatches_immediately() {
        let mut ch = PairChannel::new();
        push_packet(&mut ch, 0x70, b'R', vec![Param::u8(1)], vec![]);
        let mut t = PacketBasedLegacyTransport::new(ch);
        t.poll();
        let req = t.receive().expect("one request");
        assert_eq!(req.device_id, 0x70);
        assert_eq!(req.command, b'R');
        assert_eq!(req.params, vec![1]);
    }

    #[test]
    fn write_command_waits_for_data_packet_then_merges_payload() {
        let mut ch = PairChannel::new();
        push_packet(&mut ch, 0x70, b'W', vec![Param::u16(10)], vec![]);
        let mut t = PacketBasedLegacyTransport::new(ch);
        t.poll();
        assert!(t.receive().is_none());

        let mut data_pkt = Packet::new(0x70, b'W');
        data_pkt.payload = vec![1, 2, 3];
        t.channel.push_input(&data_pkt.serialize());
        t.poll();
        let req = t.receive().expect("merges command + data");
        assert_eq!(req.command, b'W');
        assert_eq!(req.params, vec![10]);
        assert_eq!(req.payload, vec![1, 2, 3]);
    }

    #[test]
    fn send_emits_status_packet_then_data_packet_on_ok_with_payload() {
        let ch = PairChannel::new();
        let mut t = PacketBasedLegacyTransport::new(ch);
        let resp = Response {
            id: 1,
            device_id: 0x70,
            status: StatusCode::Ok,
            command: b'R',
            payload: vec![9, 9, 9],
        };
        t.send(&resp);
        let mut out = t.channel.take_output();

        let status_frame = take_slip_frame(&mut out).expect("status frame present");
        let status_pkt = Packet::parse(&status_frame).expect("status packet parses");
        assert_eq!(status_pkt.param_values(), vec![0x00]);
        assert!(status_pkt.payload.is_empty());

        let data_frame = take_slip_frame(&mut out).expect("data frame present");
        let data_pkt = Packet::parse(&data_frame).expect("data packet parses");
        assert_eq!(data_pkt.payload, vec![9, 9, 9]);
        assert!(out.is_empty());
    }

    #[test]
    fn send_emits_only_status_packet_on_error() {
        let ch = PairChannel::new();
        let mut t = PacketBasedLegacyTransport::new(ch);
        t.send(&Response {
            id: 1,
            device_id: 0x70,
            status: StatusCode::IOError,
            command: b'R',
            payload: vec![],
        });
        let out = t.channel.take_output();
        let pkt = Packet::parse(&out).expect("status packet parses");
        assert_eq!(pkt.param_values(), vec![0x27]);
    }
}
