//! Packet-framed transport: SLIP + descriptor packets over a [`Channel`].
//!
//! Grounded in the original prototype's `fujibus_transport.cpp`: drain the
//! channel into an accumulator, extract SLIP frames, decode as
//! [`Packet`]s, and map 1:1 onto [`Request`]/[`Response`].

use log::debug;

use crate::channel::Channel;
use crate::codec::{take_slip_frame, Packet, Param, SLIP_END};
use crate::message::{Request, RequestType, Response};
use crate::transport::Transport;

/// Transport for the FujiBus wire protocol (spec §4.2).
pub struct PacketTransport<C: Channel> {
    channel: C,
    rx_buffer: Vec<u8>,
    next_id: u32,
}

impl<C: Channel> PacketTransport<C> {
    /// Wrap a channel in a packet-framed transport.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            rx_buffer: Vec::new(),
            next_id: 0,
        }
    }

    fn take_frame(&mut self) -> Option<Vec<u8>> {
        take_slip_frame(&mut self.rx_buffer)
    }
}

impl<C: Channel> Transport for PacketTransport<C> {
    fn poll(&mut self) {
        let mut scratch = [0u8; 256];
        loop {
            if !self.channel.available() {
                break;
            }
            let n = self.channel.read(&mut scratch);
            if n == 0 {
                break;
            }
            self.rx_buffer.extend_from_slice(&scratch[..n]);
        }
    }

    fn receive(&mut self) -> Option<Request> {
        loop {
            let frame = self.take_frame()?;
            let Some(packet) = Packet::parse(&frame) else {
                debug!("dropping unparseable packet frame ({} bytes)", frame.len());
                continue;
            };
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            return Some(Request {
                id,
                device_id: packet.device,
                kind: RequestType::Command,
                command: packet.command,
                params: packet.param_values(),
                payload: packet.payload,
            });
        }
    }

    fn send(&mut self, response: &Response) {
        let mut packet = Packet::new(response.device_id, response.command);
        packet.params.push(Param::u8(response.status.to_wire_u8()));
        packet.payload = response.payload.clone();
        let wire = packet.serialize();
        self.channel.write(&wire);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PairChannel;
    use crate::message::StatusCode;

    fn wire_request(device: u8, command: u8, params: Vec<Param>, payload: Vec<u8>) -> Vec<u8> {
        let mut pkt = Packet::new(device, command);
        pkt.params = params;
        pkt.payload = payload;
        pkt.serialize()
    }

    #[test]
    fn receive_maps_packet_fields_onto_request() {
        let mut ch = PairChannel::new();
        let wire = wire_request(0xFE, 0x02, vec![Param::u16(0), Param::u16(64)], vec![0xAA, 0xBB]);
        ch.push_input(&wire);
        let mut t = PacketTransport::new(ch);
        t.poll();
        let req = t.receive().expect("one request");
        assert_eq!(req.device_id, 0xFE);
        assert_eq!(req.command, 0x02);
        assert_eq!(req.params, vec![0, 64]);
        assert_eq!(req.payload, vec![0xAA, 0xBB]);
        assert!(t.receive().is_none());
    }

    #[test]
    fn request_params_are_not_status_regression_guard() {
        // Prevents regression: request params were once misread as status.
        let mut ch = PairChannel::new();
        let wire = wire_request(1, 9, vec![Param::u16(0xBEEF)], vec![]);
        ch.push_input(&wire);
        let mut t = PacketTransport::new(ch);
        t.poll();
        let req = t.receive().unwrap();
        assert_eq!(req.params[0], 0xBEEF);
    }

    #[test]
    fn send_encodes_status_as_first_u8_param_then_payload() {
        let ch = PairChannel::new();
        let mut t = PacketTransport::new(ch);
        let resp = Response {
            id: 1,
            device_id: 0xFE,
            status: StatusCode::Ok,
            command: 0x02,
            payload: vec![0x10, 0x20, 0x30],
        };
        t.send(&resp);
        let wire = t.channel.take_output();
        let pkt = Packet::parse(&wire).expect("parses");
        assert_eq!(pkt.device, 0xFE);
        assert_eq!(pkt.command, 0x02);
        assert_eq!(pkt.param_values(), vec![StatusCode::Ok.to_wire_u8() as u32]);
        assert_eq!(pkt.payload, vec![0x10, 0x20, 0x30]);
    }

    #[test]
    fn two_back_to_back_frames_both_decode() {
        let mut ch = PairChannel::new();
        let mut wire = wire_request(1, 1, vec![], vec![1]);
        wire.extend(wire_request(2, 2, vec![], vec![2]));
        ch.push_input(&wire);
        let mut t = PacketTransport::new(ch);
        t.poll();
        let r1 = t.receive().expect("first");
        let r2 = t.receive().expect("second");
        assert_eq!(r1.device_id, 1);
        assert_eq!(r2.device_id, 2);
        assert!(t.receive().is_none());
    }

    #[test]
    fn garbage_frame_is_dropped_and_resyncs() {
        let mut ch = PairChannel::new();
        // A well-formed-looking frame with a corrupted checksum, followed
        // by a genuinely good frame.
        let mut bad = wire_request(1, 1, vec![], vec![1, 2, 3]);
        let mid = bad.len() / 2;
        bad[mid] ^= 0x01;
        let mut wire = bad;
        wire.extend(wire_request(9, 9, vec![], vec![9]));
        ch.push_input(&wire);
        let mut t = PacketTransport::new(ch);
        t.poll();
        let req = t.receive().expect("resyncs to the good frame");
        assert_eq!(req.device_id, 9);
    }

    #[test]
    fn incomplete_frame_returns_none_and_waits() {
        let mut ch = PairChannel::new();
        ch.push_input(&[SLIP_END, 1, 2, 3]);
        let mut t = PacketTransport::new(ch);
        t.poll();
        assert!(t.receive().is_none());
    }
}
