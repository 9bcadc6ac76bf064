//! Legacy byte-based transport: the three-phase exchange in spec §4.3 —
//! command frame, optional exact-length data frame, COMPLETE/ERROR.

use log::{debug, warn};

use crate::channel::Channel;
use crate::message::{Request, RequestType, Response, StatusCode};
use crate::transport::legacy::{sleep_micros, BusTraits, CmdFrame, ACK, COMPLETE, ERROR, NAK};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingForCommand,
    WaitingForData,
}

/// Bus-specific inter-byte delay before COMPLETE/ERROR/ACK-after-data,
/// commonly ~250us (spec §4.3).
const DEFAULT_INTER_BYTE_DELAY_US: u64 = 250;

/// A byte-based legacy transport instance (e.g. an Atari SIO-style bus).
pub struct ByteBasedLegacyTransport<C: Channel> {
    channel: C,
    traits: BusTraits,
    state: State,
    cmd_accum: Vec<u8>,
    pending_frame: Option<CmdFrame>,
    expected_data_len: usize,
    data_accum: Vec<u8>,
    next_id: u32,
    inter_byte_delay_us: u64,
}

impl<C: Channel> ByteBasedLegacyTransport<C> {
    /// Build a transport over `channel` using the given bus policy.
    pub fn new(channel: C, traits: BusTraits) -> Self {
        Self {
            channel,
            traits,
            state: State::WaitingForCommand,
            cmd_accum: Vec::with_capacity(5),
            pending_frame: None,
            expected_data_len: 0,
            data_accum: Vec::new(),
            next_id: 0,
            inter_byte_delay_us: DEFAULT_INTER_BYTE_DELAY_US,
        }
    }

    /// Override the inter-byte delay (microseconds), e.g. to keep tests fast.
    pub fn with_inter_byte_delay_us(mut self, us: u64) -> Self {
        self.inter_byte_delay_us = us;
        self
    }

    fn send_byte(&mut self, b: u8) {
        self.channel.write(&[b]);
    }

    fn build_request(&mut self, frame: CmdFrame, payload: Vec<u8>) -> Request {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        Request {
            id,
            device_id: frame.device,
            kind: RequestType::Command,
            command: frame.comnd,
            params: vec![frame.aux1 as u32, frame.aux2 as u32],
            payload,
        }
    }
}

impl<C: Channel> Transport for ByteBasedLegacyTransport<C> {
    fn receive(&mut self) -> Option<Request> {
        match self.state {
            State::WaitingForCommand => {
                let mut accum = std::mem::take(&mut self.cmd_accum);
                self.fill_into(&mut accum, 5);
                self.cmd_accum = accum;

                if self.cmd_accum.len() < 5 {
                    return None;
                }
                let frame = CmdFrame {
                    device: self.cmd_accum[0],
                    comnd: self.cmd_accum[1],
                    aux1: self.cmd_accum[2],
                    aux2: self.cmd_accum[3],
                    checksum: self.cmd_accum[4],
                };
                self.cmd_accum.clear();

                let calc = self.traits.checksum(&frame.checksum_input());
                if calc != frame.checksum {
                    warn!("legacy command checksum mismatch: calc={calc:#04x} recv={:#04x}", frame.checksum);
                    self.send_byte(NAK);
                    return None;
                }
                self.send_byte(ACK);

                if (self.traits.needs_data)(frame.comnd) {
                    self.expected_data_len = (self.traits.data_len_for)(frame.comnd);
                    self.pending_frame = Some(frame);
                    self.data_accum.clear();
                    self.state = State::WaitingForData;
                    None
                } else {
                    self.state = State::WaitingForCommand;
                    Some(self.build_request(frame, Vec::new()))
                }
            }
            State::WaitingForData => {
                let mut accum = std::mem::take(&mut self.data_accum);
                self.fill_into(&mut accum, self.expected_data_len + 1);
                self.data_accum = accum;

                if self.data_accum.len() < self.expected_data_len + 1 {
                    return None;
                }
                let data = self.data_accum[..self.expected_data_len].to_vec();
                let recv_checksum = self.data_accum[self.expected_data_len];
                self.data_accum.clear();

                let calc = self.traits.checksum(&data);
                sleep_micros(self.inter_byte_delay_us);
                if calc != recv_checksum {
                    warn!("legacy data checksum mismatch");
                    self.send_byte(NAK);
                    self.state = State::WaitingForCommand;
                    return None;
                }
                self.send_byte(ACK);
                let frame = self
                    .pending_frame
                    .take()
                    .expect("WaitingForData implies a pending command frame");
                self.state = State::WaitingForCommand;
                Some(self.build_request(frame, data))
            }
        }
    }

    fn send(&mut self, response: &Response) {
        sleep_micros(self.inter_byte_delay_us);
        if response.status == StatusCode::Ok {
            debug!("legacy send: COMPLETE, {} byte payload", response.payload.len());
            self.send_byte(COMPLETE);
            if !response.payload.is_empty() {
                let checksum = self.traits.checksum(&response.payload);
                self.channel.write(&response.payload);
                self.channel.write(&[checksum]);
            }
        } else {
            debug!("legacy send: ERROR (status={:?})", response.status);
            self.send_byte(ERROR);
        }
        self.state = State::WaitingForCommand;
    }
}

impl<C: Channel> ByteBasedLegacyTransport<C> {
    fn fill_into(&mut self, accum: &mut Vec<u8>, want: usize) {
        let need = want.saturating_sub(accum.len());
        if need == 0 || !self.channel.available() {
            return;
        }
        let mut buf = vec![0u8; need];
        let n = self.channel.read(&mut buf);
        accum.extend_from_slice(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PairChannel;

    fn checksum(data: &[u8]) -> u8 {
        BusTraits::atari_sio().checksum(data)
    }

    fn cmd_bytes(device: u8, comnd: u8, aux1: u8, aux2: u8) -> Vec<u8> {
        let mut v = vec![device, comnd, aux1, aux2];
        let ck = checksum(&v);
        v.push(ck);
        v
    }

    fn transport(input: &[u8]) -> ByteBasedLegacyTransport<PairChannel> {
        let mut ch = PairChannel::new();
        ch.push_input(input);
        ByteBasedLegacyTransport::new(ch, BusTraits::atari_sio()).with_inter_byte_delay_us(0)
    }

    #[test]
    fn scenario_good_command_no_data() {
        let cmd = cmd_bytes(0x31, b'R', 0x01, 0x00);
        let mut t = transport(&cmd);
        let req = t.receive().expect("command-only request");
        assert_eq!(req.device_id, 0x31);
        assert_eq!(req.command, b'R');
        assert_eq!(req.params, vec![0x01, 0x00]);
        assert!(req.payload.is_empty());

        let out = t.channel.take_output();
        assert_eq!(out, vec![ACK]);

        let payload = vec![0xAAu8; 128];
        let resp = Response {
            id: req.id,
            device_id: req.device_id,
            status: StatusCode::Ok,
            command: req.command,
            payload: payload.clone(),
        };
        t.send(&resp);
        let mut expected = vec![COMPLETE];
        expected.extend_from_slice(&payload);
        expected.push(checksum(&payload));
        assert_eq!(t.channel.take_output(), expected);
    }

    #[test]
    fn scenario_bad_command_checksum_naks_and_stays_waiting() {
        let mut cmd = cmd_bytes(0x31, b'R', 0x01, 0x00);
        *cmd.last_mut().unwrap() ^= 0xFF;
        let mut t = transport(&cmd);
        assert!(t.receive().is_none());
        assert_eq!(t.channel.take_output(), vec![NAK]);
        assert_eq!(t.state, State::WaitingForCommand);
    }

    #[test]
    fn scenario_write_with_data_phase() {
        let mut wire = cmd_bytes(0x31, b'W', 0x01, 0x00);
        let data = vec![0x55u8; 256];
        wire.extend_from_slice(&data);
        wire.push(checksum(&data));

        let mut t = transport(&wire);
        // Command phase: no request yet, only ACK emitted.
        assert!(t.receive().is_none());
        assert_eq!(t.channel.take_output(), vec![ACK]);

        // Data phase completes in the same or a following receive() call.
        let req = t.receive().expect("data phase completes the request");
        assert_eq!(req.command, b'W');
        assert_eq!(req.payload, data);
        assert_eq!(t.channel.take_output(), vec![ACK]);

        t.send(&Response {
            id: req.id,
            device_id: req.device_id,
            status: StatusCode::IOError,
            command: req.command,
            payload: vec![],
        });
        assert_eq!(t.channel.take_output(), vec![ERROR]);
    }

    #[test]
    fn incomplete_command_frame_waits_for_more_bytes() {
        let mut t = transport(&[0x31, b'R', 0x01]);
        assert!(t.receive().is_none());
        assert!(t.channel.take_output().is_empty());
    }
}
