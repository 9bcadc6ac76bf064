//! Minimal Telnet IAC option negotiation (spec §4.9): enough that common BBS
//! servers don't see raw option bytes as terminal data.

const IAC: u8 = 0xFF;
const WILL: u8 = 251;
const WONT: u8 = 252;
const DO: u8 = 253;
const DONT: u8 = 254;
const SB: u8 = 250;
const SE: u8 = 240;

/// Options the filter will agree to rather than conservatively refuse.
/// Suppress-Go-Ahead (3) and Echo (1) are common enough on BBS-style
/// connections that refusing them causes visible glitches.
const ALLOWLIST: [u8; 2] = [1, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    SawIac,
    SawCommand(u8),
    SawIacInSubneg,
    Subnegotiation,
}

/// Streaming Telnet filter: feed raw socket bytes in, get data bytes and
/// negotiation replies out.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: State,
}

/// Result of filtering one inbound byte.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FilterStep {
    /// A data byte to deliver to the host, if any.
    pub data: Option<u8>,
    /// Bytes to write back to the network immediately (a negotiation
    /// reply), if any.
    pub reply: Vec<u8>,
}

impl TelnetFilter {
    /// Create a filter in the initial (data) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw inbound byte.
    pub fn filter_byte(&mut self, b: u8) -> FilterStep {
        match self.state {
            State::Data => {
                if b == IAC {
                    self.state = State::SawIac;
                    FilterStep::default()
                } else {
                    FilterStep {
                        data: Some(b),
                        reply: Vec::new(),
                    }
                }
            }
            State::SawIac => match b {
                IAC => {
                    // Escaped 0xFF: passes through as a single data byte.
                    self.state = State::Data;
                    FilterStep {
                        data: Some(IAC),
                        reply: Vec::new(),
                    }
                }
                WILL | WONT | DO | DONT => {
                    self.state = State::SawCommand(b);
                    FilterStep::default()
                }
                SB => {
                    self.state = State::Subnegotiation;
                    FilterStep::default()
                }
                _ => {
                    // Unrecognized command byte, no option follows.
                    self.state = State::Data;
                    FilterStep::default()
                }
            },
            State::SawCommand(cmd) => {
                let option = b;
                self.state = State::Data;
                let allowed = ALLOWLIST.contains(&option);
                let reply = match cmd {
                    DO if allowed => vec![IAC, WILL, option],
                    DO => vec![IAC, WONT, option],
                    WILL if allowed => vec![IAC, DO, option],
                    WILL => vec![IAC, DONT, option],
                    // WONT/DONT are notifications, not requests: no reply.
                    _ => Vec::new(),
                };
                FilterStep { data: None, reply }
            }
            State::Subnegotiation => {
                if b == IAC {
                    self.state = State::SawIacInSubneg;
                }
                FilterStep::default()
            }
            State::SawIacInSubneg => {
                self.state = if b == SE { State::Data } else { State::Subnegotiation };
                FilterStep::default()
            }
        }
    }

    /// Filter a whole inbound buffer, returning the surviving data bytes and
    /// the concatenated negotiation replies to write back.
    pub fn filter(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::new();
        let mut reply = Vec::new();
        for &b in input {
            let step = self.filter_byte(b);
            if let Some(d) = step.data {
                data.push(d);
            }
            reply.extend(step.reply);
        }
        (data, reply)
    }
}

/// Double any `0xFF` bytes in an outgoing buffer so the peer's Telnet layer
/// doesn't mistake payload data for an IAC sequence.
pub fn escape_outgoing(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_data_passes_through_untouched() {
        let mut f = TelnetFilter::new();
        let (data, reply) = f.filter(b"hello");
        assert_eq!(data, b"hello");
        assert!(reply.is_empty());
    }

    #[test]
    fn escaped_iac_passes_through_as_single_byte() {
        let mut f = TelnetFilter::new();
        let (data, reply) = f.filter(&[IAC, IAC, b'x']);
        assert_eq!(data, vec![IAC, b'x']);
        assert!(reply.is_empty());
    }

    #[test]
    fn do_unlisted_option_is_refused_with_wont() {
        let mut f = TelnetFilter::new();
        let (data, reply) = f.filter(&[IAC, DO, 31]);
        assert!(data.is_empty());
        assert_eq!(reply, vec![IAC, WONT, 31]);
    }

    #[test]
    fn do_allowlisted_option_is_accepted_with_will() {
        let mut f = TelnetFilter::new();
        let (_, reply) = f.filter(&[IAC, DO, 3]);
        assert_eq!(reply, vec![IAC, WILL, 3]);
    }

    #[test]
    fn subnegotiation_is_swallowed_entirely() {
        let mut f = TelnetFilter::new();
        let (data, reply) = f.filter(&[IAC, SB, 31, 0, 80, 0, 24, IAC, SE, b'y']);
        assert_eq!(data, vec![b'y']);
        assert!(reply.is_empty());
    }

    #[test]
    fn escape_outgoing_doubles_iac_bytes() {
        assert_eq!(escape_outgoing(&[1, IAC, 2]), vec![1, IAC, IAC, 2]);
    }
}
