//! AT command parsing and result-code rendering (spec §4.9).

/// A single parsed AT command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// Bare `AT`: no-op, replies OK.
    Noop,
    /// `ATZ`: reset to defaults.
    Reset,
    /// `ATDT host:port`: dial out.
    Dial { host: String, port: u16 },
    /// `ATH`: hang up.
    HangUp,
    /// `ATA`: answer a pending call.
    Answer,
    /// `ATO`: return to data mode after an escape.
    ReturnToData,
    /// `ATE0`/`ATE1`: command-mode echo on/off.
    SetEcho(bool),
    /// `ATV0`/`ATV1`: numeric vs verbose result codes.
    SetVerbose(bool),
    /// `ATS0=N`: auto-answer after N rings (0 disables).
    SetAutoAnswer(u8),
    /// `ATS0?`: query the auto-answer ring count.
    QueryAutoAnswer,
    /// Anything else recognized as AT-prefixed but not understood.
    Unknown,
}

/// Parse one command-mode line (already stripped of its CR/LF terminator).
pub fn parse_at_line(line: &str) -> AtCommand {
    let trimmed = line.trim();
    if trimmed.len() < 2 || !trimmed[..2].eq_ignore_ascii_case("AT") {
        return AtCommand::Unknown;
    }
    let rest = trimmed[2..].to_ascii_uppercase();
    match rest.as_str() {
        "" => AtCommand::Noop,
        "Z" => AtCommand::Reset,
        "H" => AtCommand::HangUp,
        "A" => AtCommand::Answer,
        "O" => AtCommand::ReturnToData,
        "E0" => AtCommand::SetEcho(false),
        "E1" => AtCommand::SetEcho(true),
        "V0" => AtCommand::SetVerbose(false),
        "V1" => AtCommand::SetVerbose(true),
        "S0?" => AtCommand::QueryAutoAnswer,
        _ if rest.starts_with("S0=") => match rest["S0=".len()..].parse::<u8>() {
            Ok(n) => AtCommand::SetAutoAnswer(n),
            Err(_) => AtCommand::Unknown,
        },
        _ if rest.starts_with("DT") => parse_dial(&rest["DT".len()..]),
        _ => AtCommand::Unknown,
    }
}

fn parse_dial(target: &str) -> AtCommand {
    match target.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
            Ok(port) => AtCommand::Dial {
                host: host.to_string(),
                port,
            },
            Err(_) => AtCommand::Unknown,
        },
        _ => AtCommand::Unknown,
    }
}

/// The result codes a modem reports back to the host (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    Error,
    Connect(u32),
    NoCarrier,
    Ring,
}

impl ResultCode {
    /// Render as a line (including the trailing CRLF) per the current
    /// verbosity setting.
    pub fn render(self, verbose: bool) -> String {
        if verbose {
            match self {
                ResultCode::Ok => "OK\r\n".to_string(),
                ResultCode::Error => "ERROR\r\n".to_string(),
                ResultCode::Connect(baud) => format!("CONNECT {baud}\r\n"),
                ResultCode::NoCarrier => "NO CARRIER\r\n".to_string(),
                ResultCode::Ring => "RING\r\n".to_string(),
            }
        } else {
            let code = match self {
                ResultCode::Ok => 0,
                ResultCode::Connect(_) => 1,
                ResultCode::Ring => 2,
                ResultCode::NoCarrier => 3,
                ResultCode::Error => 4,
            };
            format!("{code}\r\n")
        }
    }
}

/// Baud rates the modem is allowed to advertise (spec §4.9).
pub const PERMITTED_BAUD_RATES: [u32; 8] = [300, 600, 1200, 1800, 2400, 4800, 9600, 19200];
