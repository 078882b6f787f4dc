use crate::message::{Envelope, ServerMessage};

/// Telnet IAC (0xFF) begins a 2- or 3-byte negotiation sequence. Clients that
/// connect with a raw telnet binary send these unprompted; the session layer
/// must strip them rather than choke on the bytes.
const IAC: u8 = 0xFF;
const WILL: u8 = 0xFB;
const WONT: u8 = 0xFC;
const DO: u8 = 0xFD;
const DONT: u8 = 0xFE;
const SB: u8 = 0xFA;
const SE: u8 = 0xF0;

/// Strips Telnet IAC sequences from a raw line of input, then trims a
/// trailing `\r` left over from `\r\n` terminators.
///
/// `lines()`-style readers already split on `\n`; this only needs to clean up
/// what's left on the line itself.
pub fn clean_input_line(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == IAC {
            if i + 1 >= raw.len() {
                break;
            }
            match raw[i + 1] {
                WILL | WONT | DO | DONT => {
                    i += 3;
                    continue;
                }
                SB => {
                    // Skip until IAC SE.
                    let mut j = i + 2;
                    while j + 1 < raw.len() && !(raw[j] == IAC && raw[j + 1] == SE) {
                        j += 1;
                    }
                    i = j + 2;
                    continue;
                }
                IAC => {
                    // Escaped literal 0xFF byte.
                    out.push(IAC);
                    i += 2;
                    continue;
                }
                _ => {
                    i += 2;
                    continue;
                }
            }
        }
        out.push(raw[i]);
        i += 1;
    }

    let text = String::from_utf8_lossy(&out);
    text.trim_end_matches(['\r', '\n']).trim().to_string()
}

/// Serializes a [`ServerMessage`] as a single JSON line, `\n`-terminated.
pub fn encode_message(message: &ServerMessage) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Serializes an [`Envelope`] as a single JSON line, `\n`-terminated.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(envelope)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TextMessage;

    #[test]
    fn clean_input_line_strips_crlf() {
        assert_eq!(clean_input_line(b"look\r\n"), "look");
        assert_eq!(clean_input_line(b"look\r"), "look");
        assert_eq!(clean_input_line(b"look"), "look");
    }

    #[test]
    fn clean_input_line_strips_telnet_negotiation() {
        let mut raw = vec![IAC, WILL, 0x01];
        raw.extend_from_slice(b"look\r\n");
        assert_eq!(clean_input_line(&raw), "look");
    }

    #[test]
    fn clean_input_line_strips_subnegotiation_block() {
        let mut raw = vec![IAC, SB, 0x18, 0x00, IAC, SE];
        raw.extend_from_slice(b"who\n");
        assert_eq!(clean_input_line(&raw), "who");
    }

    #[test]
    fn encode_message_terminates_with_newline() {
        let msg = ServerMessage::SystemMessage(TextMessage::new("hi"));
        let line = encode_message(&msg).unwrap();
        assert!(line.ends_with('\n'));
        assert!(line.starts_with('{'));
    }
}
