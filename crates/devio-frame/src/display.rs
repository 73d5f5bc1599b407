//! Human-readable renderings of raw byte spans, for logs and diagnostics.

use std::fmt::Write as _;

/// Render bytes as a quoted string with `\n`, `\r`, `\x00` and every
/// non-ASCII byte escaped.
///
/// ASCII passes through literally, which keeps mostly-ASCII device
/// chatter readable in logs. Bytes at 0x80 and above become `\xHH`
/// escapes: pushing them into a `String` as chars would re-encode them
/// as multi-byte UTF-8 and change both content and length.
pub fn printable(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() + 2);
    out.push('"');
    for &byte in data {
        match byte {
            0 => out.push_str("\\x00"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            byte if byte >= 0x80 => {
                let _ = write!(out, "\\x{byte:02x}");
            }
            other => out.push(other as char),
        }
    }
    out.push('"');
    out
}

/// Render bytes as two lowercase hex characters each.
pub fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
