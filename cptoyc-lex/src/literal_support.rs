//! Literal value decoding
//!
//! The lexer classifies literal tokens but does not store their values;
//! consumers decode the cleaned spelling on demand with the helpers
//! here. Escape handling matches the lexer: `\a \b \f \n \r \t \v \0
//! \\ \' \"` map to their byte values and any other escaped byte maps
//! to itself.

/// The byte value of one escape character (the byte after the `\`).
pub(crate) fn escape_char(b: u8) -> u8 {
    match b {
        b'a' => 0x07,
        b'b' => 0x08,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'v' => 0x0b,
        b'0' => 0,
        other => other,
    }
}

/// Decode an integer constant spelling (`0x1F`, `0755LL`, `42u`) to its
/// value. The suffix determines only the C type, not the value.
pub fn int_value(spelling: &str) -> Option<u64> {
    let s = spelling.as_bytes();
    let (digits, radix) = if s.len() > 2 && s[0] == b'0' && (s[1] == b'x' || s[1] == b'X') {
        (&spelling[2..], 16)
    } else if s.len() > 1 && s[0] == b'0' {
        (&spelling[1..], 8)
    } else {
        (spelling, 10)
    };
    let digits = digits.trim_end_matches(['u', 'U', 'l', 'L']);
    if digits.is_empty() {
        // A lone "0" loses its digit to the octal-prefix strip.
        return if spelling.starts_with('0') { Some(0) } else { None };
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Decode a floating constant spelling, decimal (`1.5e3`) or hex
/// (`0x1.8p+1`), ignoring the width suffix.
pub fn float_value(spelling: &str) -> Option<f64> {
    let body = spelling.trim_end_matches(['f', 'F', 'l', 'L']);
    if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        return hex_float_value(hex);
    }
    body.parse::<f64>().ok()
}

/// `h.hhh[pP][+-]ddd` with hex mantissa digits and a power-of-two
/// exponent.
fn hex_float_value(body: &str) -> Option<f64> {
    let (mantissa, exponent) = body
        .split_once(['p', 'P'])
        .map(|(m, e)| (m, Some(e)))
        .unwrap_or((body, None));

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };

    let mut value = 0.0f64;
    for b in int_part.bytes() {
        value = value * 16.0 + (b as char).to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for b in frac_part.bytes() {
        value += (b as char).to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }

    let exp: i32 = match exponent {
        Some(e) => e.parse().ok()?,
        None => 0,
    };
    Some(value * 2f64.powi(exp))
}

/// The value of a character constant spelling (`'x'`, `'\n'`, `L'x'`).
pub fn char_value(spelling: &str) -> Option<u8> {
    let body = spelling.strip_prefix('L').unwrap_or(spelling);
    let body = body.strip_prefix('\'')?.strip_suffix('\'')?;
    let bytes = body.as_bytes();
    match bytes {
        [b'\\', esc] => Some(escape_char(*esc)),
        [b] => Some(*b),
        _ => None,
    }
}

/// The decoded bytes of a string literal spelling (`"a\tb"`, `L"x"`),
/// quotes stripped and escapes applied.
pub fn string_value(spelling: &str) -> Option<Vec<u8>> {
    let body = spelling.strip_prefix('L').unwrap_or(spelling);
    let body = body.strip_prefix('"')?.strip_suffix('"')?;
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            out.push(escape_char(bytes[i + 1]));
            i += 2;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}
