//! Callback symbol escaping
//!
//! Callback hosts address methods by identifier-like symbols. Method names
//! may contain anything, so they are escaped injectively: ASCII letters and
//! digits pass through, `_` doubles, every other character becomes
//! `_x<hex>_`, and a leading digit is escaped too.

use std::fmt::Write as _;

/// Escape a method name into a callback symbol
pub fn escape_symbol(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        match c {
            '_' => out.push_str("__"),
            c if c.is_ascii_alphabetic() => out.push(c),
            c if c.is_ascii_digit() && i > 0 => out.push(c),
            c => {
                let _ = write!(out, "_x{:x}_", c as u32);
            }
        }
    }
    out
}

/// Invert `escape_symbol`; `None` if `symbol` is not a valid escape
pub fn unescape_symbol(symbol: &str) -> Option<String> {
    let mut out = String::with_capacity(symbol.len());
    let mut chars = symbol.chars();
    while let Some(c) = chars.next() {
        if c != '_' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '_' => out.push('_'),
            'x' => {
                let mut hex = String::new();
                loop {
                    match chars.next()? {
                        '_' => break,
                        h if h.is_ascii_hexdigit() => hex.push(h),
                        _ => return None,
                    }
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}
