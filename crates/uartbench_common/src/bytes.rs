//! Byte-string rendering for reports.

use std::fmt;

/// Displays a byte slice as a `b'...'` literal.
///
/// Printable ASCII is shown as-is, `\t`, `\n`, `\r`, `\\` and `\'` use their
/// escapes and everything else is written as `\xNN`. Mismatch reports depend
/// on this to make control bytes such as BEL (`0x07`) visible.
#[derive(Clone, Copy)]
pub struct ByteStr<'a>(pub &'a [u8]);

impl fmt::Display for ByteStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("b'")?;
        for &b in self.0 {
            match b {
                b'\t' => f.write_str("\\t")?,
                b'\n' => f.write_str("\\n")?,
                b'\r' => f.write_str("\\r")?,
                b'\\' => f.write_str("\\\\")?,
                b'\'' => f.write_str("\\'")?,
                0x20..=0x7e => write!(f, "{}", b as char)?,
                _ => write!(f, "\\x{b:02x}")?,
            }
        }
        f.write_str("'")
    }
}

impl fmt::Debug for ByteStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
