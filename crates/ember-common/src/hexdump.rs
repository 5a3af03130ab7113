// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Hex dump rendering for diagnostics.
//!
//! [`HexDump`] is a zero-allocation `Display` adapter producing the
//! classic 16-column layout:
//!
//! ```text
//! 00000000  30 31 32 33 34 35 36 37  38 39 61 62 63 64 65 66  0123456789abcdef
//! ```
//!
//! Every line is exactly 76 characters; lines are separated by `\n`
//! with no trailing newline. Non-printable bytes render as `.` in the
//! ASCII column.

use core::fmt;

const BYTES_PER_LINE: usize = 16;

/// `Display` adapter dumping a byte slice.
#[derive(Debug, Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.0.chunks(BYTES_PER_LINE).enumerate() {
            if row > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{:08x} ", row * BYTES_PER_LINE)?;
            for column in 0..BYTES_PER_LINE {
                if column % 8 == 0 {
                    f.write_str(" ")?;
                }
                match chunk.get(column) {
                    Some(b) => write!(f, "{b:02x} ")?,
                    None => f.write_str("   ")?,
                }
            }
            f.write_str(" ")?;
            for column in 0..BYTES_PER_LINE {
                let ch = match chunk.get(column) {
                    Some(&b) if (0x20..0x7F).contains(&b) => b as char,
                    Some(_) => '.',
                    None => ' ',
                };
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::fmt::Write;

    use heapless::String;

    use super::*;

    fn render(bytes: &[u8]) -> String<512> {
        let mut out = String::new();
        write!(out, "{}", HexDump(bytes)).unwrap();
        out
    }

    #[test]
    fn short_line() {
        assert_eq!(
            render(b"123").as_str(),
            "00000000  31 32 33                                          123             "
        );
    }

    #[test]
    fn multi_line_wrap() {
        let expected = "00000000  30 31 32 33 34 35 36 37  38 39 61 62 63 64 65 66  0123456789abcdef\n\
                        00000010  67 68 69 6a 6b 6c 6d 6e  6f 70 71 72 73 74 75 76  ghijklmnopqrstuv\n\
                        00000020  77 78 79 7a 41 42 43 44  45 46 47 48 49 4a 4b 4c  wxyzABCDEFGHIJKL\n\
                        00000030  4d 4e 4f 50 51 52 53 54  55 56 57 58 59 5a        MNOPQRSTUVWXYZ  ";
        assert_eq!(
            render(b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ").as_str(),
            expected
        );
    }

    #[test]
    fn non_printable_as_dot() {
        let rendered = render(&[0x00, 0x1F, 0x7F, 0x20, 0x7E]);
        assert!(rendered.as_str().ends_with("... ~           "));
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render(&[]).as_str(), "");
    }

    #[test]
    fn every_line_is_76_columns() {
        let data = [0xA5u8; 40];
        let rendered = render(&data);
        for line in rendered.as_str().split('\n') {
            assert_eq!(line.len(), 76);
        }
    }
}
