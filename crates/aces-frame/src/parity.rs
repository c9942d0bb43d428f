//! Nibble-popcount parity over 6-byte spans.
//!
//! This is a checksum, not an error-correcting code. Any change that keeps
//! the popcount of both 3-byte groups the same mod 16 (for example swapping
//! a set bit and a clear bit inside one group) passes verification.

use bytes::BufMut;

use crate::error::{FrameError, Result};

/// Bytes covered by one parity byte.
pub const SPAN_LEN: usize = 6;
/// Bytes per nibble group.
pub const GROUP_LEN: usize = 3;

/// Parity byte for `buf[start..start + 6]`.
pub fn compute_parity(buf: &[u8], start: usize) -> Result<u8> {
    span(buf, start).map(span_parity)
}

/// True when `expected` matches the parity of `buf[start..start + 6]`.
///
/// A span that runs past the end of `buf` never verifies.
pub fn verify_parity(buf: &[u8], start: usize, expected: u8) -> bool {
    matches!(compute_parity(buf, start), Ok(parity) if parity == expected)
}

/// Append one parity byte per whole 6-byte span of `data` to `dst`.
///
/// A trailing partial span gets no parity byte.
pub(crate) fn put_parity_spans(data: &[u8], dst: &mut impl BufMut) {
    for span in data.chunks_exact(SPAN_LEN) {
        dst.put_u8(span_parity(span));
    }
}

/// Check the parity bytes trailing `data_len` bytes of data in `buf`.
pub(crate) fn check_parity(buf: &[u8], data_len: usize) -> Result<()> {
    let spans = data_len / SPAN_LEN;
    if buf.len() < data_len + spans {
        return Err(FrameError::Truncated {
            expected: data_len + spans,
            actual: buf.len(),
        });
    }
    for span in 0..spans {
        let carried = buf[data_len + span];
        let computed = compute_parity(buf, span * SPAN_LEN)?;
        if carried != computed {
            return Err(FrameError::Parity {
                span,
                carried,
                computed,
            });
        }
    }
    Ok(())
}

fn span(buf: &[u8], start: usize) -> Result<&[u8]> {
    start
        .checked_add(SPAN_LEN)
        .and_then(|end| buf.get(start..end))
        .ok_or(FrameError::Truncated {
            expected: start.saturating_add(SPAN_LEN),
            actual: buf.len(),
        })
}

fn span_parity(span: &[u8]) -> u8 {
    let low = group_count(&span[..GROUP_LEN]);
    let high = group_count(&span[GROUP_LEN..SPAN_LEN]);
    low | (high << 4)
}

fn group_count(group: &[u8]) -> u8 {
    let ones: u32 = group.iter().map(|b| b.count_ones()).sum();
    (ones % 16) as u8
}
