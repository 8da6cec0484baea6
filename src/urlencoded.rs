//! URL codec and query-string variable extraction.

use crate::util::{is_safe, push_hex, unhex};
use bstr::BString;
use nom::bytes::complete::{tag, take_till};
use nom::sequence::tuple;
use nom::IResult;

/// Why [`get_var`] failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarError {
    /// The destination buffer is empty.
    BadDestination,
    /// The source buffer is empty.
    BadSource,
    /// The variable exists but its value failed to decode or fit.
    DecodeFailed,
    /// No variable with that name.
    NotFound,
}

/// Percent-encodes `src`, preserving `[0-9A-Za-z]` and `._-$,;~()/`.
pub fn url_encode(src: &[u8]) -> BString {
    let mut out = Vec::with_capacity(src.len());
    for &c in src {
        if is_safe(c) {
            out.push(c);
        } else {
            out.push(b'%');
            push_hex(&mut out, c);
        }
    }
    BString::from(out)
}

/// Decodes `src` into `dst`. A `%` must be followed by two hex digits;
/// `+` maps to space when `form` is set; everything else copies verbatim.
///
/// Returns the decoded length if the whole source was consumed and fit into
/// `dst`, `None` otherwise.
pub fn url_decode(src: &[u8], dst: &mut [u8], form: bool) -> Option<usize> {
    let mut i = 0;
    let mut j = 0;
    while i < src.len() && j < dst.len() {
        dst[j] = match src[i] {
            b'%' => {
                if i + 2 >= src.len() {
                    return None;
                }
                let hi = unhex(src[i + 1])?;
                let lo = unhex(src[i + 2])?;
                i += 2;
                (hi << 4) | lo
            }
            b'+' if form => b' ',
            c => c,
        };
        i += 1;
        j += 1;
    }
    if i >= src.len() {
        Some(j)
    } else {
        None
    }
}

/// One `&`-delimited query segment and whatever follows it.
fn segment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (rest, seg) = take_till(|c| c == b'&')(input)?;
    let rest = if rest.first() == Some(&b'&') {
        &rest[1..]
    } else {
        rest
    };
    Ok((rest, seg))
}

/// Finds `name` in a `key=value&key=value` query string and form-decodes its
/// value into `dst`. Name comparison ignores ASCII case; segments without a
/// `=` are never candidates.
pub fn get_var(buf: &[u8], name: &str, dst: &mut [u8]) -> Result<usize, VarError> {
    if dst.is_empty() {
        return Err(VarError::BadDestination);
    }
    if buf.is_empty() || name.is_empty() {
        return Err(VarError::BadSource);
    }
    let mut input = buf;
    while !input.is_empty() {
        let (rest, seg) = match segment(input) {
            Ok(parsed) => parsed,
            Err(_) => break,
        };
        let parsed: IResult<&[u8], (&[u8], &[u8])> =
            tuple((take_till(|c| c == b'='), tag("=")))(seg);
        if let Ok((value, (key, _))) = parsed {
            if key.eq_ignore_ascii_case(name.as_bytes()) {
                return url_decode(value, dst, true).ok_or(VarError::DecodeFailed);
            }
        }
        input = rest;
    }
    Err(VarError::NotFound)
}
