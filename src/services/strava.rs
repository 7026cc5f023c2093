//! Strava exports: a metadata block with the start time and typed tracks.
//! Some exporters write non-ASCII track names as `\uXXXX` escapes.

use std::str::Chars;

use crate::gpx_types::{GpxDocument, Service};

pub fn normalize(mut doc: GpxDocument) -> GpxDocument {
    doc.service = Some(Service::Strava);

    for track in &mut doc.tracks {
        let Some(name) = track.name.as_mut().filter(|n| n.contains("\\u")) else {
            continue;
        };
        match decode_unicode_escapes(name) {
            Some(decoded) => *name = decoded,
            None => tracing::warn!(name = %name, "could not decode escaped track name, keeping it"),
        }
    }

    super::normalize_points(&mut doc);
    tracing::debug!(tracks = doc.tracks.len(), "normalized strava document");
    doc
}

/// Decode backslash escapes (`\n`, `\x41`, `\u00e9`, `\U0001F600`, octal)
/// in text that is otherwise Latin-1.
///
/// Returns `None` when the text holds characters beyond U+00FF (it was never
/// escaped in the first place) or an escape is truncated or invalid.
/// Unrecognized escapes such as `\q` are kept verbatim.
pub fn decode_unicode_escapes(text: &str) -> Option<String> {
    if text.chars().any(|c| u32::from(c) > 0xFF) {
        return None;
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{b}'),
            d @ '0'..='7' => {
                let mut code = d.to_digit(8)?;
                for _ in 0..2 {
                    match chars.clone().next().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code)?);
            }
            'x' => out.push(char::from_u32(read_hex(&mut chars, 2)?)?),
            'u' => {
                let code = read_hex(&mut chars, 4)?;
                out.push(combine_surrogates(code, &mut chars)?);
            }
            'U' => out.push(char::from_u32(read_hex(&mut chars, 8)?)?),
            // \N{...} needs the Unicode name table.
            'N' => return None,
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

fn read_hex(chars: &mut Chars<'_>, digits: usize) -> Option<u32> {
    (0..digits).try_fold(0u32, |acc, _| Some(acc * 16 + chars.next()?.to_digit(16)?))
}

/// A high surrogate must be followed by `\uXXXX` holding the low half.
fn combine_surrogates(code: u32, chars: &mut Chars<'_>) -> Option<char> {
    if !(0xD800..=0xDBFF).contains(&code) {
        return char::from_u32(code);
    }
    let mut ahead = chars.clone();
    if ahead.next()? != '\\' || ahead.next()? != 'u' {
        return None;
    }
    let low = read_hex(&mut ahead, 4)?;
    if !(0xDC00..=0xDFFF).contains(&low) {
        return None;
    }
    *chars = ahead;
    char::from_u32(0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00))
}
