//! Escaping for the five reserved markup characters.

use crate::error::{DecodeError, DecodeResult};
use crate::repair::cp1252_byte;
use std::borrow::Cow;

/// Escape `& < > " '` for use in text content or attribute values.
/// Carriage returns are written as `&#13;` so they survive line-based
/// transports. Characters that text repair could reinterpret as
/// misdecoded bytes are written as numeric references, so the decoder
/// only repairs what arrived raw.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'', '\r']) && !text.chars().any(repairable) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\r' => out.push_str("&#13;"),
            other if repairable(other) => out.push_str(&format!("&#{};", other as u32)),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

fn repairable(ch: char) -> bool {
    !ch.is_ascii() && cp1252_byte(ch).is_some()
}

/// Resolve entity references. `pos` is the byte offset of `raw` in the
/// document and is only used for error reporting.
pub fn unescape(raw: &str, pos: usize) -> DecodeResult<Cow<'_, str>> {
    if !raw.contains('&') {
        return Ok(Cow::Borrowed(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut offset = pos;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| DecodeError::invalid_syntax(offset + amp, "unterminated entity"))?;
        let entity = &after[..semi];
        out.push(resolve_entity(entity).ok_or_else(|| {
            DecodeError::unknown_entity(offset + amp, entity)
        })?);

        let consumed = amp + 1 + semi + 1;
        rest = &rest[consumed..];
        offset += consumed;
    }
    out.push_str(rest);

    Ok(Cow::Owned(out))
}

fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}
