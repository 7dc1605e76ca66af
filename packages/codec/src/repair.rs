//! Best-effort repair of UTF-8 text that was decoded as Latin-1 / CP1252.
//!
//! `CafÃ©` → `Café`, `donâ€™t` → `don’t`. The repair only runs when the text
//! contains a lead-byte character followed by a continuation-byte character,
//! and is kept only if re-reading the bytes yields valid UTF-8. Otherwise the
//! input is returned untouched; repair never fails a decode.

use std::borrow::Cow;

pub fn repair_text(input: &str) -> Cow<'_, str> {
    if input.is_ascii() || !looks_misdecoded(input) {
        return Cow::Borrowed(input);
    }

    let Some(bytes) = input.chars().map(cp1252_byte).collect::<Option<Vec<u8>>>() else {
        return Cow::Borrowed(input);
    };

    match String::from_utf8(bytes) {
        Ok(fixed) if fixed != input => {
            tracing::debug!(original = input, repaired = %fixed, "repaired misdecoded text");
            Cow::Owned(fixed)
        }
        _ => Cow::Borrowed(input),
    }
}

fn looks_misdecoded(input: &str) -> bool {
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        let lead = matches!(cp1252_byte(ch), Some(0xC2..=0xF4));
        if lead {
            if let Some(next) = chars.peek() {
                if matches!(cp1252_byte(*next), Some(0x80..=0xBF)) {
                    return true;
                }
            }
        }
    }
    false
}

/// Byte that `ch` came from under a CP1252 (or Latin-1) reading
pub(crate) fn cp1252_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    if code <= 0xFF {
        return Some(code as u8);
    }

    let byte = match ch {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repairs_latin1_reading() {
        assert_eq!(repair_text("CafÃ©"), "Café");
        assert_eq!(repair_text("naÃ¯ve rÃ©sumÃ©"), "naïve résumé");
    }

    #[test]
    fn test_repairs_cp1252_reading() {
        assert_eq!(repair_text("donâ€™t"), "don’t");
        assert_eq!(repair_text("â€œquotedâ€\u{9d}"), "“quoted”");
    }

    #[test]
    fn test_leaves_clean_text_alone() {
        assert!(matches!(repair_text("plain ascii"), Cow::Borrowed(_)));
        assert!(matches!(repair_text("Café"), Cow::Borrowed(_)));
        assert!(matches!(repair_text("日本語"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_unrepairable_is_kept() {
        // lead/continuation pair, but the surrounding CJK cannot be re-encoded
        let input = "Ã© 日本";
        assert_eq!(repair_text(input), input);
    }

    #[test]
    fn test_invalid_utf8_after_reencode_is_kept() {
        // Ã followed by a continuation-looking char that does not complete a sequence
        let input = "Ã©Ã";
        assert_eq!(repair_text(input), input);
    }
}
