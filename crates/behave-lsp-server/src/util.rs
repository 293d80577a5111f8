//! UTF-16 position helpers.
//!
//! Indexes record byte offsets while reading text; editors address columns
//! in UTF-16 code units. The helpers here convert between the two.

/// Calculate UTF-16 code units for a character.
///
/// # Examples
///
/// ```
/// use behave_lsp_server::util::utf16_code_units;
///
/// assert_eq!(utf16_code_units('a'), 1);
/// assert_eq!(utf16_code_units('é'), 1);
/// assert_eq!(utf16_code_units('😀'), 2);
/// ```
#[inline]
#[must_use]
pub fn utf16_code_units(ch: char) -> u32 {
    if u32::from(ch) <= 0xFFFF { 1 } else { 2 }
}

/// UTF-16 length of `text`.
#[must_use]
pub fn utf16_len(text: &str) -> u32 {
    text.chars().map(utf16_code_units).sum()
}

/// Convert a byte offset within `line` to a UTF-16 column.
///
/// Offsets past the end of the line clamp to the line's UTF-16 length.
///
/// # Examples
///
/// ```
/// use behave_lsp_server::util::byte_to_utf16_col;
///
/// assert_eq!(byte_to_utf16_col("    Given x", 4), 4);
/// // "é" is two bytes but one UTF-16 unit.
/// assert_eq!(byte_to_utf16_col("@given(\"café {x}\")", 14), 13);
/// ```
#[must_use]
pub fn byte_to_utf16_col(line: &str, byte_col: usize) -> u32 {
    line.char_indices()
        .take_while(|(byte_pos, _)| *byte_pos < byte_col)
        .map(|(_, ch)| utf16_code_units(ch))
        .sum()
}

/// Convert a UTF-16 column within `line` to a byte offset.
///
/// Columns past the end of the line clamp to `line.len()`. A column that
/// falls inside a surrogate pair resolves to the start of that character.
#[must_use]
pub fn utf16_col_to_byte(line: &str, utf16_col: u32) -> usize {
    let mut units = 0u32;
    for (byte_pos, ch) in line.char_indices() {
        let width = utf16_code_units(ch);
        if units + width > utf16_col {
            return byte_pos;
        }
        units += width;
    }
    line.len()
}

/// Saturating conversion of a line index to the `u32` used by positions.
#[must_use]
pub fn line_u32(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
