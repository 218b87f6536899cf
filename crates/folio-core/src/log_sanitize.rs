//! Scrubbing of externally influenced strings before they reach a log sink.

use std::borrow::Cow;

/// Returns `value` with every C0 control character (`U+0000..=U+001F`)
/// removed, except horizontal tab which becomes a single space.
///
/// Newline and carriage return are dropped outright so a crafted username
/// cannot forge an extra log line. The output never contains a control
/// character, so sanitizing twice is a no-op. Borrows when nothing needs
/// to change.
///
/// Use the result only for display and audit fields. Request paths and
/// storage keys keep the original value.
#[must_use]
pub fn sanitize_for_log(value: &str) -> Cow<'_, str> {
    if !value.chars().any(is_c0_control) {
        return Cow::Borrowed(value);
    }

    Cow::Owned(
        value
            .chars()
            .filter_map(|c| match c {
                '\t' => Some(' '),
                c if is_c0_control(c) => None,
                c => Some(c),
            })
            .collect(),
    )
}

fn is_c0_control(c: char) -> bool {
    u32::from(c) < 0x20
}
