//! Spotting hardware ids and debugger complaints in text the target displays.

/// Length of a hardware id: eight groups of four characters joined by dashes
pub const HWID_LEN: usize = 39;

/// Find the first hardware id shaped run in `text`
pub fn find_hwid(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, &b)| b == b'-')
        .filter_map(|(i, _)| i.checked_sub(4))
        .find(|&start| {
            bytes.get(start..start + HWID_LEN).is_some_and(|candidate| {
                candidate.iter().enumerate().all(|(j, &b)| match j % 5 {
                    4 => b == b'-',
                    _ => b.is_ascii_alphanumeric(),
                })
            })
        })
        .map(|start| &text[start..start + HWID_LEN])
}

/// Whether a message looks like the target complaining about a debugger
pub fn mentions_debugger(text: &str) -> bool {
    text.contains("ebug")
}
