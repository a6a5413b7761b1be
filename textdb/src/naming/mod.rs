// Name formatting - turns table and row names into filesystem-safe entry names

/// Prefix marking hidden entries under the database root.
pub const HIDDEN_MARKER: char = '.';

/// Format a table or row name for use as a path segment.
///
/// Spaces become `_`, dots become `-` and slashes are dropped. The transform is
/// idempotent, so formatting an already formatted name is a no-op.
pub fn format_name(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '.' => Some('-'),
            '/' => None,
            other => Some(other),
        })
        .collect()
}

/// Whether a directory entry name should be skipped during enumeration.
pub fn is_hidden(entry_name: &str) -> bool {
    entry_name.starts_with(HIDDEN_MARKER)
}
