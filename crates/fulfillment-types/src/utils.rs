//! Formatting helpers for log output.

/// Truncates an identifier for display.
///
/// Shows only the first 8 characters followed by ".." for longer ids.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((cut, _)) => format!("{}..", &id[..cut]),
		None => id.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_short_ids_are_untouched() {
		assert_eq!(truncate_id("order1"), "order1");
		assert_eq!(truncate_id("12345678"), "12345678");
	}

	#[test]
	fn test_long_ids_are_truncated_on_char_boundary() {
		assert_eq!(truncate_id("123456789"), "12345678..");
		assert_eq!(truncate_id("ééééééééé"), "éééééééé..");
	}
}
