use similar::TextDiff;

/// Gets a unified diff, in the format accepted by `git apply`/`patch -p1`,
/// that turns the original text into the formatted text.
///
/// Returns an empty string when the texts are equal.
pub fn get_unified_diff(file_path: &str, original_text: &str, formatted_text: &str) -> String {
  if original_text == formatted_text {
    return String::new();
  }

  TextDiff::from_lines(original_text, formatted_text)
    .unified_diff()
    .context_radius(3)
    .header(&format!("a/{}", file_path), &format!("b/{}", file_path))
    .to_string()
}
