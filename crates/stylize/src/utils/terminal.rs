use crossterm::tty::IsTty;

/// Gets the width of the terminal when stderr is attached to one.
pub fn get_stderr_terminal_width() -> Option<u16> {
  if !std::io::stderr().is_tty() {
    return None;
  }
  match crossterm::terminal::size() {
    Ok((cols, _)) if cols > 0 => Some(cols),
    _ => None,
  }
}
