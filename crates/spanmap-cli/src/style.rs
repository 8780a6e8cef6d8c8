// Terminal status glyphs, colored only when stdout is a terminal.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

pub fn check_mark() -> String {
    if std::io::stdout().is_terminal() {
        format!("{}", "✓".green())
    } else {
        "✓".to_string()
    }
}

pub fn cross_mark() -> String {
    if std::io::stdout().is_terminal() {
        format!("{}", "✗".red())
    } else {
        "✗".to_string()
    }
}
