//! Line commands read from stdin.

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Present a card with this idTag
    Swipe(String),
    /// Print the current state
    ShowState,
    Quit,
    /// Blank line
    Nothing,
}

pub fn parse_command(line: &str) -> Command {
    match line.trim() {
        "" => Command::Nothing,
        "state" | "?" => Command::ShowState,
        "quit" | "exit" => Command::Quit,
        tag => Command::Swipe(tag.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_word_is_a_swipe() {
        assert_eq!(parse_command("ABC"), Command::Swipe("ABC".into()));
        assert_eq!(parse_command("  XYZ \n"), Command::Swipe("XYZ".into()));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(parse_command("state"), Command::ShowState);
        assert_eq!(parse_command("?"), Command::ShowState);
        assert_eq!(parse_command("quit"), Command::Quit);
        assert_eq!(parse_command("exit"), Command::Quit);
    }

    #[test]
    fn test_blank_line_does_nothing() {
        assert_eq!(parse_command(""), Command::Nothing);
        assert_eq!(parse_command("   "), Command::Nothing);
    }
}
