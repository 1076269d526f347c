//! Interpreting one line of interactive input.

/// What a REPL line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Nothing typed
    Blank,
    Exit,
    /// `scrape @handle`: scrape directly without asking the engine
    Scrape(String),
    /// Anything else goes to the tool-call loop
    Ask(String),
}

const SCRAPE_PREFIX: &str = "scrape @";

pub const FAREWELL: &str = "Thank you for using Sleuth. Goodbye!";

pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Blank;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return ReplCommand::Exit;
    }

    let is_scrape = line
        .get(..SCRAPE_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(SCRAPE_PREFIX));
    if is_scrape
        && let Some(handle) = line[SCRAPE_PREFIX.len()..].split_whitespace().next()
    {
        return ReplCommand::Scrape(handle.to_string());
    }

    ReplCommand::Ask(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_is_case_insensitive() {
        assert_eq!(parse_line("exit"), ReplCommand::Exit);
        assert_eq!(parse_line("  EXIT \n"), ReplCommand::Exit);
        assert_eq!(parse_line("quit"), ReplCommand::Exit);
    }

    #[test]
    fn scrape_takes_first_word_after_at() {
        assert_eq!(parse_line("scrape @rustlang"), ReplCommand::Scrape("rustlang".into()));
        assert_eq!(parse_line("Scrape @Ferris now"), ReplCommand::Scrape("Ferris".into()));
    }

    #[test]
    fn scrape_without_handle_is_a_question() {
        assert_eq!(parse_line("scrape @"), ReplCommand::Ask("scrape @".into()));
        assert_eq!(
            parse_line("scrape the web for rust news"),
            ReplCommand::Ask("scrape the web for rust news".into())
        );
    }

    #[test]
    fn blank_and_plain_lines() {
        assert_eq!(parse_line("   "), ReplCommand::Blank);
        assert_eq!(parse_line(" what's new? "), ReplCommand::Ask("what's new?".into()));
    }

    #[test]
    fn multibyte_input_does_not_split_chars() {
        assert_eq!(parse_line("日本語の質問です"), ReplCommand::Ask("日本語の質問です".into()));
    }
}
