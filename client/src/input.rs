//! Terminal input parsing
//!
//! Each line typed by the player becomes at most one protocol message:
//! - `/ready` casts a ready vote
//! - `/guess <text>` submits a guess
//! - `/quit` leaves the game
//! - anything else is sent as chat

use shared::Message;

/// What a line of player input asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(Message),
    Quit,
    /// Blank line or unusable command; the string explains why, if anything.
    Nothing(Option<String>),
}

pub fn parse_line(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Command::Nothing(None);
    }

    if let Some(rest) = line.strip_prefix('/') {
        let (command, argument) = match rest.split_once(' ') {
            Some((command, argument)) => (command, argument),
            None => (rest, ""),
        };

        return match command {
            "ready" => Command::Send(Message::Ready),
            "guess" if !argument.is_empty() => Command::Send(Message::Guess {
                text: argument.to_string(),
            }),
            "guess" => Command::Nothing(Some("usage: /guess <word>".to_string())),
            "quit" | "exit" => Command::Quit,
            other => Command::Nothing(Some(format!("unknown command /{}", other))),
        };
    }

    Command::Send(Message::Chat {
        from: None,
        text: line.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_and_quit() {
        assert_eq!(parse_line("/ready"), Command::Send(Message::Ready));
        assert_eq!(parse_line("/quit\n"), Command::Quit);
    }

    #[test]
    fn test_guess_keeps_text_verbatim() {
        assert_eq!(
            parse_line("/guess  Big Apple"),
            Command::Send(Message::Guess {
                text: " Big Apple".to_string()
            })
        );
        assert!(matches!(parse_line("/guess"), Command::Nothing(Some(_))));
    }

    #[test]
    fn test_plain_text_is_chat() {
        assert_eq!(
            parse_line("hello there\r\n"),
            Command::Send(Message::Chat {
                from: None,
                text: "hello there".to_string()
            })
        );
    }

    #[test]
    fn test_blank_and_unknown() {
        assert_eq!(parse_line("   "), Command::Nothing(None));
        assert_eq!(
            parse_line("/dance"),
            Command::Nothing(Some("unknown command /dance".to_string()))
        );
    }
}
