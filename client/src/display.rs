//! Turns server messages into lines for the terminal.

use shared::Message;

/// Formats an inbound message, or `None` for messages with nothing to show.
pub fn describe(message: &Message) -> Option<String> {
    let line = match message {
        Message::Welcome {
            resolved_name,
            roster,
            round_id,
            in_game,
            drawer,
        } => {
            let players: Vec<String> = roster
                .iter()
                .map(|entry| {
                    let ready = if entry.ready { " (ready)" } else { "" };
                    format!("{} {}{}", entry.name, entry.score, ready)
                })
                .collect();
            let status = match (in_game, drawer) {
                (true, Some(drawer)) => format!("round {} in progress, {} is drawing", round_id, drawer),
                _ => "waiting for players to get ready".to_string(),
            };
            format!(
                "Welcome, {}! Players: {}. {}.",
                resolved_name,
                players.join(", "),
                status
            )
        }
        Message::PlayerJoin { name } => format!("* {} joined", name),
        Message::PlayerLeave { name } => format!("* {} left", name),
        Message::RoundStart {
            round_id,
            drawer,
            hint,
        } => format!(
            "Round {}: {} is drawing a {}-letter word",
            round_id, drawer, hint
        ),
        Message::AssignWord { word } => format!("You are drawing: {}", word),
        Message::Chat { from, text } => {
            format!("<{}> {}", from.as_deref().unwrap_or("?"), text)
        }
        Message::RoundResult {
            winner,
            answer,
            scores,
        } => {
            let table: Vec<String> = scores
                .iter()
                .map(|(name, score)| format!("{}={}", name, score))
                .collect();
            format!(
                "{} guessed it! The word was {}. Scores: {}",
                winner,
                answer,
                table.join(" ")
            )
        }
        Message::System { text } => format!("[system] {}", text),
        Message::Draw { .. } => return None,
        Message::SetName { .. } | Message::Ready | Message::Guess { .. } | Message::Unknown => {
            return None
        }
    };
    Some(line)
}
