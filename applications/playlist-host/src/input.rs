//! Console input parsing
//!
//! Each stdin line is either a JSON command in the wire format
//! (`{"action":"SEEK_ENDED","seek_position":30000}`) or a bare action word
//! followed by an optional argument (`SEEK_ENDED 30000`). A few host-only
//! words drive things the command surface does not cover.

use anyhow::{bail, Context, Result};
use playlist_core::{actions, CommandExtras, FocusChange, RemoteCommand};

/// One parsed line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(RemoteCommand),

    /// Forward an audio focus change
    Focus(FocusChange),

    /// Jump the cursor to an index
    Select(usize),

    /// Print the status snapshot
    Status,

    Quit,
}

/// Parse one line; `Ok(None)` for blank lines and comments
pub fn parse_line(line: &str) -> Result<Option<Input>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    if line.starts_with('{') {
        let command: RemoteCommand =
            serde_json::from_str(line).with_context(|| format!("Invalid JSON command: {line}"))?;
        return Ok(Some(Input::Command(command)));
    }

    let mut words = line.split_whitespace();
    let word = words.next().unwrap_or_default().to_ascii_uppercase();
    let argument = words.next();

    let input = match word.as_str() {
        "QUIT" | "EXIT" => Input::Quit,
        "STATUS" => Input::Status,
        "SELECT" => Input::Select(parse_number(&word, argument)?),
        "FOCUS" => Input::Focus(parse_focus(argument)?),
        action => Input::Command(RemoteCommand::from_action(
            action,
            &extras_for(action, argument)?,
        )?),
    };

    Ok(Some(input))
}

fn extras_for(action: &str, argument: Option<&str>) -> Result<CommandExtras> {
    let mut extras = CommandExtras::default();

    match action {
        actions::START => {
            if let Some(argument) = argument {
                extras.seek_position = Some(parse_number(action, Some(argument))?);
            }
        }
        actions::SEEK_ENDED => {
            extras.seek_position = argument
                .map(|argument| parse_number(action, Some(argument)))
                .transpose()?;
        }
        actions::ALLOWED_TYPE_CHANGED => {
            extras.mask = argument
                .map(|argument| parse_number(action, Some(argument)))
                .transpose()?;
        }
        _ => {}
    }

    Ok(extras)
}

fn parse_number<T: std::str::FromStr>(word: &str, argument: Option<&str>) -> Result<T> {
    let Some(argument) = argument else {
        bail!("{word} needs a numeric argument");
    };

    argument
        .parse()
        .map_err(|_| anyhow::anyhow!("{word}: `{argument}` is not a number"))
}

fn parse_focus(argument: Option<&str>) -> Result<FocusChange> {
    match argument.map(str::to_ascii_lowercase).as_deref() {
        Some("gained" | "gain") => Ok(FocusChange::Gained),
        Some("duck") => Ok(FocusChange::Lost { can_duck: true }),
        Some("lost" | "loss") => Ok(FocusChange::Lost { can_duck: false }),
        Some(other) => bail!("Unknown focus change `{other}` (gained, lost, duck)"),
        None => bail!("FOCUS needs one of: gained, lost, duck"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playlist_core::MediaType;

    fn parse(line: &str) -> Input {
        parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
        assert!(parse_line("# queue up").unwrap().is_none());
    }

    #[test]
    fn bare_words() {
        assert_eq!(parse("next"), Input::Command(RemoteCommand::Next));
        assert_eq!(parse("PLAY_PAUSE"), Input::Command(RemoteCommand::PlayPause));
        assert_eq!(parse("status"), Input::Status);
        assert_eq!(parse("quit"), Input::Quit);
        assert_eq!(parse("select 3"), Input::Select(3));
    }

    #[test]
    fn words_with_arguments() {
        assert_eq!(
            parse("SEEK_ENDED 30000"),
            Input::Command(RemoteCommand::SeekEnded {
                seek_position: 30_000
            })
        );
        assert_eq!(
            parse("START 5000"),
            Input::Command(RemoteCommand::Start {
                seek_position: 5_000,
                start_paused: false
            })
        );
        assert_eq!(
            parse("ALLOWED_TYPE_CHANGED 3"),
            Input::Command(RemoteCommand::AllowedTypeChanged {
                mask: MediaType::AUDIO | MediaType::VIDEO
            })
        );
    }

    #[test]
    fn json_commands() {
        assert_eq!(
            parse(r#"{"action":"START","start_paused":true}"#),
            Input::Command(RemoteCommand::Start {
                seek_position: 0,
                start_paused: true
            })
        );
        assert_eq!(
            parse(r#"{"action":"SEEK_ENDED","seek_position":42}"#),
            Input::Command(RemoteCommand::SeekEnded { seek_position: 42 })
        );
    }

    #[test]
    fn focus_changes() {
        assert_eq!(parse("focus gained"), Input::Focus(FocusChange::Gained));
        assert_eq!(
            parse("FOCUS duck"),
            Input::Focus(FocusChange::Lost { can_duck: true })
        );
        assert_eq!(
            parse("focus lost"),
            Input::Focus(FocusChange::Lost { can_duck: false })
        );
        assert!(parse_line("focus sideways").is_err());
        assert!(parse_line("focus").is_err());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_line("REWIND").is_err());
        assert!(parse_line("SEEK_ENDED").is_err());
        assert!(parse_line("SEEK_ENDED soon").is_err());
        assert!(parse_line("select").is_err());
        assert!(parse_line(r#"{"action":"FLY"}"#).is_err());
    }
}
