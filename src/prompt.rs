//! Interactive session input parsing.
//!
//! Maps lines typed at the session prompt to pipeline actions. Plain text
//! generates a first frame; slash commands drive the rest of the pipeline.

use std::path::PathBuf;

/// Commands the interactive session understands.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Generate a first-frame image from the given text prompt.
    Image(String),
    /// Animate the current first frame, optionally with a new prompt.
    Video(Option<String>),
    /// Download the video and save it, optionally to a custom path.
    Save(Option<PathBuf>),
    /// Print the raw video URL for copy/paste.
    ShowUrl,
    /// Print the session state and both result URLs.
    Status,
    /// Clear both results.
    Reset,
    /// Supply or replace the API token for this session.
    SetKey(String),
    /// Print the command list.
    Help,
    /// Leave the session.
    Quit,
}

/// Parse a line of input into a SessionCommand.
///
/// # Parsing Rules
/// - Empty/whitespace-only input is ignored
/// - `/video [prompt]` → `Video` (reuses the last prompt when none given)
/// - `/save [path]` → `Save`
/// - `/url` → `ShowUrl`
/// - `/status` → `Status`
/// - `/reset` → `Reset`
/// - `/key <token>` → `SetKey`
/// - `/help` → `Help`
/// - `/quit` or `/exit` → `Quit`
/// - Any other text → `Image(text)` command
pub fn parse_input(input: &str) -> Option<SessionCommand> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('/') {
        return parse_command(trimmed);
    }

    Some(SessionCommand::Image(trimmed.to_string()))
}

/// Parse a slash command. Unknown commands print a hint and return None.
fn parse_command(input: &str) -> Option<SessionCommand> {
    let (command, rest) = match input.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (input, ""),
    };

    match command.to_lowercase().as_str() {
        "/video" => {
            if rest.is_empty() {
                Some(SessionCommand::Video(None))
            } else {
                Some(SessionCommand::Video(Some(rest.to_string())))
            }
        }
        "/save" => {
            if rest.is_empty() {
                Some(SessionCommand::Save(None))
            } else {
                Some(SessionCommand::Save(Some(PathBuf::from(rest))))
            }
        }
        "/url" => Some(SessionCommand::ShowUrl),
        "/status" => Some(SessionCommand::Status),
        "/reset" => Some(SessionCommand::Reset),
        "/key" => {
            if rest.is_empty() {
                println!("Usage: /key <api-token>");
                None
            } else {
                Some(SessionCommand::SetKey(rest.to_string()))
            }
        }
        "/help" => Some(SessionCommand::Help),
        "/quit" | "/exit" => Some(SessionCommand::Quit),
        _ => {
            println!("Unknown command: {}", command);
            println!("Type /help for the command list.");
            None
        }
    }
}

/// Print the input prompt marker.
pub fn print_prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Print the command list.
pub fn print_help() {
    println!("Commands:");
    println!("  <text>            generate a first-frame image from the prompt");
    println!("  /video [prompt]   animate the current frame (reuses the last prompt)");
    println!("  /save [path]      download the video (default: animation.mp4)");
    println!("  /url              print the raw video URL");
    println!("  /status           show session state");
    println!("  /reset            clear image and video results");
    println!("  /key <token>      set the API token for this session");
    println!("  /quit             leave the session");
}
