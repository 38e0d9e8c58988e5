use crate::{EngineCommand, SearchLimit};

/// Serialize a command to a single protocol line, without the trailing newline.
pub fn format_command(cmd: &EngineCommand) -> String {
    match cmd {
        EngineCommand::Uci => "uci".to_string(),
        EngineCommand::SetOption { name, value } => match value {
            Some(val) => format!("setoption name {} value {}", name, val),
            None => format!("setoption name {}", name),
        },
        EngineCommand::NewGame => "ucinewgame".to_string(),
        EngineCommand::IsReady => "isready".to_string(),
        EngineCommand::SetPosition { position } => format!("position fen {}", position),
        EngineCommand::Go(SearchLimit::Depth(depth)) => format!("go depth {}", depth),
        EngineCommand::Go(SearchLimit::MoveTime(ms)) => format!("go movetime {}", ms),
        EngineCommand::Stop => "stop".to_string(),
        EngineCommand::Quit => "quit".to_string(),
    }
}

impl std::fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_command(self))
    }
}
