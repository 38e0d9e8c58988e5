//! Rendering snapshots for the terminal.

use serde::Serialize;
use session::EvaluationSnapshot;

/// One line of JSON output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record<'a> {
    Update {
        #[serde(flatten)]
        snapshot: &'a EvaluationSnapshot,
    },
    Final {
        position: &'a str,
        snapshot: Option<&'a EvaluationSnapshot>,
    },
    Superseded {
        position: &'a str,
    },
}

impl Record<'_> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"type":"error","message":"{}"}}"#, e))
    }
}

/// Human-readable multi-line summary of a snapshot.
pub fn format_snapshot(snapshot: &EvaluationSnapshot) -> String {
    let mut out = format!("depth {} score {}", snapshot.depth, snapshot.score);
    for line in &snapshot.lines {
        out.push_str(&format!(
            "\n  {:>2}. {:>7}  {}",
            line.rank,
            line.score.to_string(),
            line.moves.join(" ")
        ));
    }
    out
}

/// Display text for a finished item.
pub fn format_final(position: &str, snapshot: Option<&EvaluationSnapshot>) -> String {
    match snapshot {
        Some(snapshot) => {
            let best = snapshot.best_move().unwrap_or("(none)");
            format!("{}\nbestmove {}\n{}", position, best, format_snapshot(snapshot))
        }
        None => format!("{}\nno evaluation reached the minimum depth", position),
    }
}
