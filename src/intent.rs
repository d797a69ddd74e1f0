// Keyword interpreter: free text -> driving action or destination
//
// Local stand-in for the cloud language model. Checks run from the most
// safety-relevant keyword down, so "stop going forward" stops.

use crate::messages::Action;
use crate::navigation::Point;

/// Action plus optional intensity extracted from text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpretation {
    pub action: Action,
    pub magnitude: Option<f64>,
}

const STOP_WORDS: &[&str] = &["stop", "halt", "brake", "park", "freeze"];
const BACKWARD_WORDS: &[&str] = &["back", "backward", "backwards", "reverse"];
const LEFT_WORDS: &[&str] = &["left"];
const RIGHT_WORDS: &[&str] = &["right"];
const FORWARD_WORDS: &[&str] = &["forward", "ahead", "go", "drive", "straight", "move"];

/// Interpret a command phrase. Returns `None` when no keyword matches, and
/// for phrases naming a destination (see [`destination`]).
pub fn interpret(text: &str) -> Option<Interpretation> {
    if destination(text).is_some() {
        return None;
    }
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '.' || c == '_'))
        .map(|w| w.trim_matches('.'))
        .filter(|w| !w.is_empty())
        .collect();

    let has = |set: &[&str]| words.iter().any(|w| set.contains(w));

    // Exact action names ("TurnLeft", "move_forward") win outright
    let action = match words.as_slice() {
        [single] => single.parse::<Action>().ok(),
        _ => None,
    }
    .or_else(|| {
        if has(STOP_WORDS) {
            Some(Action::Stop)
        } else if has(BACKWARD_WORDS) {
            Some(Action::Backward)
        } else if has(LEFT_WORDS) {
            Some(Action::TurnLeft)
        } else if has(RIGHT_WORDS) {
            Some(Action::TurnRight)
        } else if has(FORWARD_WORDS) {
            Some(Action::Forward)
        } else {
            None
        }
    })?;

    Some(Interpretation {
        action,
        magnitude: magnitude(&words),
    })
}

/// Coordinates from a phrase like "go to 10, -4" or "navigate to (3 7)"
pub fn destination(text: &str) -> Option<Point> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')'))
        .filter(|w| !w.is_empty())
        .collect();

    let to = words.iter().position(|w| *w == "to")?;
    let mut numbers = words[to + 1..]
        .iter()
        .filter_map(|w| w.trim_end_matches('.').parse::<f64>().ok())
        .filter(|n| n.is_finite());
    Some((numbers.next()?, numbers.next()?))
}

fn magnitude(words: &[&str]) -> Option<f64> {
    // An explicit number beats modifiers
    if let Some(n) = words.iter().find_map(|w| w.parse::<f64>().ok()) {
        return n.is_finite().then_some(n.abs());
    }
    if words.iter().any(|w| matches!(*w, "slow" | "slowly" | "gently")) {
        Some(0.5)
    } else if words.iter().any(|w| matches!(*w, "fast" | "faster" | "quickly")) {
        Some(1.5)
    } else {
        None
    }
}
