use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Action requested from the `share` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareAction {
    Start,
    Stop,
    List,
}

impl FromStr for ShareAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(ShareAction::Start),
            "stop" => Ok(ShareAction::Stop),
            "list" => Ok(ShareAction::List),
            other => Err(format!(
                "invalid action '{other}'. Valid: start|stop|list"
            )),
        }
    }
}

/// Optional flags passed to the external share command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShareOptions {
    /// Local port to expose (`--port`).
    pub port: Option<u16>,
    /// Disable authentication on the shared endpoint (`--no-auth`).
    pub no_auth: bool,
}

/// Parse a simple duration string like `"30s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_case_insensitively() {
        assert_eq!("Start".parse::<ShareAction>(), Ok(ShareAction::Start));
        assert_eq!(" stop ".parse::<ShareAction>(), Ok(ShareAction::Stop));
        assert_eq!("LIST".parse::<ShareAction>(), Ok(ShareAction::List));

        let err = "restart".parse::<ShareAction>().unwrap_err();
        assert!(err.contains("start|stop|list"));
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("3d").is_err());
    }
}
