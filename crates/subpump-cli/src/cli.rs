use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;

use crate::config::Flavor;

#[derive(Parser, Debug)]
#[command(
    name = "subpump",
    version,
    about = "Replay captured pubsub frames through the interception layer"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "subpump.yaml")]
    pub config: PathBuf,

    /// Path to the rule file (overrides config file setting)
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// JSON-lines file of wire frames to replay; `-` reads stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Client shape to emulate (overrides config file setting)
    #[arg(long, value_enum)]
    pub flavor: Option<Flavor>,

    /// Subscribe to a topic before replaying; repeatable
    #[arg(long = "subscribe", value_name = "TOPIC")]
    pub subscribe: Vec<String>,

    /// Inject a message after replaying, as `<topic>=<json>`; repeatable
    #[arg(long = "inject", value_name = "TOPIC=JSON", value_parser = parse_injection)]
    pub inject: Vec<Injection>,

    /// Log level filter (overrides config file setting)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// A synthetic message requested on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub topic: String,
    pub message: Value,
}

fn parse_injection(raw: &str) -> Result<Injection, String> {
    let (topic, json) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <topic>=<json>, got '{raw}'"))?;
    if topic.is_empty() {
        return Err("injection topic must not be empty".to_string());
    }
    let message = serde_json::from_str(json).map_err(|e| format!("invalid JSON for '{topic}': {e}"))?;
    Ok(Injection {
        topic: topic.to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_injection() {
        let parsed = parse_injection(r#"video-playback.1={"viewers":3}"#).unwrap();
        assert_eq!(parsed.topic, "video-playback.1");
        assert_eq!(parsed.message, json!({"viewers": 3}));
    }

    #[test]
    fn json_may_contain_equals() {
        let parsed = parse_injection(r#"chat="a=b""#).unwrap();
        assert_eq!(parsed.message, json!("a=b"));
    }

    #[test]
    fn rejects_malformed_injections() {
        assert!(parse_injection("no-separator").is_err());
        assert!(parse_injection("={}").is_err());
        assert!(parse_injection("t={oops").unwrap_err().contains("invalid JSON"));
    }

    #[test]
    fn flags_accumulate() {
        let cli = Cli::try_parse_from([
            "subpump",
            "--flavor",
            "legacy",
            "--subscribe",
            "a",
            "--subscribe",
            "b",
            "--inject",
            "a=1",
            "-i",
            "-",
        ])
        .unwrap();
        assert_eq!(cli.flavor, Some(Flavor::Legacy));
        assert_eq!(cli.subscribe, vec!["a", "b"]);
        assert_eq!(cli.inject.len(), 1);
        assert_eq!(cli.input, Some(PathBuf::from("-")));
        assert_eq!(cli.config, PathBuf::from("subpump.yaml"));
    }
}
