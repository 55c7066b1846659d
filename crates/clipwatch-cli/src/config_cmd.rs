use crate::config::{Config, ConfigError, ConfigPaths};
use clap::Args;
use std::process::Command;
use std::str::FromStr;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Print config with the oauth token masked
    #[arg(long)]
    pub print: bool,

    /// Open the config in $VISUAL / $EDITOR
    #[arg(long)]
    pub edit: bool,

    /// Set a value by dotted key (e.g. detector.cooldown_s=45)
    #[arg(long, value_name = "key=value")]
    pub set: Vec<String>,
}

pub fn run(args: &ConfigArgs, paths: &ConfigPaths) -> Result<(), ConfigError> {
    let mut config = Config::load_or_create(paths)?;

    if args.edit {
        if args.print || !args.set.is_empty() {
            return Err(ConfigError::Invalid(
                "--edit opens the whole file; drop --print/--set".into(),
            ));
        }
        open_in_editor(paths)?;
        let edited = Config::load(paths)?;
        edited.validate()?;
        return Ok(());
    }

    for assignment in &args.set {
        apply_assignment(&mut config, assignment)?;
    }
    if !args.set.is_empty() {
        config.validate()?;
        config.store(paths)?;
    }

    if args.print || args.set.is_empty() {
        print!("{}", toml::to_string_pretty(&config.masked())?);
    }

    Ok(())
}

/// Launch `$VISUAL` (falling back to `$EDITOR`) on the config file. The
/// variable is split on whitespace: first token is the program, the rest
/// are arguments. An editor at a path with spaces needs a wrapper script.
fn open_in_editor(paths: &ConfigPaths) -> Result<(), ConfigError> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .map_err(|_| ConfigError::Editor("set VISUAL or EDITOR to edit the config".into()))?;

    let mut tokens = editor.split_whitespace();
    let program = tokens
        .next()
        .ok_or_else(|| ConfigError::Editor("VISUAL/EDITOR is empty".into()))?;

    let status = Command::new(program)
        .args(tokens)
        .arg(&paths.config_path)
        .status()
        .map_err(|err| ConfigError::Editor(format!("could not launch {program}: {err}")))?;
    if !status.success() {
        return Err(ConfigError::Editor(format!("{program} exited with {status}")));
    }
    Ok(())
}

/// Apply one `section.field=value` assignment. Keyword categories are
/// lists and can only be changed through `--edit`.
fn apply_assignment(config: &mut Config, assignment: &str) -> Result<(), ConfigError> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::Invalid(format!("expected key=value, got {assignment}")))?;
    let value = value.trim();

    let (section, field) = key
        .split_once('.')
        .ok_or_else(|| ConfigError::Invalid(format!("unknown config key: {key}")))?;

    match section {
        "detector" => {
            let detector = &mut config.detector;
            match field {
                "clip_duration_s" => detector.clip_duration_s = parsed(key, value)?,
                "lookback_s" => detector.lookback_s = parsed(key, value)?,
                "cooldown_s" => detector.cooldown_s = parsed(key, value)?,
                "min_score" => detector.min_score = parsed(key, value)?,
                _ => return unknown_key(key),
            }
        }
        "scoring" => {
            let scoring = &mut config.scoring;
            match field {
                "spike_weight" => scoring.spike_weight = parsed(key, value)?,
                "keyword_weight" => scoring.keyword_weight = parsed(key, value)?,
                "uniqueness_weight" => scoring.uniqueness_weight = parsed(key, value)?,
                "min_clip_score" => scoring.min_clip_score = parsed(key, value)?,
                "keyword_threshold" => scoring.keyword_threshold = parsed(key, value)?,
                _ => return unknown_key(key),
            }
        }
        "matcher" => match field {
            "similarity_threshold" => config.matcher.similarity_threshold = parsed(key, value)?,
            _ => return unknown_key(key),
        },
        "irc" => match field {
            "host" => config.irc.host = value.to_string(),
            "port" => config.irc.port = parsed(key, value)?,
            "username" => config.irc.username = value.to_string(),
            "oauth" => config.irc.oauth = value.to_string(),
            _ => return unknown_key(key),
        },
        "vod" => match field {
            "client_id" => config.vod.client_id = value.to_string(),
            _ => return unknown_key(key),
        },
        "keywords" => {
            return Err(ConfigError::Invalid(
                "keyword categories are lists; change them with --edit".into(),
            ));
        }
        _ => return unknown_key(key),
    }

    Ok(())
}

fn unknown_key(key: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(format!("unknown config key: {key}")))
}

fn parsed<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}: cannot parse {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::apply_assignment;
    use crate::config::Config;

    #[test]
    fn assignments_update_each_section() {
        let mut config = Config::default();
        apply_assignment(&mut config, "detector.cooldown_s=45").unwrap();
        apply_assignment(&mut config, "scoring.min_clip_score=0.8").unwrap();
        apply_assignment(&mut config, "matcher.similarity_threshold=0.9").unwrap();
        apply_assignment(&mut config, "irc.port=6697").unwrap();
        apply_assignment(&mut config, "irc.username=streamfan").unwrap();
        apply_assignment(&mut config, "vod.client_id=abc123").unwrap();

        assert_eq!(config.detector.cooldown_s, 45);
        assert_eq!(config.scoring.min_clip_score, 0.8);
        assert_eq!(config.matcher.similarity_threshold, 0.9);
        assert_eq!(config.irc.port, 6697);
        assert_eq!(config.irc.username, "streamfan");
        assert_eq!(config.vod.client_id, "abc123");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut config = Config::default();
        assert!(apply_assignment(&mut config, "detector.window=10").is_err());
        assert!(apply_assignment(&mut config, "nosuchsection.field=1").is_err());
        assert!(apply_assignment(&mut config, "flat_key=1").is_err());
        assert!(apply_assignment(&mut config, "keywords.wins=W").is_err());
    }

    #[test]
    fn bad_values_name_the_offending_key() {
        let mut config = Config::default();
        let err = apply_assignment(&mut config, "irc.port=soon").unwrap_err();
        assert!(err.to_string().contains("irc.port"));
        assert!(apply_assignment(&mut config, "missing-equals-sign").is_err());
    }
}
