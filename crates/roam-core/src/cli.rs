use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

/// Global flags. Everything after them is the command and its arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "roam",
    version,
    about = "Track presence against the 90/180-day stay rule",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output (-q warnings, -qq errors only).
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Override one config key for this run, e.g. `--rc display.color=off`.
    #[arg(long = "rc", value_name = "KEY=VALUE", value_parser = parse_override)]
    pub rc_overrides: Vec<(String, String)>,

    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long = "data", value_name = "DIR")]
    pub data: Option<PathBuf>,

    /// Run against this profile (name or id) without switching to it.
    #[arg(long = "profile")]
    pub profile: Option<String>,

    /// Print results as JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    split_override(raw).ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

/// Splits `key=value` or `key:value`; the key must be non-empty.
fn split_override(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once('=').or_else(|| raw.split_once(':'))?;
    let key = key.trim();
    (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
}

fn default_log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        (0, _) => "trace",
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
/// `RUST_LOG` wins over the verbosity flags.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_log_level(verbose, quiet)))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let stderr_is_tty = std::io::stderr().is_terminal();
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(stderr_is_tty)
        .try_init()
    {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    /// Keys keep their `rc.` prefix; `Config::apply_overrides` strips it.
    pub rc_overrides: Vec<(String, String)>,
}

/// Pulls positional `rc.key=value` / `rc.key:value` tokens out of argv so
/// clap never sees them. The program name is always kept.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut pre = PreprocessedArgs {
        cleaned_args: Vec::with_capacity(raw.len()),
        rc_overrides: Vec::new(),
    };

    for (idx, arg) in raw.iter().enumerate() {
        let captured = (idx > 0)
            .then(|| arg.to_str())
            .flatten()
            .filter(|token| token.starts_with("rc."))
            .and_then(split_override);

        match captured {
            Some((key, value)) => {
                debug!(%key, %value, "captured positional rc override");
                pre.rc_overrides.push((key, value));
            }
            None => pre.cleaned_args.push(arg.clone()),
        }
    }

    pre
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string());

        let Some(first) = tokens.next() else {
            let cmd = cfg
                .get("default.command")
                .unwrap_or_else(|| "status".to_string());
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                command_args: vec![],
            });
        };

        let known = known_command_names();
        let command = expand_command_abbrev(&first, &known)
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {first}"))?;
        debug!(token = %first, expanded = %command, "resolved command token");

        Ok(Self {
            command: command.to_string(),
            command_args: tokens.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::{Invocation, default_log_level, preprocess_args, split_override};
    use crate::config::Config;

    fn os(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn strips_positional_rc_overrides() {
        let pre = preprocess_args(&os(&[
            "roam",
            "rc.display.color:off",
            "status",
            "rc.default.command=trips",
            "rc.",
        ]));
        assert_eq!(pre.cleaned_args, os(&["roam", "status", "rc."]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.display.color".to_string(), "off".to_string()),
                ("rc.default.command".to_string(), "trips".to_string()),
            ]
        );
    }

    #[test]
    fn override_tokens_need_a_key() {
        assert_eq!(
            split_override(" time.timezone = Europe/Paris "),
            Some(("time.timezone".to_string(), "Europe/Paris".to_string()))
        );
        assert_eq!(split_override("=off"), None);
        assert_eq!(split_override("novalue"), None);
    }

    #[test]
    fn verbosity_flags_pick_log_level() {
        assert_eq!(default_log_level(0, 0), "warn");
        assert_eq!(default_log_level(1, 0), "info");
        assert_eq!(default_log_level(2, 0), "debug");
        assert_eq!(default_log_level(5, 0), "trace");
        assert_eq!(default_log_level(3, 1), "warn");
        assert_eq!(default_log_level(0, 2), "error");
    }

    #[test]
    fn empty_invocation_uses_default_command() {
        let inv = Invocation::parse(&Config::default(), vec![]).expect("parse");
        assert_eq!(inv.command, "status");
        assert!(inv.command_args.is_empty());
    }

    #[test]
    fn expands_unique_prefix() {
        let inv = Invocation::parse(&Config::default(), os(&["brea", "2024-06-01"]))
            .expect("parse");
        assert_eq!(inv.command, "breakdown");
        assert_eq!(inv.command_args, vec!["2024-06-01".to_string()]);
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(Invocation::parse(&Config::default(), os(&["frobnicate"])).is_err());
    }
}
