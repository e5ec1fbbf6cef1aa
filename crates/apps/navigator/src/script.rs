//! Command scripts for `poi-navigator run`.
//!
//! One command per line or `;`-separated; `#` starts a comment.

use std::time::Duration;

use anyhow::{Context, bail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Submit an access token. The rest of the command is the token, so an
    /// empty one is passed through and refused by the gate. `;` and `#` end
    /// the command before it is read; tokens containing them must be given
    /// through `--token` instead.
    Token(String),
    Fly(i64),
    Click(u64),
    Toggle(i64),
    Wait(Duration),
    Clear,
    Retry,
    Unmount,
    /// Drop the navigator and start a fresh one against the same store.
    Restart,
}

pub fn parse(source: &str) -> anyhow::Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        for raw in line.split(';') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let step = parse_step(raw).with_context(|| format!("line {}: {raw:?}", line_no + 1))?;
            steps.push(step);
        }
    }
    Ok(steps)
}

fn parse_step(raw: &str) -> anyhow::Result<Step> {
    let (cmd, rest) = match raw.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (raw, ""),
    };
    let step = match cmd {
        "token" => Step::Token(rest.to_string()),
        "fly" => Step::Fly(rest.parse().context("fly takes a location index")?),
        "click" => Step::Click(rest.parse().context("click takes a marker id")?),
        "toggle" => Step::Toggle(rest.parse().context("toggle takes a location index")?),
        "wait" => Step::Wait(Duration::from_millis(
            rest.parse().context("wait takes milliseconds")?,
        )),
        "clear" => bare(cmd, rest, Step::Clear)?,
        "retry" => bare(cmd, rest, Step::Retry)?,
        "unmount" => bare(cmd, rest, Step::Unmount)?,
        "restart" => bare(cmd, rest, Step::Restart)?,
        other => bail!("unknown command {other:?}"),
    };
    Ok(step)
}

fn bare(cmd: &str, rest: &str, step: Step) -> anyhow::Result<Step> {
    if !rest.is_empty() {
        bail!("{cmd} takes no arguments");
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{Step, parse};

    #[test]
    fn parses_lines_and_semicolons() {
        let steps = parse(
            "token pk.abc; fly 2\n\
             # pause for the transition\n\
             wait 1600\n\
             toggle -1 ; click 7; clear; retry; unmount; restart\n",
        )
        .unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Token("pk.abc".into()),
                Step::Fly(2),
                Step::Wait(Duration::from_millis(1600)),
                Step::Toggle(-1),
                Step::Click(7),
                Step::Clear,
                Step::Retry,
                Step::Unmount,
                Step::Restart,
            ]
        );
    }

    #[test]
    fn bare_token_is_kept_empty() {
        assert_eq!(parse("token").unwrap(), vec![Step::Token(String::new())]);
    }

    #[test]
    fn separators_end_a_token() {
        assert_eq!(
            parse("token pk.a#b").unwrap(),
            vec![Step::Token("pk.a".into())]
        );
        assert!(parse("token pk.a;b").is_err());
    }

    #[test]
    fn rejects_garbage_with_line_context() {
        let err = parse("fly 1\nfly north").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(parse("jump 3").is_err());
        assert!(parse("clear now").is_err());
    }
}
