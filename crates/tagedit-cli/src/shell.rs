use std::io::{BufRead, Write};

use anyhow::{anyhow, bail, Result};
use tagedit_core::{SessionError, TagBackend, TagSession};

use crate::render::rows_text;

const HELP: &str = "\
commands:
  list                  show all tags
  toggle NAME           tag or untag the file
  add NAME [VALUE]      tag the file, creating the tag if needed
  rename OLD NEW        rename a tag in the whole database
  value NAME [VALUE]    change the value attached to the file
  delete NAME           delete a tag from the whole database
  values NAME           list values used with a tag
  complete PREFIX       list tag names starting with PREFIX
  reload                reload tags from tmsu
  quit                  leave
";

enum Step {
    Render,
    Continue,
    Quit,
}

/// Reads commands from `input` until `quit` or end of input, applying each
/// one to `session` and re-rendering the rows after every confirmed change.
pub fn run<B, R, W>(session: &mut TagSession<B>, input: R, out: &mut W, prompt: bool) -> Result<()>
where
    B: TagBackend,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    write!(out, "{}", rows_text(session.rows()))?;
    loop {
        if prompt {
            write!(out, "> ")?;
            out.flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let words = match shell_words::split(&line) {
            Ok(words) => words,
            Err(_) => {
                writeln!(out, "error: unbalanced quotes")?;
                continue;
            }
        };
        if words.is_empty() {
            continue;
        }
        match dispatch(session, &words, &mut lines, out, prompt) {
            Ok(Step::Render) => write!(out, "{}", rows_text(session.rows()))?,
            Ok(Step::Continue) => {}
            Ok(Step::Quit) => break,
            Err(err) => {
                writeln!(out, "error: {:#}", err)?;
                let partial = err
                    .downcast_ref::<SessionError>()
                    .is_some_and(SessionError::is_partial);
                if partial {
                    writeln!(out, "hint: run `reload` to see the tags tmsu kept")?;
                }
            }
        }
    }
    Ok(())
}

fn dispatch<B, I, W>(
    session: &mut TagSession<B>,
    words: &[String],
    lines: &mut I,
    out: &mut W,
    prompt: bool,
) -> Result<Step>
where
    B: TagBackend,
    I: Iterator<Item = std::io::Result<String>>,
    W: Write,
{
    let args: Vec<&str> = words[1..].iter().map(String::as_str).collect();
    match (words[0].as_str(), args.as_slice()) {
        ("list" | "ls", []) => Ok(Step::Render),
        ("toggle", [name]) => {
            session.toggle(name)?;
            Ok(Step::Render)
        }
        ("add", [name]) => {
            session.add(name, "")?;
            Ok(Step::Render)
        }
        ("add", [name, value]) => {
            session.add(name, value)?;
            Ok(Step::Render)
        }
        ("rename", [old, new]) => {
            session.edit_name(old, new)?;
            Ok(Step::Render)
        }
        ("value", [name]) => {
            session.edit_value(name, "")?;
            Ok(Step::Render)
        }
        ("value", [name, value]) => {
            session.edit_value(name, value)?;
            Ok(Step::Render)
        }
        ("delete", [name]) => {
            if session.rows().find_by_name(name).is_none() {
                bail!("No tag named {:?}", name);
            }
            write!(out, "Delete tag {:?} from every file? [y/N] ", name)?;
            if !prompt {
                writeln!(out)?;
            }
            out.flush()?;
            let answer = lines.next().transpose()?.unwrap_or_default();
            if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
                writeln!(out, "not deleted")?;
                return Ok(Step::Continue);
            }
            session.delete(name)?;
            Ok(Step::Render)
        }
        ("values", [name]) => {
            for value in session.suggest_values(name) {
                writeln!(out, "{}", value)?;
            }
            Ok(Step::Continue)
        }
        ("complete", [prefix]) => {
            for name in session.suggest_tags(prefix) {
                writeln!(out, "{}", name)?;
            }
            Ok(Step::Continue)
        }
        ("reload", []) => {
            session.reload()?;
            Ok(Step::Render)
        }
        ("help" | "?", []) => {
            write!(out, "{}", HELP)?;
            Ok(Step::Continue)
        }
        ("quit" | "exit" | "q", []) => Ok(Step::Quit),
        (command, _) => Err(anyhow!(
            "unknown command or wrong arguments: {} (try `help`)",
            command
        )),
    }
}
