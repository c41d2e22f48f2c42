use std::{io::BufRead, path::Path};

use anyhow::Context as _;

use crate::foundation::error::{SongreelError, SongreelResult};

/// How many invalid answers a prompt tolerates before giving up.
pub const MAX_PROMPT_ATTEMPTS: usize = 5;

/// Ask a yes/no question on `input`.
///
/// Accepts `y`/`ye`/`yes` and `n`/`no` in any case; an empty line picks `yes_default`. Invalid
/// answers repeat the question up to `max_attempts` times, after which the answer is "no".
pub fn prompt_yes_no(
    message: &str,
    yes_default: bool,
    input: &mut impl BufRead,
    max_attempts: usize,
) -> bool {
    for _ in 0..max_attempts {
        tracing::warn!("{message}");
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "ye" | "yes" => return true,
            "n" | "no" => return false,
            "" => return yes_default,
            _ => {}
        }
    }
    tracing::error!("Too many invalid responses were given, shutting down...");
    false
}

/// Ask until one of `choices` is entered. `None` on end of input.
pub fn prompt_choice<'a>(
    message: &str,
    choices: &[&'a str],
    input: &mut impl BufRead,
) -> Option<&'a str> {
    loop {
        tracing::warn!("{message}");
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        let answer = line.trim();
        if let Some(choice) = choices.iter().find(|c| **c == answer) {
            return Some(choice);
        }
    }
}

/// Make sure `dir` exists, asking `confirm` before creating it.
///
/// A refusal is reported as `Aborted`.
pub fn ensure_output_dir(dir: &Path, confirm: impl FnOnce(&Path) -> bool) -> SongreelResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if !confirm(dir) {
        tracing::error!("User refused to create the output folder");
        return Err(SongreelError::Aborted);
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output folder '{}'", dir.display()))?;
    tracing::info!("Created new folder at {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn ask(answers: &str, yes_default: bool) -> bool {
        prompt_yes_no("continue?", yes_default, &mut Cursor::new(answers), 5)
    }

    #[test]
    fn yes_no_answers() {
        assert!(ask("y\n", false));
        assert!(ask("YES\n", false));
        assert!(ask("Ye\n", false));
        assert!(!ask("n\n", true));
        assert!(!ask("No\n", true));
    }

    #[test]
    fn empty_answer_uses_default() {
        assert!(ask("\n", true));
        assert!(!ask("\n", false));
    }

    #[test]
    fn invalid_answers_repeat_then_give_up() {
        assert!(ask("maybe\nperhaps\nyes\n", false));
        assert!(!ask("a\nb\nc\nd\ne\nyes\n", true));
        assert!(!ask("", true));
    }

    #[test]
    fn choice_skips_unknown_answers() {
        let mut input = Cursor::new("9\n 2 \n");
        assert_eq!(prompt_choice("pick", &["1", "2", "3"], &mut input), Some("2"));
        assert_eq!(prompt_choice("pick", &["1"], &mut Cursor::new("x\n")), None);
    }

    #[test]
    fn output_dir_is_created_on_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("videos").join("batch");
        ensure_output_dir(&target, |_| true).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn refusal_aborts_without_creating() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nope");
        let err = ensure_output_dir(&target, |_| false).unwrap_err();
        assert!(err.is_abort());
        assert!(!target.exists());
    }

    #[test]
    fn existing_dir_skips_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        ensure_output_dir(dir.path(), |_| panic!("should not ask")).unwrap();
    }
}
