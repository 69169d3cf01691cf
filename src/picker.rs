use crate::storage::{CmdEvent, ScopeKind, Selection};
use chrono::{DateTime, Local, SecondsFormat};
use regex::Regex;
use std::collections::HashSet;
use std::io::BufRead;
use thiserror::Error;
use tracing::warn;

/// Built-in noise filter for commands that never belong in a runbook.
pub const COMMON_EXCLUSIONS: &[&str] = &[r"^(ls|cd|pwd|clear|exit)$"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("start of range cannot be greater than end: {0}")]
    ReversedRange(String),
    #[error("invalid index: {0}")]
    InvalidIndex(String),
    #[error("index out of range: {index} (in \"{token}\")")]
    OutOfRange { index: i64, token: String },
}

/// Which patterns drop events before they are offered for picking.
#[derive(Debug, Clone, Default)]
pub struct ExclusionOptions {
    pub include_common: bool,
    pub patterns: Vec<String>,
}

impl ExclusionOptions {
    pub fn effective_patterns(&self) -> Vec<String> {
        let mut patterns = self.patterns.clone();
        if self.include_common {
            patterns.extend(COMMON_EXCLUSIONS.iter().map(|p| p.to_string()));
        }
        patterns
    }
}

/// Compile what compiles; a bad user pattern is reported and ignored.
pub fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %p, error = %e, "ignoring invalid regex");
                None
            }
        })
        .collect()
}

/// Drop events whose command, or whose first word, matches any pattern.
pub fn filter_exclusions(events: Vec<CmdEvent>, patterns: &[String]) -> Vec<CmdEvent> {
    let regexes = compile_patterns(patterns);
    if regexes.is_empty() {
        return events;
    }

    events
        .into_iter()
        .filter(|ev| {
            let first_word = ev.cmd.split_whitespace().next();
            !regexes.iter().any(|re| {
                re.is_match(&ev.cmd) || first_word.map_or(false, |w| re.is_match(w))
            })
        })
        .collect()
}

/// Parse input like `"5 2 3"`, `"1-4,7"` or `"all"` into 1-based indices.
///
/// Commas and whitespace both separate tokens. The result keeps the order in
/// which indices were first mentioned; repeats are ignored. Any bad token
/// fails the whole parse.
pub fn parse_selection(input: &str, max_index: usize) -> Result<Vec<usize>, SelectionError> {
    let mut selection = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |idx: usize, selection: &mut Vec<usize>| {
        if seen.insert(idx) {
            selection.push(idx);
        }
    };

    for token in input.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }

        if token == "all" {
            for idx in 1..=max_index {
                push(idx, &mut selection);
            }
            continue;
        }

        if token.contains('-') {
            let parts: Vec<&str> = token.split('-').collect();
            if parts.len() != 2 {
                return Err(SelectionError::InvalidRange(token.to_string()));
            }
            let (start, end) = match (parts[0].parse::<i64>(), parts[1].parse::<i64>()) {
                (Ok(start), Ok(end)) => (start, end),
                _ => return Err(SelectionError::InvalidRange(token.to_string())),
            };
            if start > end {
                return Err(SelectionError::ReversedRange(token.to_string()));
            }
            for idx in start..=end {
                let idx = checked_index(idx, max_index, token)?;
                push(idx, &mut selection);
            }
        } else {
            let idx = token
                .parse::<i64>()
                .map_err(|_| SelectionError::InvalidIndex(token.to_string()))?;
            let idx = checked_index(idx, max_index, token)?;
            push(idx, &mut selection);
        }
    }

    Ok(selection)
}

fn checked_index(idx: i64, max_index: usize, token: &str) -> Result<usize, SelectionError> {
    match usize::try_from(idx) {
        Ok(i) if i >= 1 && i <= max_index => Ok(i),
        _ => Err(SelectionError::OutOfRange {
            index: idx,
            token: token.to_string(),
        }),
    }
}

/// The most recent `n` events, still in log order.
pub fn take_last(mut events: Vec<CmdEvent>, n: usize) -> Vec<CmdEvent> {
    if events.len() > n {
        events.drain(..events.len() - n);
    }
    events
}

/// Read one line of selection input and map it onto `candidates`.
///
/// End of input or a blank line yields an empty pick.
pub fn read_pick<R: BufRead>(
    mut input: R,
    candidates: &[CmdEvent],
) -> anyhow::Result<Vec<CmdEvent>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Vec::new());
    }

    let indices = parse_selection(line.trim(), candidates.len())?;
    Ok(indices
        .into_iter()
        .map(|idx| candidates[idx - 1].clone())
        .collect())
}

/// Snapshot the picked events into a selection stamped with `now`.
pub fn build_selection(
    items: Vec<CmdEvent>,
    scope: ScopeKind,
    repo_root: Option<&str>,
    now: DateTime<Local>,
) -> Selection {
    Selection {
        id: now.format("%Y%m%d-%H%M%S").to_string(),
        created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        scope,
        repo_root: repo_root.unwrap_or_default().to_string(),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn cmd(text: &str) -> CmdEvent {
        CmdEvent {
            cmd: text.to_string(),
            cwd: "/src/app".to_string(),
            ..CmdEvent::default()
        }
    }

    fn cmds(events: &[CmdEvent]) -> Vec<&str> {
        events.iter().map(|e| e.cmd.as_str()).collect()
    }

    #[test]
    fn test_parse_selection() {
        let ok_cases: &[(&str, usize, &[usize])] = &[
            ("1 3 5", 10, &[1, 3, 5]),
            ("1-3 5", 10, &[1, 2, 3, 5]),
            ("all", 5, &[1, 2, 3, 4, 5]),
            ("1,2,3", 10, &[1, 2, 3]),
            ("1-3 2-4", 10, &[1, 2, 3, 4]),
            ("1 3-5 2", 10, &[1, 3, 4, 5, 2]),
            ("5 2 3", 5, &[5, 2, 3]),
            (" 4 ,\t2,, 4 ", 5, &[4, 2]),
            ("3 all", 4, &[3, 1, 2, 4]),
            ("2-2", 3, &[2]),
            ("", 3, &[]),
            ("all", 0, &[]),
        ];
        for (input, max, want) in ok_cases {
            assert_eq!(parse_selection(input, *max).unwrap(), want.to_vec(), "input {input:?}");
        }

        let err_cases = ["10", "abc", "1-", "-1", "1-2-3", "0", "2 99", "ALL"];
        for input in err_cases {
            assert!(parse_selection(input, 5).is_err(), "input {input:?}");
        }
    }

    #[test]
    fn reversed_range_fails_regardless_of_bound() {
        for max in [0, 1, 10, 1000] {
            assert_eq!(
                parse_selection("5-1", max),
                Err(SelectionError::ReversedRange("5-1".to_string()))
            );
        }
    }

    #[test]
    fn errors_name_the_offending_token() {
        assert_eq!(
            parse_selection("1 3-12", 10),
            Err(SelectionError::OutOfRange { index: 11, token: "3-12".to_string() })
        );
        assert_eq!(
            parse_selection("2 x", 10),
            Err(SelectionError::InvalidIndex("x".to_string()))
        );
        assert_eq!(
            parse_selection("a-3", 10),
            Err(SelectionError::InvalidRange("a-3".to_string()))
        );
        let msg = parse_selection("0", 10).unwrap_err().to_string();
        assert!(msg.contains("out of range") && msg.contains('0'));
    }

    #[test]
    fn huge_range_fails_fast() {
        let err = parse_selection("1-99999999999", 3).unwrap_err();
        assert_eq!(err, SelectionError::OutOfRange { index: 4, token: "1-99999999999".to_string() });
    }

    #[test]
    fn common_exclusion_matches_whole_command_or_first_word() {
        let events = vec![cmd("ls"), cmd("ls -la"), cmd("cd /tmp"), cmd("git status"), cmd("lsof -i")];
        let patterns = ExclusionOptions { include_common: true, patterns: Vec::new() }.effective_patterns();

        let kept = filter_exclusions(events, &patterns);
        // "ls -la" goes too: its first word alone satisfies the anchored pattern
        assert_eq!(cmds(&kept), vec!["git status", "lsof -i"]);
    }

    #[test]
    fn pattern_anchored_to_full_command_only_hits_exact_commands() {
        let events = vec![cmd("git status"), cmd("git status -s"), cmd("git")];
        let kept = filter_exclusions(events, &["^git status$".to_string()]);
        assert_eq!(cmds(&kept), vec!["git status -s", "git"]);
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let events = vec![cmd("make"), cmd("docker ps")];
        let kept = filter_exclusions(events, &["(unclosed".to_string(), "^docker".to_string()]);
        assert_eq!(cmds(&kept), vec!["make"]);

        let all_bad = filter_exclusions(vec![cmd("make")], &["[".to_string()]);
        assert_eq!(cmds(&all_bad), vec!["make"]);
    }

    #[test]
    fn exclusion_is_idempotent() {
        let events = vec![cmd("pwd"), cmd("cargo test"), cmd("exit"), cmd("vim src/main.rs")];
        let patterns = vec![r"^vim\b".to_string(), COMMON_EXCLUSIONS[0].to_string()];
        let once = filter_exclusions(events, &patterns);
        let twice = filter_exclusions(once.clone(), &patterns);
        assert_eq!(once, twice);
        assert_eq!(cmds(&once), vec!["cargo test"]);
    }

    #[test]
    fn take_last_keeps_tail_in_order() {
        let events = vec![cmd("a"), cmd("b"), cmd("c"), cmd("d")];
        assert_eq!(cmds(&take_last(events.clone(), 2)), vec!["c", "d"]);
        assert_eq!(cmds(&take_last(events, 10)), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn read_pick_follows_user_order() -> anyhow::Result<()> {
        let candidates = vec![cmd("a"), cmd("b"), cmd("c")];
        let picked = read_pick(Cursor::new("3 1\n"), &candidates)?;
        assert_eq!(cmds(&picked), vec!["c", "a"]);

        assert!(read_pick(Cursor::new(""), &candidates)?.is_empty());
        assert!(read_pick(Cursor::new("\n"), &candidates)?.is_empty());
        assert!(read_pick(Cursor::new("4\n"), &candidates).is_err());
        Ok(())
    }

    #[test]
    fn build_selection_uses_time_derived_id() {
        let now = Local.with_ymd_and_hms(2024, 6, 2, 14, 5, 9).unwrap();
        let sel = build_selection(vec![cmd("make")], ScopeKind::Repo, Some("/src/app"), now);
        assert_eq!(sel.id, "20240602-140509");
        assert!(sel.created_at.starts_with("2024-06-02T14:05:09"));
        assert_eq!(sel.repo_root, "/src/app");
        assert_eq!(sel.items.len(), 1);

        let global = build_selection(Vec::new(), ScopeKind::Global, None, now);
        assert_eq!(global.repo_root, "");
    }
}
