use crate::storage::{CmdEvent, ScopeKind};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Label shown for commands run in the repository root itself.
pub const REPO_ROOT_LABEL: &str = "repo/";

/// Absolute path of the enclosing git work tree, or `None` outside one.
pub fn git_repo_root() -> Result<Option<String>> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .stderr(Stdio::null())
        .output()
        .context("failed to run git rev-parse")?;

    if !output.status.success() {
        return Ok(None);
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(if root.is_empty() { None } else { Some(root) })
}

/// Repository root to filter by for the requested scope; `None` means global.
///
/// Auto scope treats any git failure as "not in a repository"; an explicit
/// repo scope still reports a git that cannot be run.
pub fn resolve_repo_root(scope: ScopeKind) -> Result<Option<String>> {
    resolve_with(scope, git_repo_root)
}

fn resolve_with<F>(scope: ScopeKind, lookup: F) -> Result<Option<String>>
where
    F: FnOnce() -> Result<Option<String>>,
{
    match scope {
        ScopeKind::Global => Ok(None),
        ScopeKind::Auto => match lookup() {
            Ok(root) => Ok(root),
            Err(e) => {
                debug!(error = %format!("{:#}", e), "git unavailable, using global scope");
                Ok(None)
            }
        },
        ScopeKind::Repo => {
            let root = lookup()?;
            if root.is_none() {
                warn!("--scope repo requested outside a git repository, using global scope");
            }
            Ok(root)
        }
    }
}

/// Events whose working directory starts with `repo_root`, in log order.
///
/// This is a plain string-prefix test: a root of `/src/proj` also matches
/// `/src/proj2`. An empty root keeps everything.
pub fn filter_by_scope(events: Vec<CmdEvent>, repo_root: &str) -> Vec<CmdEvent> {
    if repo_root.is_empty() {
        return events;
    }

    events
        .into_iter()
        .filter(|ev| ev.cwd.starts_with(repo_root))
        .collect()
}

/// Short directory label for tables: relative to the root when inside it,
/// otherwise the last two path segments.
pub fn format_cwd(cwd: &str, repo_root: &str) -> String {
    if !repo_root.is_empty() && cwd.starts_with(repo_root) {
        return match pathdiff::diff_paths(Path::new(cwd), Path::new(repo_root)) {
            Some(rel) if !rel.as_os_str().is_empty() && rel != Path::new(".") => {
                format!("{}/", rel.display())
            }
            _ => REPO_ROOT_LABEL.to_string(),
        };
    }

    let parts: Vec<&str> = cwd.split('/').collect();
    if parts.len() > 2 {
        format!("{}/", parts[parts.len() - 2..].join("/"))
    } else {
        format!("{}/", parts[parts.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(cwd: &str, cmd: &str) -> CmdEvent {
        CmdEvent {
            cwd: cwd.to_string(),
            cmd: cmd.to_string(),
            ..CmdEvent::default()
        }
    }

    #[test]
    fn auto_scope_without_git_is_global() -> Result<()> {
        let no_git = || Err(anyhow::anyhow!("failed to run git rev-parse"));

        assert_eq!(resolve_with(ScopeKind::Auto, no_git)?, None);
        assert!(resolve_with(ScopeKind::Repo, no_git).is_err());
        assert_eq!(resolve_with(ScopeKind::Global, no_git)?, None);
        Ok(())
    }

    #[test]
    fn repo_scope_uses_lookup_result() -> Result<()> {
        let inside = || Ok(Some("/src/proj".to_string()));

        assert_eq!(resolve_with(ScopeKind::Auto, inside)?.as_deref(), Some("/src/proj"));
        assert_eq!(resolve_with(ScopeKind::Repo, inside)?.as_deref(), Some("/src/proj"));
        assert_eq!(resolve_with(ScopeKind::Repo, || Ok(None))?, None);
        Ok(())
    }

    #[test]
    fn test_format_cwd() {
        let cases = [
            ("/Users/me/code/proj/src", "/Users/me/code/proj", "src/"),
            ("/Users/me/code/proj/src/bin", "/Users/me/code/proj", "src/bin/"),
            ("/Users/me/code/proj", "/Users/me/code/proj", "repo/"),
            ("/Users/me/code/other", "/Users/me/code/proj", "code/other/"),
            ("/tmp", "", "tmp/"),
            ("/", "", "/"),
            ("relative", "", "relative/"),
        ];
        for (cwd, root, want) in cases {
            assert_eq!(format_cwd(cwd, root), want, "cwd={cwd} root={root}");
        }
    }

    #[test]
    fn root_with_trailing_separator_is_still_root() {
        assert_eq!(format_cwd("/src/proj/", "/src/proj/"), REPO_ROOT_LABEL);
    }

    #[test]
    fn empty_root_is_global() {
        let events = vec![at("/a", "one"), at("/b", "two")];
        assert_eq!(filter_by_scope(events.clone(), ""), events);
    }

    #[test]
    fn filters_by_prefix_and_keeps_order() {
        let events = vec![
            at("/src/proj", "make"),
            at("/home/me", "ls"),
            at("/src/proj/web", "npm test"),
            at("/src/proj", "git push"),
        ];
        let cmds: Vec<String> = filter_by_scope(events, "/src/proj")
            .into_iter()
            .map(|e| e.cmd)
            .collect();
        assert_eq!(cmds, vec!["make", "npm test", "git push"]);
    }

    #[test]
    fn sibling_with_shared_prefix_matches() {
        // String prefix, not a path-segment comparison
        let kept = filter_by_scope(vec![at("/src/proj2", "make")], "/src/proj");
        assert_eq!(kept.len(), 1);
        assert_eq!(format_cwd("/src/proj2", "/src/proj"), "../proj2/");
    }
}
