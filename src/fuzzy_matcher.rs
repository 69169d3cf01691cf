use crate::storage::CmdEvent;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// How a query matched a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Prefix,
    Substring,
    Fuzzy,
}

/// FZF-style matcher used to narrow long command lists before numbering them.
pub struct FzfMatcher {
    matcher: SkimMatcherV2,
}

impl FzfMatcher {
    pub fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    /// Prefix beats substring beats a scattered fuzzy hit.
    pub fn comprehensive_match(&self, pattern: &str, text: &str) -> Option<MatchKind> {
        let pattern_lower = pattern.to_lowercase();
        let text_lower = text.to_lowercase();

        if text_lower.starts_with(&pattern_lower) {
            Some(MatchKind::Prefix)
        } else if text_lower.contains(&pattern_lower) {
            Some(MatchKind::Substring)
        } else {
            self.matcher
                .fuzzy_match(text, pattern)
                .map(|_score| MatchKind::Fuzzy)
        }
    }

    /// Events whose command matches `query`, kept in log order so that
    /// numbering still follows the timeline. A blank query keeps everything.
    pub fn filter_events(&self, query: &str, events: Vec<CmdEvent>) -> Vec<CmdEvent> {
        let query = query.trim();
        if query.is_empty() {
            return events;
        }

        events
            .into_iter()
            .filter(|ev| self.comprehensive_match(query, &ev.cmd).is_some())
            .collect()
    }
}

impl Default for FzfMatcher {
    fn default() -> Self {
        Self::new()
    }
}
