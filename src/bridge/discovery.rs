//! Pane discovery and classification.
//!
//! Every tick the full pane list is re-derived from the multiplexer and
//! classified per tab: for each harness, the still-unclaimed pane with
//! the most recently modified session file is claimed for that harness
//! (at most one pane per harness per tab). Panes with no session are
//! still reported as unmatched - they may start an agent later or need
//! plain text forwarding - unless their title names a known non-agent
//! process, in which case they are dropped entirely.

use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::harness::{HarnessKind, HarnessRegistry};
use crate::wezterm::PaneInfo;

/// Foreground process names that never host an agent and never get a
/// topic: shells, interpreters, editors and pagers.
const NON_AGENT_TITLES: &[&str] = &[
    "zsh", "bash", "fish", "sh", "dash", "node", "uv", "python", "python3", "ruby", "nvim", "vim",
    "nano", "htop", "top", "less", "man",
];

/// Classification result for one tick.
#[derive(Debug, Default)]
pub struct DiscoveredPanes {
    /// Panes claimed by a harness (have a discoverable session file).
    pub matched: Vec<(PaneInfo, HarnessKind)>,
    /// Relevant panes without a session yet.
    pub unmatched: Vec<PaneInfo>,
}

impl DiscoveredPanes {
    /// Whether nothing relevant was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.unmatched.is_empty()
    }
}

/// Classify `panes` against the configured harnesses.
///
/// Claiming runs per tab, per harness, independently; a pane claimed by
/// one harness cannot be claimed by another in the same tick. Tabs are
/// visited in id order; ties on session mtime keep the first pane in
/// enumeration order (stable only as far as the multiplexer's own
/// enumeration order is).
pub fn classify(panes: Vec<PaneInfo>, registry: &HarnessRegistry) -> DiscoveredPanes {
    let mut by_tab: BTreeMap<u64, Vec<PaneInfo>> = BTreeMap::new();
    for pane in panes {
        by_tab.entry(pane.tab_id).or_default().push(pane);
    }

    let mut discovered = DiscoveredPanes::default();
    for tab_panes in by_tab.values() {
        let mut claimed: Vec<u64> = Vec::new();

        for &kind in registry.kinds() {
            let mut best: Option<(&PaneInfo, SystemTime)> = None;
            for pane in tab_panes {
                if claimed.contains(&pane.pane_id) {
                    continue;
                }
                let Some(session) = registry.find_session(kind, &pane.cwd) else {
                    continue;
                };
                if best.is_none_or(|(_, mtime)| session.mtime > mtime) {
                    best = Some((pane, session.mtime));
                }
            }
            if let Some((pane, _)) = best {
                claimed.push(pane.pane_id);
                discovered.matched.push((pane.clone(), kind));
            }
        }

        for pane in tab_panes {
            if claimed.contains(&pane.pane_id) {
                continue;
            }
            if is_non_agent(&pane.title) {
                continue;
            }
            discovered.unmatched.push(pane.clone());
        }
    }

    discovered
}

fn is_non_agent(title: &str) -> bool {
    let title = title.trim().to_lowercase();
    NON_AGENT_TITLES.contains(&title.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn pane(pane_id: u64, tab_id: u64, title: &str, cwd: &str) -> PaneInfo {
        PaneInfo {
            pane_id,
            tab_id,
            tab_title: format!("tab-{tab_id}"),
            title: title.to_string(),
            cwd: cwd.to_string(),
        }
    }

    fn registry_with_claude_session(
        tmp: &tempfile::TempDir,
        cwds: &[&str],
    ) -> HarnessRegistry {
        let claude_root = tmp.path().join("claude");
        for cwd in cwds {
            let project = crate::harness::claude_project_dir(&claude_root, cwd);
            fs::create_dir_all(&project).unwrap();
            fs::write(project.join("session.jsonl"), "{}\n").unwrap();
        }
        HarnessRegistry::with_roots(
            vec![HarnessKind::Claude],
            claude_root,
            tmp.path().join("codex"),
        )
    }

    #[test]
    fn matches_pane_with_session() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_with_claude_session(&tmp, &["/srv/app"]);

        let discovered = classify(
            vec![pane(1, 10, "claude", "/srv/app"), pane(2, 10, "zsh", "/srv/app2")],
            &registry,
        );

        assert_eq!(discovered.matched.len(), 1);
        assert_eq!(discovered.matched[0].0.pane_id, 1);
        assert_eq!(discovered.matched[0].1, HarnessKind::Claude);
        assert!(discovered.unmatched.is_empty());
    }

    #[test]
    fn one_pane_per_harness_per_tab() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_with_claude_session(&tmp, &["/srv/one", "/srv/two"]);

        // Make /srv/two the fresher session.
        let one = crate::harness::claude_project_dir(&tmp.path().join("claude"), "/srv/one")
            .join("session.jsonl");
        fs::File::options()
            .write(true)
            .open(one)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(600))
            .unwrap();

        let discovered = classify(
            vec![pane(1, 10, "claude", "/srv/one"), pane(2, 10, "claude", "/srv/two")],
            &registry,
        );

        assert_eq!(discovered.matched.len(), 1);
        assert_eq!(discovered.matched[0].0.pane_id, 2);
        // The losing pane remains relevant as unmatched.
        assert_eq!(discovered.unmatched.len(), 1);
        assert_eq!(discovered.unmatched[0].pane_id, 1);
    }

    #[test]
    fn same_cwd_matches_once_per_tab() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_with_claude_session(&tmp, &["/srv/app"]);

        let discovered = classify(
            vec![
                pane(1, 10, "claude", "/srv/app"),
                pane(2, 20, "claude", "/srv/app"),
            ],
            &registry,
        );

        // Separate tabs each claim their own pane.
        assert_eq!(discovered.matched.len(), 2);
    }

    #[test]
    fn drops_shell_panes_entirely() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry_with_claude_session(&tmp, &[]);

        let discovered = classify(
            vec![
                pane(1, 10, " Zsh ", "/home/me"),
                pane(2, 10, "nvim", "/home/me"),
                pane(3, 10, "my-agent", "/home/me"),
            ],
            &registry,
        );

        assert!(discovered.matched.is_empty());
        assert_eq!(discovered.unmatched.len(), 1);
        assert_eq!(discovered.unmatched[0].pane_id, 3);
    }
}
