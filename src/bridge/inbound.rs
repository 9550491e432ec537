//! Inbound chat handling: commands and reply routing.
//!
//! A text message in a topic routes to exactly one pane - the pane that
//! produced the message it replies to, or the tab's primary pane - unless
//! the tab is in collab mode, where the human's text seeds every tracked
//! harness pane at once. Everything is gated by the optional single-owner
//! check.

use crate::harness::HarnessKind;
use crate::messenger::{html_escape, Update};

use super::{Bridge, BridgeState};

impl Bridge {
    /// Handle one inbound chat event.
    ///
    /// Events outside topics, without text, or from anyone but the
    /// configured owner are silently ignored.
    pub async fn handle_update(&self, update: &Update) {
        let Some(thread_id) = update.thread_id else {
            return;
        };
        if update.text.is_empty() {
            return;
        }
        if self.config.owner != 0 && update.sender_id != self.config.owner {
            return;
        }

        if let Some(args) = command_args(&update.text, "collab") {
            self.handle_collab(thread_id, args).await;
        } else if command_args(&update.text, "list").is_some() {
            self.handle_list(thread_id).await;
        } else if !update.text.starts_with('/') {
            self.handle_text(thread_id, update).await;
        }
    }

    /// `/collab [rounds]` - toggle collab mode for the issuing tab.
    async fn handle_collab(&self, thread_id: i64, args: &str) {
        let mut state = self.state.lock().await;
        let Some(tab_id) = state.topics.tab_for_topic(thread_id) else {
            return;
        };

        let ack = if state.collab.remove(&tab_id).is_some() {
            log::info!("[collab] tab {tab_id} off");
            "collab off".to_string()
        } else {
            let rounds = args
                .split_whitespace()
                .next()
                .and_then(|arg| arg.parse::<u32>().ok())
                .unwrap_or(0);
            state.collab.insert(tab_id, rounds);
            log::info!("[collab] tab {tab_id} on ({rounds} rounds)");
            if rounds > 0 {
                format!("collab on ({rounds} rounds)")
            } else {
                "collab on".to_string()
            }
        };
        drop(state);

        if let Err(e) = self.primary_messenger().send(thread_id, &ack).await {
            log::warn!("[collab] ack failed: {e}");
        }
    }

    /// `/list` - fresh discovery, rendered read-only into the topic.
    async fn handle_list(&self, thread_id: i64) {
        let discovered = self.discover().await;

        if discovered.is_empty() {
            if let Err(e) = self.primary_messenger().send(thread_id, "no panes").await {
                log::warn!("[list] send failed: {e}");
            }
            return;
        }

        let mut lines = Vec::new();
        for (pane, kind) in &discovered.matched {
            lines.push(format!(
                "<code>{:<6}</code> <b>{}</b> {}",
                kind.name(),
                html_escape(&pane.tab_title),
                html_escape(&pane.title)
            ));
        }
        for pane in &discovered.unmatched {
            lines.push(format!(
                "<code>{:<6}</code> <b>{}</b> {}",
                "--",
                html_escape(&pane.tab_title),
                html_escape(&pane.title)
            ));
        }

        if let Err(e) = self
            .primary_messenger()
            .send_html(thread_id, &lines.join("\n"))
            .await
        {
            log::warn!("[list] send failed: {e}");
        }
    }

    /// Plain text: reply-routed, primary-pane routed, or collab broadcast.
    async fn handle_text(&self, thread_id: i64, update: &Update) {
        let state = self.state.lock().await;

        let mut pane_id = None;
        if let Some(reply_id) = update.reply_to_message_id {
            if let Some(source) = state.replies.pane_for(reply_id) {
                if !state.pane_tab.contains_key(&source) {
                    // The producing pane is gone; drop silently.
                    return;
                }
                pane_id = Some(source);
            }
        }

        if pane_id.is_none() {
            let Some(tab_id) = state.topics.tab_for_topic(thread_id) else {
                return;
            };
            pane_id = choose_primary_pane(&state, tab_id, self.registry.kinds());
        }

        let Some(pane_id) = pane_id else {
            return; // no routable pane; drop
        };
        let Some(tab_id) = state.pane_tab.get(&pane_id).copied() else {
            return;
        };

        let targets: Vec<u64> = if state.collab.contains_key(&tab_id) {
            // Collab: seed every harness pane in the tab.
            let mut all: Vec<u64> = state
                .pane_harness
                .keys()
                .copied()
                .filter(|pid| state.pane_tab.get(pid) == Some(&tab_id))
                .collect();
            all.sort_unstable();
            all
        } else {
            vec![pane_id]
        };
        drop(state);

        for target in targets {
            self.controller.send_input(target, &update.text).await;
        }
    }
}

/// Pick the tab's primary pane: harness-matched panes first in configured
/// preference order, then any tracked pane. Lowest pane id breaks ties.
fn choose_primary_pane(
    state: &BridgeState,
    tab_id: u64,
    preference: &[HarnessKind],
) -> Option<u64> {
    for &kind in preference {
        let matched = state
            .pane_harness
            .iter()
            .filter(|&(pid, k)| *k == kind && state.pane_tab.get(pid) == Some(&tab_id))
            .map(|(&pid, _)| pid)
            .min();
        if matched.is_some() {
            return matched;
        }
    }

    state
        .pane_tab
        .iter()
        .filter(|&(_, tab)| *tab == tab_id)
        .map(|(&pid, _)| pid)
        .min()
}

/// Parse `/name args` (tolerating a `/name@botid` suffix). Returns the
/// argument remainder when `text` invokes `name`.
fn command_args<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args),
        None => (rest, ""),
    };
    let head = head.split('@').next().unwrap_or(head);
    (head == name).then_some(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_command() {
        assert_eq!(command_args("/list", "list"), Some(""));
        assert_eq!(command_args("/collab", "collab"), Some(""));
    }

    #[test]
    fn parses_command_arguments() {
        assert_eq!(command_args("/collab 10", "collab"), Some("10"));
        assert_eq!(command_args("/collab  3 extra", "collab"), Some(" 3 extra"));
    }

    #[test]
    fn tolerates_bot_suffix() {
        assert_eq!(command_args("/collab@panegram_bot 5", "collab"), Some("5"));
    }

    #[test]
    fn rejects_other_text() {
        assert_eq!(command_args("collab", "collab"), None);
        assert_eq!(command_args("/collaborate", "collab"), None);
        assert_eq!(command_args("/list", "collab"), None);
    }
}
