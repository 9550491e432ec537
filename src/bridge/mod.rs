//! Bridge - the synchronization and routing engine.
//!
//! The Bridge owns all routing state and drives the recurring tick:
//!
//! ```text
//!   discovery ──► topic sync ──► tail reads ──► dispatch
//!   (wezterm)     (Telegram)     (concurrent)   (chunk, send, collab)
//! ```
//!
//! Inbound chat events run on their own task and mutate the same state
//! (reply map, collab set) consumed by the next tick. Both flows take the
//! one state mutex, so their mutating sections are serialized; tail reads
//! for distinct panes run concurrently on snapshots and are joined before
//! dispatch begins.
//!
//! Steady-state failures are contained at the smallest unit - one pane,
//! one message, one tab - and logged; nothing in steady state is allowed
//! to crash the tick loop. The next tick is the retry mechanism.

// Rust guideline compliant 2025-01

pub mod discovery;
pub mod inbound;
pub mod reply;
pub mod tailer;
pub mod topics;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::future::join_all;
use tokio::sync::Mutex;

use crate::chunk::chunkify;
use crate::config::Config;
use crate::constants::{CHUNK_LIMIT, TOPIC_TITLE_LIMIT, UPDATE_POLL_TIMEOUT_SECS};
use crate::harness::{HarnessKind, HarnessRegistry};
use crate::messenger::Messenger;
use crate::state::StateStore;
use crate::wezterm::PaneController;

use discovery::DiscoveredPanes;
use reply::ReplyMap;
use tailer::{ReadOutcome, ReadPlan, TailPosition};
use topics::TopicRegistry;

/// All mutable routing state, owned as one aggregate.
///
/// One struct with a defined mutation API instead of free-standing
/// tables; the mutex around it is what serializes the tick loop against
/// the inbound handler.
#[derive(Debug)]
pub(crate) struct BridgeState {
    /// Tab ↔ topic bijection, mirrored to the durable store.
    pub topics: TopicRegistry,
    /// Which harness claimed each matched pane.
    pub pane_harness: HashMap<u64, HarnessKind>,
    /// Tab each tracked pane belongs to (matched and unmatched).
    pub pane_tab: HashMap<u64, u64>,
    /// Working directory of each tracked pane.
    pub pane_cwd: HashMap<u64, String>,
    /// Tail cursor per matched pane.
    pub tail: HashMap<u64, TailPosition>,
    /// Outbound message → source pane, for reply routing.
    pub replies: ReplyMap,
    /// Active collab sessions: tab → rounds remaining (0 = unlimited).
    pub collab: HashMap<u64, u32>,
}

impl BridgeState {
    fn new(topics: TopicRegistry) -> Self {
        Self {
            topics,
            pane_harness: HashMap::new(),
            pane_tab: HashMap::new(),
            pane_cwd: HashMap::new(),
            tail: HashMap::new(),
            replies: ReplyMap::default(),
            collab: HashMap::new(),
        }
    }
}

/// The bridge daemon: capabilities plus the owned state aggregate.
pub struct Bridge {
    pub(crate) config: Config,
    pub(crate) registry: Arc<HarnessRegistry>,
    pub(crate) controller: Arc<dyn PaneController>,
    pub(crate) messengers: HashMap<HarnessKind, Arc<dyn Messenger>>,
    store: StateStore,
    pub(crate) state: Mutex<BridgeState>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("harnesses", &self.registry.kinds())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Creates a bridge and restores the persisted tab→topic mapping.
    ///
    /// # Errors
    ///
    /// Returns an error when a configured harness has no messenger
    /// identity - that is a wiring bug, caught before the loop starts.
    pub fn new(
        config: Config,
        registry: Arc<HarnessRegistry>,
        controller: Arc<dyn PaneController>,
        messengers: HashMap<HarnessKind, Arc<dyn Messenger>>,
        store: StateStore,
    ) -> Result<Self> {
        for &kind in registry.kinds() {
            if !messengers.contains_key(&kind) {
                anyhow::bail!("harness {} has no messenger identity", kind.name());
            }
        }

        let topics = TopicRegistry::from_map(store.load());
        Ok(Self {
            config,
            registry,
            controller,
            messengers,
            store,
            state: Mutex::new(BridgeState::new(topics)),
        })
    }

    pub(crate) fn primary_messenger(&self) -> &Arc<dyn Messenger> {
        &self.messengers[&self.registry.primary()]
    }

    /// Runs the tick loop and the inbound handler until `shutdown` is set.
    pub async fn run(self: &Arc<Self>, shutdown: Arc<AtomicBool>) {
        let bridge = Arc::clone(self);
        let flag = Arc::clone(&shutdown);
        let inbound_task = tokio::spawn(async move { bridge.inbound_loop(&flag).await });

        while !shutdown.load(Ordering::Relaxed) {
            self.tick().await;
            tokio::time::sleep(Duration::from_secs(self.config.poll_interval)).await;
        }

        inbound_task.abort();
        log::info!("[bridge] shut down");
    }

    /// One full sync tick: discovery → topic sync → tail reads → dispatch.
    ///
    /// Ticks never overlap; the loop awaits completion before sleeping.
    pub async fn tick(&self) {
        let discovered = self.discover().await;
        self.sync_topics(&discovered).await;

        let plans = self.plan_reads().await;
        let outcomes = self.run_reads(plans).await;
        self.dispatch(outcomes).await;
    }

    /// Enumerate and classify panes. Classification touches the session
    /// filesystem, so it runs off the async path.
    pub(crate) async fn discover(&self) -> DiscoveredPanes {
        let panes = self.controller.list_panes().await;
        let registry = Arc::clone(&self.registry);

        match tokio::task::spawn_blocking(move || discovery::classify(panes, &registry)).await {
            Ok(discovered) => discovered,
            Err(e) => {
                log::error!("[bridge] discovery task failed: {e}");
                DiscoveredPanes::default()
            }
        }
    }

    /// Reconcile tracked panes and topics with this tick's discovery.
    ///
    /// This is the only point topics are created. Tabs that vanished have
    /// their topic closed (best effort) and their mapping removed; every
    /// structural change rewrites the durable store.
    async fn sync_topics(&self, discovered: &DiscoveredPanes) {
        let mut state = self.state.lock().await;
        let mut active_panes: HashSet<u64> = HashSet::new();
        let mut active_tabs: HashSet<u64> = HashSet::new();
        let mut dirty = false;

        for (pane, kind) in &discovered.matched {
            active_panes.insert(pane.pane_id);
            active_tabs.insert(pane.tab_id);
            state.pane_harness.insert(pane.pane_id, *kind);
            state.pane_tab.insert(pane.pane_id, pane.tab_id);
            state.pane_cwd.insert(pane.pane_id, pane.cwd.clone());
            dirty |= self
                .ensure_topic(&mut state, pane.tab_id, &pane.tab_title)
                .await;
        }

        for pane in &discovered.unmatched {
            active_panes.insert(pane.pane_id);
            active_tabs.insert(pane.tab_id);
            state.pane_tab.insert(pane.pane_id, pane.tab_id);
            state.pane_cwd.insert(pane.pane_id, pane.cwd.clone());
            // A pane that lost its session claim is input-only again.
            state.pane_harness.remove(&pane.pane_id);
            state.tail.remove(&pane.pane_id);
            dirty |= self
                .ensure_topic(&mut state, pane.tab_id, &pane.tab_title)
                .await;
        }

        let stale_panes: Vec<u64> = state
            .pane_tab
            .keys()
            .copied()
            .filter(|pid| !active_panes.contains(pid))
            .collect();
        for pid in stale_panes {
            state.pane_harness.remove(&pid);
            state.pane_tab.remove(&pid);
            state.pane_cwd.remove(&pid);
            state.tail.remove(&pid);
        }

        let stale_tabs: Vec<u64> = state
            .topics
            .tabs()
            .into_iter()
            .filter(|tab| !active_tabs.contains(tab))
            .collect();
        for tab in stale_tabs {
            if let Some(topic) = state.topics.remove_tab(tab) {
                // Local bookkeeping never stays blocked on remote cleanup.
                if let Err(e) = self.primary_messenger().close_topic(topic).await {
                    log::warn!("[topics] close failed for tab {tab}: {e}");
                }
                log::info!("[topics] closed topic {topic} for vanished tab {tab}");
                dirty = true;
            }
        }

        if dirty {
            if let Err(e) = self.store.save(state.topics.as_map()) {
                log::error!("[state] persist failed: {e}");
            }
        }
    }

    /// Create the topic for `tab_id` if it has none. Returns whether the
    /// mapping changed.
    async fn ensure_topic(&self, state: &mut BridgeState, tab_id: u64, tab_title: &str) -> bool {
        if state.topics.contains_tab(tab_id) {
            return false;
        }

        let title = if tab_title.is_empty() {
            format!("tab-{tab_id}")
        } else {
            tab_title.chars().take(TOPIC_TITLE_LIMIT).collect()
        };

        match self.primary_messenger().create_topic(&title).await {
            Ok(topic) => {
                log::info!("[topics] created topic {topic} for tab {tab_id} ({title})");
                state.topics.insert(tab_id, topic);
                true
            }
            Err(e) => {
                // Next tick retries; the tab stays unmapped meanwhile.
                log::warn!("[topics] create failed for tab {tab_id}: {e}");
                false
            }
        }
    }

    /// Snapshot a read plan per matched pane, in pane-id order.
    async fn plan_reads(&self) -> Vec<ReadPlan> {
        let state = self.state.lock().await;
        let mut plans: Vec<ReadPlan> = state
            .pane_harness
            .iter()
            .filter_map(|(&pane_id, &kind)| {
                let cwd = state.pane_cwd.get(&pane_id)?.clone();
                Some(ReadPlan {
                    pane_id,
                    kind,
                    cwd,
                    prev: state.tail.get(&pane_id).cloned(),
                })
            })
            .collect();
        plans.sort_by_key(|plan| plan.pane_id);
        plans
    }

    /// Run all tail reads concurrently and collect them in plan order.
    /// A failed read degrades to "no output for that pane this tick".
    async fn run_reads(&self, plans: Vec<ReadPlan>) -> Vec<ReadOutcome> {
        let tasks = plans.into_iter().map(|plan| {
            let registry = Arc::clone(&self.registry);
            tokio::task::spawn_blocking(move || tailer::read_new(&registry, &plan))
        });

        join_all(tasks)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    log::error!("[tailer] read task failed: {e}");
                    None
                }
            })
            .collect()
    }

    /// Apply cursors and route new messages: chunked sends under the
    /// pane's harness identity, reply recording, collab forwarding.
    async fn dispatch(&self, outcomes: Vec<ReadOutcome>) {
        let mut state = self.state.lock().await;

        for outcome in outcomes {
            let pane_id = outcome.pane_id;
            if let Some(pos) = outcome.pos {
                state.tail.insert(pane_id, pos);
            }
            if outcome.messages.is_empty() {
                continue;
            }

            let Some(kind) = state.pane_harness.get(&pane_id).copied() else {
                continue;
            };
            let Some(tab_id) = state.pane_tab.get(&pane_id).copied() else {
                continue;
            };
            let Some(topic) = state.topics.topic_for_tab(tab_id) else {
                continue;
            };
            let messenger = Arc::clone(&self.messengers[&kind]);

            for message in &outcome.messages {
                for piece in chunkify(message, CHUNK_LIMIT) {
                    match messenger.send(topic, &piece).await {
                        Ok(message_id) => state.replies.record(message_id, pane_id),
                        Err(e) => {
                            log::warn!("[bridge] send failed {}/{pane_id}: {e}", kind.name());
                        }
                    }
                }

                if state.collab.contains_key(&tab_id) {
                    self.forward_collab(&mut state, tab_id, pane_id, kind, message, topic)
                        .await;
                }
            }
        }
    }

    /// Relay one agent message as input to every other-harness pane in
    /// the tab, and account for a bounded collab round.
    async fn forward_collab(
        &self,
        state: &mut BridgeState,
        tab_id: u64,
        source_pane: u64,
        source_kind: HarnessKind,
        message: &str,
        topic: i64,
    ) {
        let mut targets: Vec<u64> = state
            .pane_harness
            .iter()
            .filter(|&(&pid, &kind)| {
                pid != source_pane
                    && kind != source_kind
                    && state.pane_tab.get(&pid) == Some(&tab_id)
            })
            .map(|(&pid, _)| pid)
            .collect();
        targets.sort_unstable();

        for target in targets {
            self.controller.send_input(target, message).await;
        }

        let Some(rounds) = state.collab.get(&tab_id).copied() else {
            return;
        };
        if rounds == 0 {
            return; // unlimited
        }
        if rounds - 1 == 0 {
            state.collab.remove(&tab_id);
            log::info!("[collab] tab {tab_id} finished its rounds");
            if let Err(e) = self.primary_messenger().send(topic, "collab done").await {
                log::warn!("[collab] completion notice failed: {e}");
            }
        } else {
            state.collab.insert(tab_id, rounds - 1);
        }
    }

    /// Long-poll the primary identity for chat events until shutdown.
    ///
    /// Updates that predate startup are skipped by fast-forwarding the
    /// poll offset once at the start.
    pub(crate) async fn inbound_loop(&self, shutdown: &AtomicBool) {
        let primary = Arc::clone(self.primary_messenger());

        let mut offset = match primary.poll_updates(-1, 0).await {
            Ok(updates) => updates.last().map_or(0, |u| u.update_id + 1),
            Err(e) => {
                log::warn!("[inbound] initial fast-forward failed: {e}");
                0
            }
        };

        while !shutdown.load(Ordering::Relaxed) {
            match primary.poll_updates(offset, UPDATE_POLL_TIMEOUT_SECS).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(&update).await;
                    }
                }
                Err(e) => {
                    log::warn!("[inbound] poll failed: {e}");
                    tokio::time::sleep(Duration::from_secs(self.config.poll_interval)).await;
                }
            }
        }
    }
}
