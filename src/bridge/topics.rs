//! The tab↔topic bijection.
//!
//! Invariant: at most one topic per tab and one tab per topic, at all
//! times. The reverse map is rebuilt from the forward map after every
//! mutation rather than maintained incrementally - a little repeated
//! work in exchange for making dual-update drift impossible.

use std::collections::HashMap;

/// Bidirectional tab-id ↔ topic-id mapping.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    tab_topic: HashMap<u64, i64>,
    topic_tab: HashMap<i64, u64>,
}

impl TopicRegistry {
    /// Restores a registry from a persisted forward map.
    #[must_use]
    pub fn from_map(tab_topic: HashMap<u64, i64>) -> Self {
        let mut registry = Self {
            tab_topic,
            topic_tab: HashMap::new(),
        };
        registry.rebuild();
        registry
    }

    fn rebuild(&mut self) {
        self.topic_tab = self
            .tab_topic
            .iter()
            .map(|(tab, topic)| (*topic, *tab))
            .collect();
    }

    /// Records `tab → topic`.
    pub fn insert(&mut self, tab_id: u64, topic_id: i64) {
        self.tab_topic.insert(tab_id, topic_id);
        self.rebuild();
    }

    /// Removes a tab's mapping, returning the topic it pointed at.
    pub fn remove_tab(&mut self, tab_id: u64) -> Option<i64> {
        let topic = self.tab_topic.remove(&tab_id);
        self.rebuild();
        topic
    }

    /// Topic for a tab.
    #[must_use]
    pub fn topic_for_tab(&self, tab_id: u64) -> Option<i64> {
        self.tab_topic.get(&tab_id).copied()
    }

    /// Tab for a topic.
    #[must_use]
    pub fn tab_for_topic(&self, topic_id: i64) -> Option<u64> {
        self.topic_tab.get(&topic_id).copied()
    }

    /// Whether a tab is mapped.
    #[must_use]
    pub fn contains_tab(&self, tab_id: u64) -> bool {
        self.tab_topic.contains_key(&tab_id)
    }

    /// All mapped tab ids.
    #[must_use]
    pub fn tabs(&self) -> Vec<u64> {
        self.tab_topic.keys().copied().collect()
    }

    /// The forward map, for persistence.
    #[must_use]
    pub fn as_map(&self) -> &HashMap<u64, i64> {
        &self.tab_topic
    }
}
