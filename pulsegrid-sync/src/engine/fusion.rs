//! Temporal event fusion
//!
//! Clusters server-normalized events from multiple devices observing the
//! same physical beat into one canonical event. Matching is against the
//! cluster's median timestamp, so a late or early outlier contributor does
//! not corrupt the canonical time. A cluster is finalized once the incoming
//! event runs more than two windows ahead of its median, which bounds the
//! latency before an event is considered final.

use super::stats::{median, population_stddev};
use super::types::{CanonicalEvent, ServerEvent};
use std::collections::VecDeque;

/// Default clustering half-window in milliseconds
const DEFAULT_WINDOW_MS: f64 = 30.0;

/// Canonical events retained for history queries
const MAX_CANONICAL_EVENTS: usize = 1000;

#[derive(Debug)]
pub struct EventFusion {
    window_ms: f64,
    clusters: Vec<Vec<ServerEvent>>,
    canonical_events: VecDeque<CanonicalEvent>,
}

impl EventFusion {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            clusters: Vec::new(),
            canonical_events: VecDeque::new(),
        }
    }

    /// Add an event; returns the first canonical event finalized by this
    /// call, if any.
    ///
    /// Later-finalizing clusters in the same call are still appended to the
    /// canonical history; callers needing all of them re-query
    /// `recent_events`.
    pub fn add_event(&mut self, event: ServerEvent) -> Option<CanonicalEvent> {
        let current_time = event.t_server_ms;

        // Match against an open cluster's median timestamp
        let matched = self.clusters.iter_mut().find(|cluster| {
            let canonical_time = cluster_median(cluster);
            (event.t_server_ms - canonical_time).abs() <= self.window_ms
        });

        match matched {
            Some(cluster) => cluster.push(event),
            None => self.clusters.push(vec![event]),
        }

        // Finalize clusters lagging more than 2 windows behind the newest event
        let window_ms = self.window_ms;
        let mut finalized: Vec<CanonicalEvent> = Vec::new();
        self.clusters.retain(|cluster| {
            let canonical_time = cluster_median(cluster);
            if current_time - canonical_time > 2.0 * window_ms {
                if let Some(canonical) = create_canonical(cluster) {
                    finalized.push(canonical);
                }
                false
            } else {
                true
            }
        });

        for canonical in &finalized {
            if self.canonical_events.len() == MAX_CANONICAL_EVENTS {
                self.canonical_events.pop_front();
            }
            self.canonical_events.push_back(canonical.clone());
        }

        finalized.into_iter().next()
    }

    /// Canonical events at or after `since_ms`
    pub fn recent_events(&self, since_ms: f64) -> Vec<CanonicalEvent> {
        self.canonical_events
            .iter()
            .filter(|e| e.t_server_ms >= since_ms)
            .cloned()
            .collect()
    }

    /// Most recent `limit` canonical events, oldest first
    pub fn last_events(&self, limit: usize) -> Vec<CanonicalEvent> {
        let skip = self.canonical_events.len().saturating_sub(limit);
        self.canonical_events.iter().skip(skip).cloned().collect()
    }

    pub fn canonical_event_count(&self) -> usize {
        self.canonical_events.len()
    }

    pub fn active_cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn window_ms(&self) -> f64 {
        self.window_ms
    }
}

impl Default for EventFusion {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

fn cluster_median(cluster: &[ServerEvent]) -> f64 {
    let timestamps: Vec<f64> = cluster.iter().map(|e| e.t_server_ms).collect();
    median(&timestamps)
}

fn create_canonical(cluster: &[ServerEvent]) -> Option<CanonicalEvent> {
    if cluster.is_empty() {
        return None;
    }

    let timestamps: Vec<f64> = cluster.iter().map(|e| e.t_server_ms).collect();
    let durations: Vec<f64> = cluster.iter().map(|e| e.dur_ms).collect();

    Some(CanonicalEvent {
        t_server_ms: median(&timestamps),
        dur_ms: median(&durations),
        conf: cluster.len(),
        spread_ms: population_stddev(&timestamps),
        contributors: cluster.iter().map(|e| e.contributor_tag()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event(device: &str, t: f64) -> ServerEvent {
        ServerEvent {
            t_server_ms: t,
            dur_ms: 100.0,
            device_id: device.to_string(),
            source_id: None,
            quality: HashMap::new(),
        }
    }

    #[test]
    fn test_events_within_window_share_a_cluster() {
        let mut fusion = EventFusion::new(30.0);
        assert!(fusion.add_event(event("a", 100.0)).is_none());
        assert!(fusion.add_event(event("b", 120.0)).is_none());
        assert_eq!(fusion.active_cluster_count(), 1);
    }

    #[test]
    fn test_events_outside_window_open_new_cluster() {
        let mut fusion = EventFusion::new(30.0);
        fusion.add_event(event("a", 100.0));
        fusion.add_event(event("b", 160.0));
        assert_eq!(fusion.active_cluster_count(), 2);
    }

    #[test]
    fn test_finalized_canonical_is_median_of_members() {
        let mut fusion = EventFusion::new(30.0);
        fusion.add_event(event("a", 100.0));
        fusion.add_event(event("b", 120.0));
        // Cluster median is 110; an event at 200 is 90 > 60 ahead, so it finalizes
        let canonical = fusion.add_event(event("c", 200.0)).expect("cluster finalized");
        assert_eq!(canonical.t_server_ms, 110.0);
        assert_eq!(canonical.conf, 2);
        assert_eq!(canonical.contributors, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(canonical.spread_ms, 10.0);
    }

    #[test]
    fn test_singleton_cluster_has_zero_spread() {
        let mut fusion = EventFusion::new(30.0);
        fusion.add_event(event("a", 100.0));
        let canonical = fusion.add_event(event("a", 500.0)).expect("finalized");
        assert_eq!(canonical.conf, 1);
        assert_eq!(canonical.spread_ms, 0.0);
    }
}
