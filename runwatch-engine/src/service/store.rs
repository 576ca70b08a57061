//! Run store
//!
//! Holds the canonical in-memory view of known runs and merges fetched
//! pages into it.
//!
//! Merge policy: the remote source is authoritative. A fetched record always
//! replaces whatever the store holds for that id, including a provisional
//! entry announced locally. Provisional entries the remote has not confirmed
//! yet are kept as they are.

use runwatch_core::domain::event::Transition;
use runwatch_core::domain::run::{Run, RunStatus};
use runwatch_core::dto::run::RunRecord;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

/// A stored run plus whether the remote has confirmed it yet
#[derive(Debug, Clone)]
struct Entry {
    run: Run,
    provisional: bool,
}

/// In-memory run store
#[derive(Debug)]
pub struct RunStore {
    /// All known runs by id
    runs: HashMap<String, Entry>,

    /// Display order, most recent first. Holds every key of `runs` once.
    order: Vec<String>,

    /// Ids of runs in a non-terminal status
    active: HashSet<String>,

    /// Minimum duration given to finished runs
    completion_epsilon: chrono::Duration,

    /// Last fetch error, for consumers to display
    last_error: Option<String>,
}

impl RunStore {
    /// Creates an empty store
    ///
    /// # Arguments
    /// * `completion_epsilon` - Minimum duration of a finished run
    pub fn new(completion_epsilon: Duration) -> Self {
        Self {
            runs: HashMap::new(),
            order: Vec::new(),
            active: HashSet::new(),
            completion_epsilon: chrono::Duration::from_std(completion_epsilon)
                .unwrap_or_else(|_| chrono::Duration::seconds(1)),
            last_error: None,
        }
    }

    /// Inserts a run announced locally, before the remote necessarily has it
    ///
    /// An existing entry with the same id is replaced and the run moves to
    /// the front of the display order. A run announced in a terminal status
    /// gets its completion timestamp here.
    pub fn upsert_provisional(&mut self, mut run: Run) {
        run.normalize_completion(self.completion_epsilon);
        let id = run.id.clone();

        if self.runs.contains_key(&id) {
            debug!("Replacing run {} with provisional entry", id);
            self.order.retain(|known| known != &id);
        }

        self.order.insert(0, id.clone());
        self.track_activity(&run);
        self.runs.insert(
            id,
            Entry {
                run,
                provisional: true,
            },
        );
    }

    /// Merges a freshly fetched page into the store
    ///
    /// # Arguments
    /// * `records` - The page, newest first
    /// * `already_emitted` - Tells whether a transition was delivered before
    ///
    /// # Returns
    /// Transitions to terminal status that have not been emitted yet, in
    /// page order. A run counts as transitioning when it was active before
    /// this page, or when the remote reports it for the first time (unknown
    /// or only announced locally so far).
    pub fn reconcile<F>(&mut self, records: Vec<RunRecord>, already_emitted: F) -> Vec<Transition>
    where
        F: Fn(&Transition) -> bool,
    {
        let mut transitions = Vec::new();
        let mut page_order = Vec::with_capacity(records.len());
        let mut in_page = HashSet::with_capacity(records.len());

        for record in records {
            let mut run = match Run::try_from(record) {
                Ok(run) => run,
                Err(e) => {
                    warn!("Skipping malformed run record: {}", e);
                    continue;
                }
            };

            if run.status == RunStatus::Completed {
                if let Some(error) = &run.error {
                    warn!(
                        "Run {} reported as completed with an error ({}); treating it as completed",
                        run.id, error
                    );
                }
            }

            run.normalize_completion(self.completion_epsilon);

            let was_in_flight = self
                .runs
                .get(&run.id)
                .is_none_or(|entry| entry.provisional || entry.run.is_active());

            if was_in_flight {
                if let Some(transition) = Transition::from_run(&run) {
                    if already_emitted(&transition) {
                        debug!("Transition {} already emitted", transition.key());
                    } else {
                        transitions.push(transition);
                    }
                }
            }

            self.track_activity(&run);

            if in_page.insert(run.id.clone()) {
                page_order.push(run.id.clone());
            }

            self.runs.insert(
                run.id.clone(),
                Entry {
                    run,
                    provisional: false,
                },
            );
        }

        self.reorder(page_order, &in_page);

        transitions
    }

    /// Unconfirmed provisional runs first, then the page, then the rest
    fn reorder(&mut self, page_order: Vec<String>, in_page: &HashSet<String>) {
        let mut order = Vec::with_capacity(self.runs.len());

        order.extend(
            self.order
                .iter()
                .filter(|id| self.runs.get(*id).is_some_and(|entry| entry.provisional))
                .cloned(),
        );
        order.extend(page_order);
        order.extend(
            self.order
                .iter()
                .filter(|id| !in_page.contains(*id))
                .filter(|id| self.runs.get(*id).is_some_and(|entry| !entry.provisional))
                .cloned(),
        );

        self.order = order;
    }

    fn track_activity(&mut self, run: &Run) {
        if run.is_active() {
            self.active.insert(run.id.clone());
        } else {
            self.active.remove(&run.id);
        }
    }

    /// Number of runs in flight
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Whether any run is in flight
    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// All known runs, most recent first
    pub fn all(&self) -> Vec<Run> {
        self.order
            .iter()
            .filter_map(|id| self.runs.get(id))
            .map(|entry| entry.run.clone())
            .collect()
    }

    /// Looks up a run by id
    pub fn get(&self, id: &str) -> Option<&Run> {
        self.runs.get(id).map(|entry| &entry.run)
    }

    /// Whether the run was announced locally and not yet confirmed remotely
    pub fn is_provisional(&self, id: &str) -> bool {
        self.runs.get(id).is_some_and(|entry| entry.provisional)
    }

    /// Number of known runs
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the store knows no runs
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Last fetch error, if the most recent fetch failed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Records a fetch error
    pub fn set_last_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Clears the fetch error after a successful fetch
    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(id: &str, status: &str) -> RunRecord {
        RunRecord {
            id: Some(id.to_string()),
            status: Some(status.to_string()),
            created_at: Some(at(0)),
            ..Default::default()
        }
    }

    fn finished(id: &str, status: &str, completed: i64) -> RunRecord {
        RunRecord {
            completed_at: Some(at(completed)),
            ..record(id, status)
        }
    }

    fn store() -> RunStore {
        RunStore::new(Duration::from_secs(1))
    }

    fn never_emitted(_: &Transition) -> bool {
        false
    }

    fn ids(store: &RunStore) -> Vec<String> {
        store.all().into_iter().map(|run| run.id).collect()
    }

    #[test]
    fn test_upsert_provisional_replaces_existing_entry() {
        let mut store = store();
        store.upsert_provisional(Run::provisional("job-1", "first", RunStatus::Pending));
        store.upsert_provisional(Run::provisional("job-1", "second", RunStatus::Running));

        assert_eq!(store.len(), 1);
        assert_eq!(store.active_count(), 1);
        assert_eq!(store.get("job-1").unwrap().display_name, "second");
        assert!(store.is_provisional("job-1"));
    }

    #[test]
    fn test_completion_is_detected_once() {
        let mut store = store();
        store.upsert_provisional(Run::provisional("job-1", "export", RunStatus::Running));

        let mut emitted = HashSet::new();
        let first = store.reconcile(vec![finished("job-1", "completed", 0)], |t| {
            emitted.contains(&t.key())
        });
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, RunStatus::Completed);
        emitted.extend(first.iter().map(Transition::key));

        let second = store.reconcile(vec![finished("job-1", "completed", 0)], |t| {
            emitted.contains(&t.key())
        });
        assert!(second.is_empty());
        assert!(!store.has_active());
    }

    #[test]
    fn test_run_announced_as_finished() {
        let mut store = store();
        store.upsert_provisional(Run::provisional("job-1", "cached", RunStatus::Completed));

        let run = store.get("job-1").unwrap();
        assert!(run.completed_at.unwrap() > run.created_at);
        assert!(!store.has_active());

        // Remote confirmation is the first observation: the event still goes out.
        let transitions = store.reconcile(vec![finished("job-1", "completed", 4)], never_emitted);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].run_id, "job-1");
        assert_eq!(store.get("job-1").unwrap().completed_at, Some(at(4)));

        let again = store.reconcile(vec![finished("job-1", "completed", 4)], never_emitted);
        assert!(again.is_empty());
    }

    #[test]
    fn test_reconcile_keeps_siblings_of_badly_typed_record() {
        let page: Vec<RunRecord> = serde_json::from_str(
            r#"[
                {"id": "job-1", "status": "running", "createdAt": "2024-01-01T00:00:00Z"},
                {"id": "job-2", "status": "completed", "createdAt": "2024-01-01T00:00:00Z",
                 "completedAt": "not-a-date", "error": {"code": 1}}
            ]"#,
        )
        .unwrap();

        let mut store = store();
        let transitions = store.reconcile(page, never_emitted);

        assert_eq!(ids(&store), vec!["job-1", "job-2"]);
        assert_eq!(store.active_count(), 1);
        assert_eq!(transitions.len(), 1);
        let done = store.get("job-2").unwrap();
        assert!(done.completed_at.unwrap() > done.created_at);
    }

    #[test]
    fn test_completed_runs_have_positive_duration() {
        let mut store = store();
        store.reconcile(
            vec![
                finished("a", "completed", 0),
                finished("b", "failed", -5),
                finished("c", "completed", 40),
            ],
            never_emitted,
        );

        for run in store.all() {
            let completed_at = run.completed_at.unwrap();
            assert!(completed_at > run.created_at, "run {}", run.id);
        }
        assert_eq!(store.get("a").unwrap().completed_at, Some(at(1)));
        assert_eq!(store.get("c").unwrap().completed_at, Some(at(40)));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let mut store = store();
        let transitions = store.reconcile(
            vec![
                RunRecord {
                    status: Some("failed".to_string()),
                    ..Default::default()
                },
                record("job-2", "bogus"),
                record("job-3", "RUNNING"),
            ],
            never_emitted,
        );

        assert!(transitions.is_empty());
        assert_eq!(ids(&store), vec!["job-3"]);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_completed_status_wins_over_error_field() {
        let mut store = store();
        let page = vec![RunRecord {
            error: Some("disk quota exceeded".to_string()),
            ..finished("job-1", "completed", 3)
        }];

        let transitions = store.reconcile(page, never_emitted);

        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].status, RunStatus::Completed);
        assert_eq!(
            store.get("job-1").unwrap().error.as_deref(),
            Some("disk quota exceeded")
        );
    }

    #[test]
    fn test_terminal_to_terminal_is_not_a_transition() {
        let mut store = store();
        store.reconcile(vec![finished("job-1", "completed", 3)], never_emitted);

        let transitions = store.reconcile(vec![finished("job-1", "failed", 3)], never_emitted);

        assert!(transitions.is_empty());
        assert_eq!(store.get("job-1").unwrap().status, RunStatus::Failed);
    }

    #[test]
    fn test_transitions_follow_page_order() {
        let mut store = store();
        store.reconcile(
            vec![record("b", "running"), record("a", "queued")],
            never_emitted,
        );

        let transitions = store.reconcile(
            vec![finished("b", "failed", 2), finished("a", "completed", 2)],
            never_emitted,
        );

        let order: Vec<_> = transitions.iter().map(|t| t.run_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_provisional_runs_are_listed_first() {
        let mut store = store();
        store.reconcile(vec![record("old-2", "running"), record("old-1", "running")], never_emitted);
        store.upsert_provisional(Run::provisional("new-1", "first", RunStatus::Pending));
        store.upsert_provisional(Run::provisional("new-2", "second", RunStatus::Pending));

        assert_eq!(ids(&store), vec!["new-2", "new-1", "old-2", "old-1"]);

        // The remote confirms new-1 only; new-2 stays provisional on top.
        store.reconcile(
            vec![record("new-1", "running"), record("old-2", "running")],
            never_emitted,
        );

        assert_eq!(ids(&store), vec!["new-2", "new-1", "old-2", "old-1"]);
        assert!(store.is_provisional("new-2"));
        assert!(!store.is_provisional("new-1"));
    }

    #[test]
    fn test_no_duplicates_after_mixed_updates() {
        let mut store = store();
        store.upsert_provisional(Run::provisional("job-1", "x", RunStatus::Running));
        store.reconcile(vec![record("job-1", "running"), record("job-1", "running")], never_emitted);
        store.upsert_provisional(Run::provisional("job-1", "x", RunStatus::Running));
        store.reconcile(vec![finished("job-1", "completed", 9)], never_emitted);

        assert_eq!(ids(&store), vec!["job-1"]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_last_error_round_trip() {
        let mut store = store();
        assert_eq!(store.last_error(), None);
        store.set_last_error("connection refused");
        assert_eq!(store.last_error(), Some("connection refused"));
        store.clear_last_error();
        assert_eq!(store.last_error(), None);
    }
}
