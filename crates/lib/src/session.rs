//! # Session Query Log
//!
//! An observational, session-keyed log of served QA responses. Sessions are
//! bounded two ways: each log keeps only its most recent entries, and a
//! session that stays idle past its TTL is evicted wholesale. Nothing here
//! ever feeds back into prompts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// One served response, as recorded in a session log.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionLogEntry {
    pub ts: DateTime<Utc>,
    pub question: String,
    pub answer_length: usize,
    pub doc_count: usize,
}

struct Session {
    last_touched: Instant,
    log: VecDeque<SessionLogEntry>,
}

/// Tracks per-session query logs with idle-TTL eviction.
pub struct SessionTracker {
    idle_ttl: Duration,
    log_max: usize,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionTracker {
    pub fn new(idle_ttl: Duration, log_max: usize) -> Self {
        Self {
            idle_ttl,
            log_max: log_max.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Appends an entry to the session's log, resetting its idle timer.
    /// Expired sessions are swept on the way in.
    pub fn record(&self, session_id: &str, question: &str, answer_length: usize, doc_count: usize) {
        let mut sessions = self.sessions.lock().expect("session lock poisoned");
        sessions.retain(|_, session| session.last_touched.elapsed() < self.idle_ttl);

        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                last_touched: Instant::now(),
                log: VecDeque::new(),
            });
        session.last_touched = Instant::now();
        session.log.push_back(SessionLogEntry {
            ts: Utc::now(),
            question: question.trim().to_string(),
            answer_length,
            doc_count,
        });
        while session.log.len() > self.log_max {
            session.log.pop_front();
        }
    }

    /// The session's log, oldest first; empty when the session is unknown
    /// or has idled out. Reading does not touch the idle timer.
    pub fn log_for(&self, session_id: &str) -> Vec<SessionLogEntry> {
        let sessions = self.sessions.lock().expect("session lock poisoned");
        sessions
            .get(session_id)
            .filter(|session| session.last_touched.elapsed() < self.idle_ttl)
            .map(|session| session.log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live (not yet swept) sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session lock poisoned").len()
    }
}
