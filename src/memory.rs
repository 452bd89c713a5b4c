//! Durable, decaying store of learned facts about a user
//!
//! Each memory is one learned fact: a stated preference, an observed nudge
//! reaction, an inferred pattern. Memories are reinforced on repeat
//! observation, decay on a schedule, and are pruned below a confidence floor
//! or over a per-user cap.
//!
//! Decay is pure arithmetic over explicit timestamps: "now" is always passed
//! in so every decay step is reproducible in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Per-user cap on stored memories
pub const MEMORY_CAP: usize = 150;

/// Memories below this confidence are pruned
pub const CONFIDENCE_FLOOR: f64 = 0.15;

/// Initial confidence for a newly observed memory
pub const INITIAL_CONFIDENCE: f64 = 0.5;

/// Confidence boost applied on each reinforcement
pub const REINFORCE_BOOST: f64 = 0.1;

/// Evidence count at which the decay rate is halved (once)
pub const SLOW_DECAY_EVIDENCE: u32 = 5;

/// Default per-day multiplicative decay rate
pub const DEFAULT_DECAY_RATE: f64 = 0.02;

/// The six kinds of learned fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    NudgeFeedback,
    ProtocolEffectiveness,
    PreferredTime,
    StatedPreference,
    DetectedPattern,
    PreferenceConstraint,
}

impl MemoryKind {
    /// Relevance multiplier for retrieval and confidence aggregation.
    /// Explicit user statements weigh heaviest; AI-detected patterns least.
    pub fn relevance_multiplier(&self) -> f64 {
        match self {
            MemoryKind::StatedPreference | MemoryKind::PreferenceConstraint => 1.0,
            MemoryKind::NudgeFeedback | MemoryKind::ProtocolEffectiveness => 0.8,
            MemoryKind::PreferredTime => 0.6,
            MemoryKind::DetectedPattern => 0.4,
        }
    }

    /// Per-day decay rate for a new memory of this kind.
    /// Explicit statements decay slowest.
    pub fn default_decay_rate(&self) -> f64 {
        match self {
            MemoryKind::StatedPreference | MemoryKind::PreferenceConstraint => {
                DEFAULT_DECAY_RATE / 2.0
            }
            _ => DEFAULT_DECAY_RATE,
        }
    }
}

/// One learned fact about a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub kind: MemoryKind,
    /// Free-text content of the fact
    pub content: String,
    /// Signed signal in [-1, 1]: positive supports similar nudges, negative opposes
    pub polarity: f64,
    /// Confidence in the fact (0-1)
    pub confidence: f64,
    /// Number of supporting observations
    pub evidence_count: u32,
    /// Per-day multiplicative decay rate
    pub decay_rate: f64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub last_decayed_at: DateTime<Utc>,
    /// Hard expiry, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Protocol this fact was learned from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_protocol: Option<String>,
    /// Nudge this fact was learned from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_nudge_id: Option<String>,
}

/// A memory returned from retrieval, weighted for the current query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub memory: Memory,
    /// Query relevance (0-1): type multiplier x recency x keyword match
    pub relevance: f64,
}

/// Retrieval parameters
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    /// Restrict to these kinds; empty means all
    pub kinds: Vec<MemoryKind>,
    /// Keyword text to match against memory content
    pub text: Option<String>,
    /// Maximum number of memories to return
    pub limit: usize,
}

/// A new observation to record
#[derive(Debug, Clone)]
pub struct Observation {
    pub kind: MemoryKind,
    pub content: String,
    pub polarity: f64,
    pub expires_at: Option<DateTime<Utc>>,
    pub source_protocol: Option<String>,
    pub source_nudge_id: Option<String>,
}

impl Observation {
    pub fn new(kind: MemoryKind, content: impl Into<String>, polarity: f64) -> Self {
        Self {
            kind,
            content: content.into(),
            polarity: polarity.clamp(-1.0, 1.0),
            expires_at: None,
            source_protocol: None,
            source_nudge_id: None,
        }
    }
}

/// All memories for one user. One user owns all of their memories exclusively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBank {
    memories: Vec<Memory>,
    cap: usize,
}

impl Default for MemoryBank {
    fn default() -> Self {
        Self::new(MEMORY_CAP)
    }
}

impl MemoryBank {
    pub fn new(cap: usize) -> Self {
        Self {
            memories: Vec::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Memory> {
        self.memories.iter().find(|m| m.id == id)
    }

    /// Record an observation: reinforce an existing memory of the same kind
    /// and content, or create a new one.
    pub fn observe(&mut self, observation: Observation, now: DateTime<Utc>) -> Uuid {
        let existing = self.memories.iter_mut().find(|m| {
            m.kind == observation.kind && m.content.eq_ignore_ascii_case(&observation.content)
        });

        if let Some(memory) = existing {
            memory.confidence = (memory.confidence + REINFORCE_BOOST).min(1.0);
            memory.evidence_count += 1;
            // Decay slows once, when evidence becomes substantial
            if memory.evidence_count == SLOW_DECAY_EVIDENCE {
                memory.decay_rate /= 2.0;
            }
            memory.polarity = (memory.polarity + observation.polarity) / 2.0;
            memory.last_used_at = now;
            debug!(id = %memory.id, evidence = memory.evidence_count, "memory reinforced");
            return memory.id;
        }

        let memory = Memory {
            id: Uuid::new_v4(),
            kind: observation.kind,
            decay_rate: observation.kind.default_decay_rate(),
            content: observation.content,
            polarity: observation.polarity,
            confidence: INITIAL_CONFIDENCE,
            evidence_count: 1,
            created_at: now,
            last_used_at: now,
            last_decayed_at: now,
            expires_at: observation.expires_at,
            source_protocol: observation.source_protocol,
            source_nudge_id: observation.source_nudge_id,
        };
        let id = memory.id;
        self.memories.push(memory);
        id
    }

    /// Apply multiplicative decay for the time elapsed since each memory was
    /// last decayed: `confidence * (1 - rate)^days`.
    pub fn decay(&mut self, now: DateTime<Utc>) {
        for memory in &mut self.memories {
            let days = (now - memory.last_decayed_at).num_seconds() as f64 / 86_400.0;
            if days <= 0.0 {
                continue;
            }
            memory.confidence *= (1.0 - memory.decay_rate).powf(days);
            memory.last_decayed_at = now;
        }
    }

    /// Drop expired and low-confidence memories; enforce the per-user cap by
    /// keeping the highest-confidence memories.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let before = self.memories.len();
        self.memories.retain(|m| {
            let expired = m.expires_at.is_some_and(|exp| exp <= now);
            !expired && m.confidence >= CONFIDENCE_FLOOR
        });

        if self.memories.len() > self.cap {
            self.memories
                .sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
            self.memories.truncate(self.cap);
        }

        let dropped = before - self.memories.len();
        if dropped > 0 {
            debug!(dropped, remaining = self.memories.len(), "memories pruned");
        }
    }

    /// Retrieve memories weighted by relevance for the given query.
    /// Read-only: retrieval does not touch last-used timestamps.
    pub fn retrieve(&self, query: &MemoryQuery, now: DateTime<Utc>) -> Vec<RetrievedMemory> {
        let mut scored: Vec<RetrievedMemory> = self
            .memories
            .iter()
            .filter(|m| query.kinds.is_empty() || query.kinds.contains(&m.kind))
            .map(|m| RetrievedMemory {
                relevance: relevance(m, query.text.as_deref(), now),
                memory: m.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            let lhs = b.memory.confidence * b.relevance;
            let rhs = a.memory.confidence * a.relevance;
            lhs.partial_cmp(&rhs).unwrap_or(std::cmp::Ordering::Equal)
        });

        let limit = if query.limit == 0 { scored.len() } else { query.limit };
        scored.truncate(limit);
        scored
    }

    /// Load a memory bank from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the memory bank to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Relevance: type multiplier x recency factor x keyword match factor
fn relevance(memory: &Memory, text: Option<&str>, now: DateTime<Utc>) -> f64 {
    let type_factor = memory.kind.relevance_multiplier();

    // 30-day half-life on last use, floored so old explicit facts stay visible
    let age_days = (now - memory.last_used_at).num_seconds() as f64 / 86_400.0;
    let recency = 0.5_f64.powf(age_days.max(0.0) / 30.0).max(0.2);

    let keyword = match text {
        Some(text) if !text.is_empty() => {
            if keyword_overlap(&memory.content, text) {
                1.0
            } else {
                0.5
            }
        }
        _ => 1.0,
    };

    (type_factor * recency * keyword).clamp(0.0, 1.0)
}

/// Whether any word of one string appears in the other (case-insensitive)
pub fn keyword_overlap(a: &str, b: &str) -> bool {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let b_words: Vec<&str> = b_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .collect();
    a_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .any(|word| b_words.contains(&word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_observe_creates_then_reinforces() {
        let mut bank = MemoryBank::default();
        let now = t0();

        let id = bank.observe(
            Observation::new(MemoryKind::StatedPreference, "prefers morning workouts", 1.0),
            now,
        );
        assert_eq!(bank.len(), 1);
        assert!((bank.get(id).unwrap().confidence - INITIAL_CONFIDENCE).abs() < 0.001);

        // Same kind + content reinforces rather than duplicating
        let id2 = bank.observe(
            Observation::new(MemoryKind::StatedPreference, "Prefers Morning Workouts", 1.0),
            now,
        );
        assert_eq!(id, id2);
        assert_eq!(bank.len(), 1);
        let memory = bank.get(id).unwrap();
        assert_eq!(memory.evidence_count, 2);
        assert!((memory.confidence - 0.6).abs() < 0.001);
    }

    #[test]
    fn test_decay_rate_halves_once_at_evidence_threshold() {
        let mut bank = MemoryBank::default();
        let now = t0();
        let base_rate = MemoryKind::NudgeFeedback.default_decay_rate();

        let id = bank.observe(
            Observation::new(MemoryKind::NudgeFeedback, "dismissed evening stretch", -1.0),
            now,
        );
        for _ in 0..6 {
            bank.observe(
                Observation::new(MemoryKind::NudgeFeedback, "dismissed evening stretch", -1.0),
                now,
            );
        }
        let memory = bank.get(id).unwrap();
        assert_eq!(memory.evidence_count, 7);
        // Halved exactly once when evidence crossed the threshold
        assert!((memory.decay_rate - base_rate / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_decay_is_reproducible_from_explicit_now() {
        let mut bank = MemoryBank::default();
        let now = t0();
        let id = bank.observe(
            Observation::new(MemoryKind::DetectedPattern, "skips nudges on Mondays", -0.5),
            now,
        );

        let ten_days = now + chrono::Duration::days(10);
        bank.decay(ten_days);

        let memory = bank.get(id).unwrap();
        let expected = INITIAL_CONFIDENCE * (1.0 - DEFAULT_DECAY_RATE).powf(10.0);
        assert!((memory.confidence - expected).abs() < 1e-9);

        // Decaying again at the same instant is a no-op
        bank.decay(ten_days);
        assert!((bank.get(id).unwrap().confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_prune_floor_expiry_and_cap() {
        let mut bank = MemoryBank::new(3);
        let now = t0();

        for i in 0..5 {
            let id = bank.observe(
                Observation::new(MemoryKind::NudgeFeedback, format!("fact {i}"), 0.5),
                now,
            );
            // Stagger confidence so the cap keeps a predictable set
            for _ in 0..i {
                bank.observe(
                    Observation::new(MemoryKind::NudgeFeedback, format!("fact {i}"), 0.5),
                    now,
                );
            }
            let _ = id;
        }
        assert_eq!(bank.len(), 5);

        bank.prune(now);
        assert_eq!(bank.len(), 3);

        // The survivors are the highest-confidence facts
        let contents: Vec<&str> = bank.memories.iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"fact 4"));
        assert!(contents.contains(&"fact 3"));
        assert!(contents.contains(&"fact 2"));
    }

    #[test]
    fn test_prune_drops_expired_and_faded() {
        let mut bank = MemoryBank::default();
        let now = t0();

        let mut expiring = Observation::new(MemoryKind::PreferredTime, "evenings free in March", 0.5);
        expiring.expires_at = Some(now + chrono::Duration::days(5));
        bank.observe(expiring, now);
        bank.observe(
            Observation::new(MemoryKind::StatedPreference, "no caffeine after noon", -1.0),
            now,
        );

        let later = now + chrono::Duration::days(10);
        bank.prune(later);
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.memories[0].kind, MemoryKind::StatedPreference);

        // Heavy decay pushes below the floor
        bank.decay(now + chrono::Duration::days(365));
        bank.prune(now + chrono::Duration::days(365));
        assert_eq!(bank.len(), 0);
    }

    #[test]
    fn test_retrieve_weights_types_and_keywords() {
        let mut bank = MemoryBank::default();
        let now = t0();

        bank.observe(
            Observation::new(MemoryKind::DetectedPattern, "often ignores caffeine nudges", -0.5),
            now,
        );
        bank.observe(
            Observation::new(MemoryKind::StatedPreference, "no caffeine after noon", -1.0),
            now,
        );

        let query = MemoryQuery {
            kinds: vec![],
            text: Some("caffeine".to_owned()),
            limit: 10,
        };
        let retrieved = bank.retrieve(&query, now);
        assert_eq!(retrieved.len(), 2);
        // The explicit statement outranks the detected pattern
        assert_eq!(retrieved[0].memory.kind, MemoryKind::StatedPreference);
        assert!(retrieved[0].relevance > retrieved[1].relevance);
    }

    #[test]
    fn test_retrieve_respects_kind_filter_and_limit() {
        let mut bank = MemoryBank::default();
        let now = t0();
        bank.observe(Observation::new(MemoryKind::PreferredTime, "morning person", 1.0), now);
        bank.observe(
            Observation::new(MemoryKind::PreferenceConstraint, "no nudges during work", -1.0),
            now,
        );

        let query = MemoryQuery {
            kinds: vec![MemoryKind::PreferenceConstraint],
            text: None,
            limit: 1,
        };
        let retrieved = bank.retrieve(&query, now);
        assert_eq!(retrieved.len(), 1);
        assert_eq!(retrieved[0].memory.kind, MemoryKind::PreferenceConstraint);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut bank = MemoryBank::default();
        bank.observe(
            Observation::new(MemoryKind::ProtocolEffectiveness, "breathwork lowers RHR", 0.8),
            t0(),
        );
        let json = bank.to_json().unwrap();
        let loaded = MemoryBank::from_json(&json).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.memories[0].kind, MemoryKind::ProtocolEffectiveness);
    }

    #[test]
    fn test_keyword_overlap() {
        assert!(keyword_overlap("no caffeine after noon", "caffeine timing"));
        assert!(!keyword_overlap("morning sunlight", "evening stretch"));
        // Short words are ignored
        assert!(!keyword_overlap("go to it", "it is on"));
    }
}
