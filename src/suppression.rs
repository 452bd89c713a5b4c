//! Delivery suppression engine
//!
//! The final gate before a nudge reaches the user: a fixed, priority-ordered
//! list of independent rules, each returning suppress/allow with a reason.
//!
//! Override semantics are order-dependent and must be preserved exactly:
//! walk the rules in order; on a suppress result, check whether the
//! candidate's priority class may override that rule. If so, record the
//! override and keep walking; if not, stop and return suppressed. One nudge
//! may be granted several overrides before ultimately passing or failing.
//!
//! Evaluation is a total function: every well-formed context produces a
//! decision, never an error. A gate that throws instead of deciding
//! "suppress" is itself a safety bug.

use crate::types::PriorityClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suppression thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionConfig {
    /// Maximum nudges delivered per day
    pub daily_cap: u32,
    /// Minimum minutes between deliveries
    pub cooldown_minutes: i64,
    /// Dismissals today that indicate nudge fatigue
    pub fatigue_dismissals: u32,
    /// Meeting hours today that indicate an overloaded day
    pub meeting_heavy_hours: f64,
    /// Recovery score below which non-recovery nudges are held
    pub low_recovery_threshold: f64,
    /// Streak length at which streak protection engages
    pub streak_min_days: u32,
    /// Confidence below this fails the floor
    pub confidence_floor: f64,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            daily_cap: 5,
            cooldown_minutes: 90,
            fatigue_dismissals: 3,
            meeting_heavy_hours: 6.0,
            low_recovery_threshold: 30.0,
            streak_min_days: 3,
            confidence_floor: 0.4,
        }
    }
}

/// Local quiet-hours window; wraps midnight when start > end
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuietHours {
    /// Hour the window opens (0-23)
    pub start: u32,
    /// Hour the window closes (0-23), exclusive
    pub end: u32,
}

impl QuietHours {
    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

/// Ephemeral per-evaluation input; consumed once and discarded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionContext {
    pub delivered_today: u32,
    pub dismissed_today: u32,
    pub last_delivery_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
    /// Local hour of day (0-23)
    pub local_hour: u32,
    pub quiet_hours: QuietHours,
    /// Meeting hours today, if calendar data is available
    pub meeting_hours_today: Option<f64>,
    /// Current habit streak length (days)
    pub streak_days: u32,
    /// Whether this candidate would interrupt the streak habit
    pub candidate_conflicts_with_streak: bool,
    /// Latest recovery score, if one exists
    pub recovery_score: Option<f64>,
    /// Whether the candidate is recovery-oriented
    pub candidate_recovery_oriented: bool,
    /// Whether an MVD is currently active
    pub mvd_active: bool,
    /// Whether the candidate is on the active MVD allowlist
    /// (only meaningful when `mvd_active`)
    pub candidate_in_mvd_allowlist: bool,
    /// Confidence score for this candidate
    pub confidence: f64,
    /// The candidate's priority class
    pub priority: PriorityClass,
}

/// One rule's verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Allow,
    Suppress(String),
}

/// A delivery rule: one check, fixed override policy
pub trait SuppressionRule {
    fn name(&self) -> &'static str;
    /// Whether any priority class may bypass this rule
    fn can_be_overridden(&self) -> bool;
    /// Priority classes allowed to override, when overridable
    fn overridable_by(&self) -> &'static [PriorityClass];
    fn check(&self, ctx: &SuppressionContext, config: &SuppressionConfig) -> RuleOutcome;
}

/// Final decision for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionDecision {
    pub should_deliver: bool,
    pub suppressed_by: Option<String>,
    pub reason: Option<String>,
    /// Rule names in the order they were evaluated
    pub rules_checked: Vec<String>,
    pub was_overridden: bool,
    /// Rules this candidate was allowed to bypass
    pub overridden_rules: Vec<String>,
}

struct DailyCapRule;
impl SuppressionRule for DailyCapRule {
    fn name(&self) -> &'static str {
        "daily_cap"
    }
    fn can_be_overridden(&self) -> bool {
        true
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[PriorityClass::Critical]
    }
    fn check(&self, ctx: &SuppressionContext, config: &SuppressionConfig) -> RuleOutcome {
        if ctx.delivered_today >= config.daily_cap {
            RuleOutcome::Suppress(format!(
                "daily cap of {} nudges reached",
                config.daily_cap
            ))
        } else {
            RuleOutcome::Allow
        }
    }
}

struct QuietHoursRule;
impl SuppressionRule for QuietHoursRule {
    fn name(&self) -> &'static str {
        "quiet_hours"
    }
    // Sleep protection is non-negotiable
    fn can_be_overridden(&self) -> bool {
        false
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[]
    }
    fn check(&self, ctx: &SuppressionContext, _config: &SuppressionConfig) -> RuleOutcome {
        if ctx.quiet_hours.contains(ctx.local_hour) {
            RuleOutcome::Suppress("inside quiet hours".to_owned())
        } else {
            RuleOutcome::Allow
        }
    }
}

struct CooldownRule;
impl SuppressionRule for CooldownRule {
    fn name(&self) -> &'static str {
        "cooldown"
    }
    fn can_be_overridden(&self) -> bool {
        true
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[PriorityClass::Critical, PriorityClass::Adaptive]
    }
    fn check(&self, ctx: &SuppressionContext, config: &SuppressionConfig) -> RuleOutcome {
        let Some(last) = ctx.last_delivery_at else {
            return RuleOutcome::Allow;
        };
        let minutes = (ctx.now - last).num_minutes();
        if minutes < config.cooldown_minutes {
            RuleOutcome::Suppress(format!(
                "last delivery {minutes} minutes ago, cooldown is {}",
                config.cooldown_minutes
            ))
        } else {
            RuleOutcome::Allow
        }
    }
}

struct FatigueRule;
impl SuppressionRule for FatigueRule {
    fn name(&self) -> &'static str {
        "fatigue"
    }
    // User fatigue is non-negotiable
    fn can_be_overridden(&self) -> bool {
        false
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[]
    }
    fn check(&self, ctx: &SuppressionContext, config: &SuppressionConfig) -> RuleOutcome {
        if ctx.dismissed_today >= config.fatigue_dismissals {
            RuleOutcome::Suppress(format!(
                "{} dismissals today indicates nudge fatigue",
                ctx.dismissed_today
            ))
        } else {
            RuleOutcome::Allow
        }
    }
}

struct MeetingAwarenessRule;
impl SuppressionRule for MeetingAwarenessRule {
    fn name(&self) -> &'static str {
        "meeting_awareness"
    }
    fn can_be_overridden(&self) -> bool {
        true
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[PriorityClass::Critical]
    }
    fn check(&self, ctx: &SuppressionContext, config: &SuppressionConfig) -> RuleOutcome {
        match ctx.meeting_hours_today {
            Some(hours) if hours >= config.meeting_heavy_hours => RuleOutcome::Suppress(
                format!("{hours:.1} meeting hours today, day is overloaded"),
            ),
            _ => RuleOutcome::Allow,
        }
    }
}

struct LowRecoveryWindowRule;
impl SuppressionRule for LowRecoveryWindowRule {
    fn name(&self) -> &'static str {
        "low_recovery_window"
    }
    fn can_be_overridden(&self) -> bool {
        true
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[PriorityClass::Critical, PriorityClass::Adaptive]
    }
    fn check(&self, ctx: &SuppressionContext, config: &SuppressionConfig) -> RuleOutcome {
        match ctx.recovery_score {
            Some(score)
                if score < config.low_recovery_threshold && !ctx.candidate_recovery_oriented =>
            {
                RuleOutcome::Suppress(format!(
                    "recovery {score:.0} is low; holding non-recovery nudges"
                ))
            }
            _ => RuleOutcome::Allow,
        }
    }
}

struct StreakRespectRule;
impl SuppressionRule for StreakRespectRule {
    fn name(&self) -> &'static str {
        "streak_respect"
    }
    // Habit protection is non-negotiable
    fn can_be_overridden(&self) -> bool {
        false
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[]
    }
    fn check(&self, ctx: &SuppressionContext, config: &SuppressionConfig) -> RuleOutcome {
        if ctx.candidate_conflicts_with_streak && ctx.streak_days >= config.streak_min_days {
            RuleOutcome::Suppress(format!(
                "candidate would interrupt a {}-day streak",
                ctx.streak_days
            ))
        } else {
            RuleOutcome::Allow
        }
    }
}

struct LowConfidenceFloorRule;
impl SuppressionRule for LowConfidenceFloorRule {
    fn name(&self) -> &'static str {
        "low_confidence_floor"
    }
    fn can_be_overridden(&self) -> bool {
        true
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[PriorityClass::Critical]
    }
    fn check(&self, ctx: &SuppressionContext, config: &SuppressionConfig) -> RuleOutcome {
        if ctx.confidence < config.confidence_floor {
            RuleOutcome::Suppress(format!(
                "confidence {:.2} below floor {:.2}",
                ctx.confidence, config.confidence_floor
            ))
        } else {
            RuleOutcome::Allow
        }
    }
}

struct MvdMembershipRule;
impl SuppressionRule for MvdMembershipRule {
    fn name(&self) -> &'static str {
        "mvd_membership"
    }
    fn can_be_overridden(&self) -> bool {
        true
    }
    fn overridable_by(&self) -> &'static [PriorityClass] {
        &[PriorityClass::Critical]
    }
    fn check(&self, ctx: &SuppressionContext, _config: &SuppressionConfig) -> RuleOutcome {
        if ctx.mvd_active && !ctx.candidate_in_mvd_allowlist {
            RuleOutcome::Suppress("candidate is outside the active MVD protocol set".to_owned())
        } else {
            RuleOutcome::Allow
        }
    }
}

/// The suppression engine: fixed rule order, override-aware walk
pub struct SuppressionEngine {
    config: SuppressionConfig,
    rules: Vec<Box<dyn SuppressionRule + Send + Sync>>,
}

impl Default for SuppressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SuppressionEngine {
    pub fn new() -> Self {
        Self::with_config(SuppressionConfig::default())
    }

    pub fn with_config(config: SuppressionConfig) -> Self {
        // Order is load-bearing: override semantics depend on it
        let rules: Vec<Box<dyn SuppressionRule + Send + Sync>> = vec![
            Box::new(DailyCapRule),
            Box::new(QuietHoursRule),
            Box::new(CooldownRule),
            Box::new(FatigueRule),
            Box::new(MeetingAwarenessRule),
            Box::new(LowRecoveryWindowRule),
            Box::new(StreakRespectRule),
            Box::new(LowConfidenceFloorRule),
            Box::new(MvdMembershipRule),
        ];
        Self { config, rules }
    }

    /// Rule names in evaluation order
    pub fn rule_order(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Evaluate the context against every rule in order.
    ///
    /// First non-overridable suppression wins; otherwise evaluation continues,
    /// accumulating overrides, until every rule has passed.
    pub fn evaluate(&self, ctx: &SuppressionContext) -> SuppressionDecision {
        let mut rules_checked = Vec::with_capacity(self.rules.len());
        let mut overridden_rules = Vec::new();

        for rule in &self.rules {
            rules_checked.push(rule.name().to_owned());
            let RuleOutcome::Suppress(reason) = rule.check(ctx, &self.config) else {
                continue;
            };

            let eligible =
                rule.can_be_overridden() && rule.overridable_by().contains(&ctx.priority);
            if eligible {
                overridden_rules.push(rule.name().to_owned());
                continue;
            }

            return SuppressionDecision {
                should_deliver: false,
                suppressed_by: Some(rule.name().to_owned()),
                reason: Some(reason),
                rules_checked,
                was_overridden: !overridden_rules.is_empty(),
                overridden_rules,
            };
        }

        SuppressionDecision {
            should_deliver: true,
            suppressed_by: None,
            reason: None,
            rules_checked,
            was_overridden: !overridden_rules.is_empty(),
            overridden_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()
    }

    fn clean_context() -> SuppressionContext {
        SuppressionContext {
            delivered_today: 1,
            dismissed_today: 0,
            last_delivery_at: Some(t0() - chrono::Duration::hours(3)),
            now: t0(),
            local_hour: 14,
            quiet_hours: QuietHours { start: 22, end: 7 },
            meeting_hours_today: Some(2.0),
            streak_days: 10,
            candidate_conflicts_with_streak: false,
            recovery_score: Some(60.0),
            candidate_recovery_oriented: false,
            mvd_active: false,
            candidate_in_mvd_allowlist: false,
            confidence: 0.7,
            priority: PriorityClass::Standard,
        }
    }

    #[test]
    fn test_rule_order_is_fixed() {
        let engine = SuppressionEngine::new();
        assert_eq!(
            engine.rule_order(),
            vec![
                "daily_cap",
                "quiet_hours",
                "cooldown",
                "fatigue",
                "meeting_awareness",
                "low_recovery_window",
                "streak_respect",
                "low_confidence_floor",
                "mvd_membership",
            ]
        );
    }

    #[test]
    fn test_clean_context_delivers() {
        let engine = SuppressionEngine::new();
        let decision = engine.evaluate(&clean_context());
        assert!(decision.should_deliver);
        assert!(!decision.was_overridden);
        assert_eq!(decision.rules_checked.len(), 9);
    }

    #[test]
    fn test_daily_cap_suppresses_standard() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.delivered_today = 5;

        let decision = engine.evaluate(&ctx);
        assert!(!decision.should_deliver);
        assert_eq!(decision.suppressed_by.as_deref(), Some("daily_cap"));
        // Evaluation stopped at the first non-overridable-for-this-class suppression
        assert_eq!(decision.rules_checked, vec!["daily_cap"]);
    }

    #[test]
    fn test_daily_cap_overridden_by_critical() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.delivered_today = 5;
        ctx.priority = PriorityClass::Critical;

        let decision = engine.evaluate(&ctx);
        assert!(decision.should_deliver);
        assert!(decision.was_overridden);
        assert_eq!(decision.overridden_rules, vec!["daily_cap"]);
    }

    #[test]
    fn test_fatigue_suppresses_even_critical() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.dismissed_today = 3;
        ctx.priority = PriorityClass::Critical;

        let decision = engine.evaluate(&ctx);
        assert!(!decision.should_deliver);
        assert_eq!(decision.suppressed_by.as_deref(), Some("fatigue"));
    }

    #[test]
    fn test_quiet_hours_never_overridable() {
        let engine = SuppressionEngine::new();
        for priority in [
            PriorityClass::Critical,
            PriorityClass::Adaptive,
            PriorityClass::Standard,
        ] {
            let mut ctx = clean_context();
            ctx.local_hour = 23;
            ctx.priority = priority;
            let decision = engine.evaluate(&ctx);
            assert!(!decision.should_deliver);
            assert_eq!(decision.suppressed_by.as_deref(), Some("quiet_hours"));
        }
    }

    #[test]
    fn test_quiet_hours_wrap_midnight() {
        let window = QuietHours { start: 22, end: 7 };
        assert!(window.contains(23));
        assert!(window.contains(2));
        assert!(!window.contains(8));
        assert!(!window.contains(21));

        let daytime = QuietHours { start: 13, end: 15 };
        assert!(daytime.contains(13));
        assert!(!daytime.contains(15));
    }

    #[test]
    fn test_streak_respect_non_overridable() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.candidate_conflicts_with_streak = true;
        ctx.streak_days = 5;
        ctx.priority = PriorityClass::Critical;

        let decision = engine.evaluate(&ctx);
        assert!(!decision.should_deliver);
        assert_eq!(decision.suppressed_by.as_deref(), Some("streak_respect"));

        // Short streaks are not protected
        ctx.streak_days = 1;
        assert!(engine.evaluate(&ctx).should_deliver);
    }

    #[test]
    fn test_cooldown_adaptive_override() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.last_delivery_at = Some(t0() - chrono::Duration::minutes(30));
        ctx.priority = PriorityClass::Adaptive;

        let decision = engine.evaluate(&ctx);
        assert!(decision.should_deliver);
        assert_eq!(decision.overridden_rules, vec!["cooldown"]);

        ctx.priority = PriorityClass::Standard;
        let decision = engine.evaluate(&ctx);
        assert!(!decision.should_deliver);
        assert_eq!(decision.suppressed_by.as_deref(), Some("cooldown"));
    }

    #[test]
    fn test_low_recovery_window_spares_recovery_nudges() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.recovery_score = Some(20.0);

        let decision = engine.evaluate(&ctx);
        assert!(!decision.should_deliver);
        assert_eq!(decision.suppressed_by.as_deref(), Some("low_recovery_window"));

        ctx.candidate_recovery_oriented = true;
        assert!(engine.evaluate(&ctx).should_deliver);
    }

    #[test]
    fn test_low_confidence_floor() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.confidence = 0.3;

        let decision = engine.evaluate(&ctx);
        assert!(!decision.should_deliver);
        assert_eq!(decision.suppressed_by.as_deref(), Some("low_confidence_floor"));

        ctx.priority = PriorityClass::Critical;
        let decision = engine.evaluate(&ctx);
        assert!(decision.should_deliver);
        assert_eq!(decision.overridden_rules, vec!["low_confidence_floor"]);
    }

    #[test]
    fn test_mvd_membership_gate() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.mvd_active = true;
        ctx.candidate_in_mvd_allowlist = false;

        let decision = engine.evaluate(&ctx);
        assert!(!decision.should_deliver);
        assert_eq!(decision.suppressed_by.as_deref(), Some("mvd_membership"));

        ctx.candidate_in_mvd_allowlist = true;
        assert!(engine.evaluate(&ctx).should_deliver);
    }

    #[test]
    fn test_multiple_overrides_accumulate() {
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.delivered_today = 5;
        ctx.last_delivery_at = Some(t0() - chrono::Duration::minutes(10));
        ctx.priority = PriorityClass::Critical;

        let decision = engine.evaluate(&ctx);
        assert!(decision.should_deliver);
        assert!(decision.was_overridden);
        assert_eq!(decision.overridden_rules, vec!["daily_cap", "cooldown"]);
        assert_eq!(decision.rules_checked.len(), 9);
    }

    #[test]
    fn test_override_then_hard_stop() {
        // Overrides already granted do not rescue a later non-overridable rule
        let engine = SuppressionEngine::new();
        let mut ctx = clean_context();
        ctx.delivered_today = 5;
        ctx.dismissed_today = 4;
        ctx.priority = PriorityClass::Critical;

        let decision = engine.evaluate(&ctx);
        assert!(!decision.should_deliver);
        assert_eq!(decision.suppressed_by.as_deref(), Some("fatigue"));
        assert!(decision.was_overridden);
        assert_eq!(decision.overridden_rules, vec!["daily_cap"]);
    }
}
