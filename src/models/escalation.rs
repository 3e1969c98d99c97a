use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PunishmentAction {
    Mute,
    Kick,
    Ban,
}

impl std::fmt::Display for PunishmentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PunishmentAction::Mute => write!(f, "mute"),
            PunishmentAction::Kick => write!(f, "kick"),
            PunishmentAction::Ban => write!(f, "ban"),
        }
    }
}

/// What happens when an accumulated-severity threshold is crossed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub action: PunishmentAction,
    /// Only meaningful for mutes; kicks and bans are untimed
    #[serde(default)]
    pub duration_seconds: u64,
}

/// Ordered threshold table: accumulated severity -> rule.
///
/// The BTreeMap keeps thresholds sorted; selection walks them from highest to
/// lowest and takes the first one the total meets or exceeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscalationRules(pub BTreeMap<u32, EscalationRule>);

impl EscalationRules {
    /// The built-in table used when a guild has configured nothing
    pub fn builtin() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            3,
            EscalationRule {
                action: PunishmentAction::Mute,
                duration_seconds: 3600,
            },
        );
        rules.insert(
            5,
            EscalationRule {
                action: PunishmentAction::Mute,
                duration_seconds: 86400,
            },
        );
        rules.insert(
            7,
            EscalationRule {
                action: PunishmentAction::Kick,
                duration_seconds: 0,
            },
        );
        rules.insert(
            10,
            EscalationRule {
                action: PunishmentAction::Ban,
                duration_seconds: 0,
            },
        );
        Self(rules)
    }

    /// Highest threshold the total meets or exceeds, if any. The boundary is
    /// inclusive: a total exactly at a threshold triggers that rule.
    pub fn select(&self, total_severity: u32) -> Option<(u32, EscalationRule)> {
        self.0
            .iter()
            .rev()
            .find(|(threshold, _)| total_severity >= **threshold)
            .map(|(threshold, rule)| (*threshold, *rule))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for EscalationRules {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_picks_highest_qualifying_threshold() {
        let rules = EscalationRules::builtin();

        assert_eq!(rules.select(2), None);

        let (threshold, rule) = rules.select(3).unwrap();
        assert_eq!(threshold, 3);
        assert_eq!(rule.action, PunishmentAction::Mute);
        assert_eq!(rule.duration_seconds, 3600);

        let (threshold, rule) = rules.select(5).unwrap();
        assert_eq!(threshold, 5);
        assert_eq!(rule.duration_seconds, 86400);

        // Between thresholds the lower one still applies
        let (threshold, _) = rules.select(6).unwrap();
        assert_eq!(threshold, 5);

        let (_, rule) = rules.select(7).unwrap();
        assert_eq!(rule.action, PunishmentAction::Kick);

        let (_, rule) = rules.select(25).unwrap();
        assert_eq!(rule.action, PunishmentAction::Ban);
    }

    #[test]
    fn empty_table_selects_nothing() {
        let rules = EscalationRules(BTreeMap::new());
        assert_eq!(rules.select(100), None);
    }

    #[test]
    fn rules_round_trip_with_string_keys() {
        // JSON object keys are strings; the integer-keyed map must survive
        let rules = EscalationRules::builtin();
        let json = serde_json::to_string(&rules).unwrap();
        let back: EscalationRules = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);
    }
}
