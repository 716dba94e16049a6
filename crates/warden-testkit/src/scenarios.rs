//! Resolution scenarios with known outcomes.
//!
//! Each scenario grants a few rules on a fresh [`StandardFixture`] and
//! checks one request. The table is plain JSON so other bindings of the
//! engine can run the same cases.

use serde::{Deserialize, Serialize};
use warden_perms::{Effect, PermsError};

use crate::fixtures::StandardFixture;

/// A rule described by names rather than ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSpec {
    pub effect: Effect,
    pub subject: String,
    pub target: String,
    pub operation: String,
    #[serde(default)]
    pub level: Option<i32>,
}

/// The request a scenario checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub principal: String,
    pub entity: String,
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    pub grants: Vec<GrantSpec>,
    pub check: Check,
    pub expected: bool,
}

const SCENARIOS: &str = r#"[
  {
    "name": "no_rules",
    "description": "Nothing matches, so the default is deny",
    "grants": [],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": false
  },
  {
    "name": "ancestor_group_on_everything",
    "description": "A rule on a grandparent group reaches its members",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": true
  },
  {
    "name": "parent_operation_governs_child",
    "description": "A rule on /Account applies to /Account/Edit",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "everything", "operation": "/Account" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": true
  },
  {
    "name": "child_operation_overrides_parent",
    "description": "A deny on /Account/Edit beats an allow on /Account",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "everything", "operation": "/Account" },
      { "effect": "Deny", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": false
  },
  {
    "name": "sibling_operation_unaffected",
    "description": "A deny on /Account/Edit leaves /Account/Delete allowed",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "everything", "operation": "/Account" },
      { "effect": "Deny", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Delete" },
    "expected": true
  },
  {
    "name": "principal_beats_group",
    "description": "A direct principal rule beats a group rule on the exact entity",
    "grants": [
      { "effect": "Deny", "subject": "group:DBA", "target": "entity:account/1", "operation": "/Account/Edit" },
      { "effect": "Allow", "subject": "principal:Ayende", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": true
  },
  {
    "name": "entity_beats_entity_group",
    "description": "A rule on the entity beats one on its entity group",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "group:Important Accounts", "operation": "/Account/Edit" },
      { "effect": "Deny", "subject": "group:Administrators", "target": "entity:account/1", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": false
  },
  {
    "name": "entity_group_beats_everything",
    "description": "A rule on the entity group beats one on everything",
    "grants": [
      { "effect": "Deny", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" },
      { "effect": "Allow", "subject": "group:Administrators", "target": "group:Important Accounts", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": true
  },
  {
    "name": "nearer_group_allows",
    "description": "DBA is nearer to Ayende than Administrators",
    "grants": [
      { "effect": "Deny", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" },
      { "effect": "Allow", "subject": "group:DBA", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": true
  },
  {
    "name": "nearer_group_denies",
    "description": "DBA is nearer to Ayende than Administrators",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" },
      { "effect": "Deny", "subject": "group:DBA", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": false
  },
  {
    "name": "deny_wins_on_same_attachment",
    "description": "Allow and deny on the same subject and target deny",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit", "level": 10 },
      { "effect": "Deny", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": false
  },
  {
    "name": "higher_level_breaks_tie",
    "description": "DBA and Auditors tie on specificity; the higher level wins",
    "grants": [
      { "effect": "Allow", "subject": "group:DBA", "target": "everything", "operation": "/Account/Edit", "level": 5 },
      { "effect": "Deny", "subject": "group:Auditors", "target": "everything", "operation": "/Account/Edit", "level": 1 }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": true
  },
  {
    "name": "equal_level_tie_denies",
    "description": "DBA and Auditors tie on specificity and level; deny wins",
    "grants": [
      { "effect": "Allow", "subject": "group:DBA", "target": "everything", "operation": "/Account/Edit" },
      { "effect": "Deny", "subject": "group:Auditors", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": false
  },
  {
    "name": "entity_group_rule_skips_other_entities",
    "description": "A deny on Important Accounts does not reach account/2",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" },
      { "effect": "Deny", "subject": "group:Administrators", "target": "group:Important Accounts", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Ayende", "entity": "account/2", "operation": "/Account/Edit" },
    "expected": true
  },
  {
    "name": "ungrouped_principal",
    "description": "Group rules do not reach a principal outside the group",
    "grants": [
      { "effect": "Allow", "subject": "group:Administrators", "target": "everything", "operation": "/Account/Edit" }
    ],
    "check": { "principal": "Oren", "entity": "account/1", "operation": "/Account/Edit" },
    "expected": false
  },
  {
    "name": "unknown_leaf_uses_existing_prefix",
    "description": "/Account/Close does not exist, so /Account decides",
    "grants": [
      { "effect": "Allow", "subject": "principal:Oren", "target": "everything", "operation": "/Account" }
    ],
    "check": { "principal": "Oren", "entity": "account/2", "operation": "/Account/Close" },
    "expected": true
  }
]"#;

/// Every built-in scenario.
pub fn all_scenarios() -> Vec<Scenario> {
    serde_json::from_str(SCENARIOS).expect("built-in scenarios are valid JSON")
}

/// Run one scenario on a fresh fixture and return the check's outcome.
pub fn run_scenario(scenario: &Scenario) -> Result<bool, PermsError> {
    let mut fixture = StandardFixture::new();
    for grant in &scenario.grants {
        fixture.grant(grant)?;
    }

    let check = &scenario.check;
    let principal = fixture
        .principal(&check.principal)
        .ok_or_else(|| PermsError::InvalidRecord(format!("unknown principal: {}", check.principal)))?;
    let entity = fixture
        .entity(&check.entity)
        .ok_or_else(|| PermsError::InvalidRecord(format!("unknown entity: {}", check.entity)))?;
    fixture.auth.is_allowed(principal, entity, &check.operation)
}

/// Run every scenario. Returns `(name, passed, actual)` per scenario.
pub fn verify_all_scenarios() -> Vec<(String, bool, Option<bool>)> {
    all_scenarios()
        .iter()
        .map(|s| {
            let actual = run_scenario(s).ok();
            (s.name.clone(), actual == Some(s.expected), actual)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        for (name, passed, actual) in verify_all_scenarios() {
            assert!(passed, "scenario {name} failed: got {actual:?}");
        }
    }

    #[test]
    fn test_scenario_names_unique() {
        let scenarios = all_scenarios();
        let mut names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn test_scenarios_serialize_back() {
        let scenarios = all_scenarios();
        let json = serde_json::to_string(&scenarios).unwrap();
        let parsed: Vec<Scenario> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, scenarios);
    }
}
