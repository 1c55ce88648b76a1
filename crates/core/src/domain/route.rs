use serde::{Deserialize, Serialize};

/// One approver entry on a route step, as defined by the workflow template
/// service. `actor_id` is an opaque identity key compared case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub actor_id: String,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub sequence: u32,
    pub step_name: String,
    pub assignments: Vec<Assignment>,
}

/// An ordered approval route fetched from the workflow template service.
/// This is the authorization source of truth; the core only reads it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTemplate {
    pub route_id: i64,
    pub route_name: String,
    pub steps: Vec<RouteStep>,
}

impl RouteTemplate {
    /// Steps in ascending sequence order, regardless of upstream ordering.
    pub fn ordered_steps(&self) -> Vec<&RouteStep> {
        let mut steps: Vec<&RouteStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.sequence);
        steps
    }

    pub fn step(&self, sequence: u32) -> Option<&RouteStep> {
        self.steps.iter().find(|s| s.sequence == sequence)
    }

    /// Whether `actor_id` may act at the given step. Unknown steps are never
    /// authorized.
    pub fn is_assigned(&self, sequence: u32, actor_id: &str) -> bool {
        self.step(sequence)
            .map(|step| {
                step.assignments.iter().any(|a| a.actor_id.eq_ignore_ascii_case(actor_id))
            })
            .unwrap_or(false)
    }

    /// First display name recorded for `actor_id` anywhere on the route. The
    /// template is the only directory this system consults for names.
    pub fn display_name_of(&self, actor_id: &str) -> Option<&str> {
        self.steps
            .iter()
            .flat_map(|s| s.assignments.iter())
            .find(|a| a.actor_id.eq_ignore_ascii_case(actor_id))
            .map(|a| a.display_name.as_str())
    }

    /// Display name with fallback to the raw id; name resolution is never
    /// fatal to the action itself.
    pub fn display_name_or_id(&self, actor_id: &str) -> String {
        self.display_name_of(actor_id).unwrap_or(actor_id).to_string()
    }

    /// Whether `actor_id` may originate documents on this route. An empty
    /// assignment list on the first step means anyone may initiate.
    pub fn can_initiate(&self, actor_id: &str) -> bool {
        match self.ordered_steps().first() {
            Some(first) => {
                first.assignments.is_empty() || self.is_assigned(first.sequence, actor_id)
            }
            None => false,
        }
    }
}
