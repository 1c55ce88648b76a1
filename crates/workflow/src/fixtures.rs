//! Route fixtures shared by gateway and server tests.

use procura_core::{Assignment, RouteStep, RouteTemplate};

/// Standard three-step purchase route: requester, manager review,
/// procurement head.
pub fn purchase_route() -> RouteTemplate {
    RouteTemplate {
        route_id: 1,
        route_name: "Purchase Request".to_string(),
        steps: vec![
            RouteStep {
                sequence: 1,
                step_name: "Requester".to_string(),
                assignments: vec![assignment("u100", "Arthit S.")],
            },
            RouteStep {
                sequence: 2,
                step_name: "Manager Review".to_string(),
                assignments: vec![assignment("u200", "Benjamas K."), assignment("u201", "Chai W.")],
            },
            RouteStep {
                sequence: 3,
                step_name: "Procurement Head".to_string(),
                assignments: vec![assignment("u300", "Duangjai P.")],
            },
        ],
    }
}

/// Route with a single requester step; submitting fully approves.
pub fn single_step_route(route_id: i64) -> RouteTemplate {
    RouteTemplate {
        route_id,
        route_name: "Self Service".to_string(),
        steps: vec![RouteStep {
            sequence: 1,
            step_name: "Requester".to_string(),
            assignments: vec![assignment("u100", "Arthit S.")],
        }],
    }
}

fn assignment(actor_id: &str, display_name: &str) -> Assignment {
    Assignment { actor_id: actor_id.to_string(), display_name: display_name.to_string() }
}
