//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{Group, MemberInfo, Membership, Task};
use crate::mood::MAX_SPREAD;

/// Validate that a group's state is internally consistent
pub fn assert_group_invariants(group: &Group) {
    debug_assert!(
        !group.name.trim().is_empty(),
        "Group {} has empty name",
        group.id
    );

    debug_assert!(
        group.creature_mood <= 100,
        "Group {} has creature mood {} outside 0..=100",
        group.id,
        group.creature_mood
    );
}

/// Validate that a membership is valid
pub fn assert_membership_invariants(membership: &Membership) {
    debug_assert!(
        membership.user_id != Uuid::nil(),
        "Membership {} has nil user_id",
        membership.id
    );

    debug_assert!(
        membership.group_id != Uuid::nil(),
        "Membership {} has nil group_id",
        membership.id
    );
}

/// Validate that a member list has no duplicates and includes the creator
pub fn assert_member_list_invariants(members: &[MemberInfo], group: &Group) {
    let mut ids: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
    ids.sort();
    ids.dedup();
    debug_assert!(
        ids.len() == members.len(),
        "Group {} lists a member more than once",
        group.id
    );
}

/// Completion fields must move together
pub fn assert_task_invariants(task: &Task) {
    debug_assert!(
        task.completed == task.completed_at.is_some(),
        "Task {} completed={} but completed_at={:?}",
        task.id,
        task.completed,
        task.completed_at
    );

    debug_assert!(
        task.completed || task.photo_url.is_none(),
        "Task {} has a proof photo but is not completed",
        task.id
    );
}

/// Counters may never drift more than the spread apart
pub fn assert_mood_counters(decay_units: u64, boost_units: u64) {
    debug_assert!(
        decay_units <= boost_units.saturating_add(MAX_SPREAD),
        "Decay {} exceeds boost {} by more than {}",
        decay_units,
        boost_units,
        MAX_SPREAD
    );

    debug_assert!(
        boost_units <= decay_units.saturating_add(MAX_SPREAD),
        "Boost {} exceeds decay {} by more than {}",
        boost_units,
        decay_units,
        MAX_SPREAD
    );
}

/// Validate that a user ID is not nil
pub fn assert_user_id_valid(user_id: Uuid, context: &str) {
    debug_assert!(
        user_id != Uuid::nil(),
        "Nil user_id in context: {}",
        context
    );
}

/// Validate that a group ID is not nil
pub fn assert_group_id_valid(group_id: Uuid, context: &str) {
    debug_assert!(
        group_id != Uuid::nil(),
        "Nil group_id in context: {}",
        context
    );
}
