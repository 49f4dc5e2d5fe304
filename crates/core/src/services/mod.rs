//! Domain services over the storage traits
//!
//! Each service borrows a [`Storage`] implementation and enforces the
//! membership and ownership rules the raw stores do not know about.

mod groups;
mod nudges;
mod profiles;
mod tasks;

pub use groups::{GroupService, MAX_INVITE_ATTEMPTS};
pub use nudges::NudgeService;
pub use profiles::ProfileService;
pub use tasks::TaskService;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Membership;
use crate::storage::GroupRepository;

/// Fail unless `user_id` belongs to `group_id`
pub(crate) fn require_member<S: GroupRepository + ?Sized>(
    store: &S,
    user_id: Uuid,
    group_id: Uuid,
) -> Result<Membership> {
    store
        .get_membership(user_id, group_id)?
        .ok_or_else(|| Error::PermissionDenied("Not a member of this group".into()))
}
