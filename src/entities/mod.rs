use surrealdb::sql::Thing;

pub mod job_entity;
pub mod reward_code_entity;
pub mod task_entity;
pub mod withdrawal_entity;

/// Users are managed by the external auth system; we only link to their ids.
pub const USER_TABLE: &str = "local_user";

pub fn user_ident(user_id: &str) -> Thing {
    Thing::from((USER_TABLE, user_id))
}
