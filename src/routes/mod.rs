use surrealdb::sql::Thing;

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::utils::string_utils::get_str_thing;

pub mod earnings_routes;
pub mod job_routes;
pub mod task_routes;
pub mod withdraw_routes;

/// Path idents come either as a full record id (`job:abc`) or as the bare key.
pub(crate) fn parse_ident(ident: &str, table: &str) -> AppResult<Thing> {
    let thing = match ident.contains(':') {
        true => get_str_thing(ident)?,
        false => Thing::from((table, ident)),
    };
    if thing.tb != table {
        return Err(AppError::Generic {
            description: format!("Expected {table} id, got {ident}"),
        });
    }
    Ok(thing)
}
