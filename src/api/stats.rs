use rocket::State;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, User};
use crate::db::stats::{UserStats, global_stats, stats_for};
use crate::response::{ApiResult, ok};

pub fn routes() -> Vec<rocket::Route> {
    routes![dashboard]
}

/// Admins see platform-wide counts, everyone else their own dashboard.
#[get("/stats")]
pub async fn dashboard(user: User, db: &State<Pool<Sqlite>>) -> ApiResult<UserStats> {
    if user.has_permission(Permission::ViewGlobalStats) {
        return ok(UserStats::Global(global_stats(db).await?));
    }
    ok(stats_for(db, user.id, user.role).await?)
}
