use rocket::State;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::policy::{coach_linked_to_client, require, require_visible};
use crate::auth::{Access, Permission, Resource, Role, User};
use crate::db::notifications::notify;
use crate::db::programs::{
    ProgramFilter, assign_program, create_program, delete_program, get_program, list_programs,
    update_program,
};
use crate::db::users::get_active_user_with_role;
use crate::error::AppError;
use crate::models::{
    Difficulty, NewNotification, NewProgram, NotificationType, Program, ProgramChanges,
    ProgramStatus, ProgramType,
};
use crate::response::{ApiResult, PageRequest, created, message_only, ok, ok_with_message, paginated};
use crate::validation::{JsonBody, JsonValidateExt, non_blank, parse_optional_date};

pub fn routes() -> Vec<rocket::Route> {
    routes![list, show, create, update, remove, assign]
}

#[derive(FromForm)]
pub struct ProgramsQuery {
    page: Option<i64>,
    limit: Option<i64>,
    status: Option<String>,
    client_id: Option<i64>,
}

#[derive(Deserialize, Validate)]
pub struct CreateProgramRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    /// Required when an admin creates a program on a coach's behalf.
    pub coach_id: Option<i64>,
    pub client_id: Option<i64>,
    pub program_type: Option<ProgramType>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 104, message = "must be between 1 and 104"))]
    pub duration_weeks: Option<i64>,
    #[validate(range(min = 1, max = 14, message = "must be between 1 and 14"))]
    pub sessions_per_week: Option<i64>,
    pub status: Option<ProgramStatus>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateProgramRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub program_type: Option<ProgramType>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 104, message = "must be between 1 and 104"))]
    pub duration_weeks: Option<i64>,
    #[validate(range(min = 1, max = 14, message = "must be between 1 and 14"))]
    pub sessions_per_week: Option<i64>,
    pub status: Option<ProgramStatus>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct AssignProgramRequest {
    pub client_id: i64,
}

/// The client must be active and, for coaches, already linked to them.
async fn check_assignable(db: &Pool<Sqlite>, coach_id: i64, client_id: i64) -> Result<(), AppError> {
    if get_active_user_with_role(db, client_id, Role::Client)
        .await?
        .is_none()
    {
        return Err(AppError::Validation(
            "client_id: must reference an active client".to_string(),
        ));
    }
    if !coach_linked_to_client(db, coach_id, client_id).await? {
        return Err(AppError::Authorization(
            "This client is not assigned to the coach".to_string(),
        ));
    }
    Ok(())
}

fn check_date_order(
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
) -> Result<(), AppError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(AppError::Validation(
            "end_date: must not be before start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

fn assignment_notice(program: &Program, client_id: i64) -> NewNotification {
    NewNotification {
        user_id: client_id,
        title: "New program assigned".to_string(),
        body: format!("You have been assigned the program \"{}\"", program.name),
        notification_type: NotificationType::Program,
        reference_id: Some(program.id),
        reference_type: Some("program"),
    }
}

async fn load_visible(db: &Pool<Sqlite>, user: &User, id: i64) -> Result<Program, AppError> {
    let program = get_program(db, id).await?;
    require_visible(db, user, Resource::from(&program), Access::Read, "Program").await?;
    Ok(program)
}

#[get("/?<q..>")]
pub async fn list(q: ProgramsQuery, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<Program>> {
    let page = PageRequest::new(q.page, q.limit);
    let filter = ProgramFilter {
        status: q.status.as_deref().map(str::parse).transpose()?,
        client_id: q.client_id,
    };

    let (programs, total) = list_programs(db, &user, &filter, &page).await?;
    paginated(programs, &page, total)
}

#[get("/<id>")]
pub async fn show(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<Program> {
    ok(load_visible(db, &user, id).await?)
}

#[post("/", data = "<body>")]
pub async fn create(
    body: JsonBody<'_, CreateProgramRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Program> {
    user.require_permission(Permission::ManagePrograms)?;
    let request = body.validated()?;

    let coach_id = match user.role {
        Role::Admin => {
            let coach_id = request.coach_id.ok_or_else(|| {
                AppError::Validation("coach_id: is required for admins".to_string())
            })?;
            if get_active_user_with_role(db, coach_id, Role::Coach).await?.is_none() {
                return Err(AppError::Validation(
                    "coach_id: must reference an active coach".to_string(),
                ));
            }
            coach_id
        }
        _ => user.id,
    };

    if let Some(client_id) = request.client_id {
        check_assignable(db, coach_id, client_id).await?;
    }

    let status = request.status.unwrap_or(ProgramStatus::Draft);
    if !matches!(status, ProgramStatus::Draft | ProgramStatus::Active) {
        return Err(AppError::Validation(
            "status: a new program must be draft or active".to_string(),
        ));
    }

    let start_date = parse_optional_date("start_date", request.start_date.as_deref())?;
    let end_date = parse_optional_date("end_date", request.end_date.as_deref())?;
    check_date_order(start_date, end_date)?;

    let id = create_program(
        db,
        &NewProgram {
            name: non_blank("name", &request.name)?,
            description: request.description,
            coach_id,
            client_id: request.client_id,
            program_type: request.program_type.unwrap_or(ProgramType::Mixed),
            difficulty: request.difficulty,
            duration_weeks: request.duration_weeks,
            sessions_per_week: request.sessions_per_week,
            status,
            start_date,
            end_date,
        },
    )
    .await?;

    let program = get_program(db, id).await?;
    if let Some(client_id) = program.client_id {
        notify(db, &assignment_notice(&program, client_id)).await?;
    }

    created(program, "Program created successfully")
}

#[put("/<id>", data = "<body>")]
pub async fn update(
    id: i64,
    body: JsonBody<'_, UpdateProgramRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Program> {
    let request = body.validated()?;
    let program = load_visible(db, &user, id).await?;
    require(db, &user, Resource::from(&program), Access::Write).await?;

    let status = request
        .status
        .map(|next| program.status.transition_to(next))
        .transpose()?;

    let start_date = parse_optional_date("start_date", request.start_date.as_deref())?;
    let end_date = parse_optional_date("end_date", request.end_date.as_deref())?;
    check_date_order(
        start_date.or(program.start_date),
        end_date.or(program.end_date),
    )?;

    let changes = ProgramChanges {
        name: request
            .name
            .as_deref()
            .map(|n| non_blank("name", n))
            .transpose()?,
        description: request.description,
        program_type: request.program_type,
        difficulty: request.difficulty,
        duration_weeks: request.duration_weeks,
        sessions_per_week: request.sessions_per_week,
        status,
        start_date,
        end_date,
    };
    update_program(db, program.id, &changes).await?;

    ok_with_message(get_program(db, program.id).await?, "Program updated successfully")
}

/// Deleting a program also deletes its workouts.
#[delete("/<id>")]
pub async fn remove(id: i64, user: User, db: &State<Pool<Sqlite>>) -> ApiResult<()> {
    let program = load_visible(db, &user, id).await?;
    require(db, &user, Resource::from(&program), Access::Write).await?;

    delete_program(db, program.id).await?;
    message_only("Program deleted successfully")
}

#[post("/<id>/assign", data = "<body>")]
pub async fn assign(
    id: i64,
    body: JsonBody<'_, AssignProgramRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Program> {
    let request = body.validated()?;
    let program = load_visible(db, &user, id).await?;
    require(db, &user, Resource::from(&program), Access::Write).await?;

    if program.status == ProgramStatus::Completed {
        return Err(AppError::Validation(
            "A completed program cannot be reassigned".to_string(),
        ));
    }
    check_assignable(db, program.coach_id, request.client_id).await?;

    assign_program(db, program.id, request.client_id).await?;
    let program = get_program(db, program.id).await?;
    notify(db, &assignment_notice(&program, request.client_id)).await?;

    ok_with_message(program, "Program assigned successfully")
}
