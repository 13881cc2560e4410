//! Row-level authorization.
//!
//! Every handler that touches a record owned by somebody else asks this
//! module, passing the acting user, the resource it resolved and whether it
//! wants to read or write. Admins pass every check. Coaches reach a client's
//! records only through a coach-client link (see [`coach_linked_to_client`]).
//! Clients reach only their own rows.

use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use super::{Role, User};
use crate::error::AppError;
use crate::models::{Appointment, Message, Program, Workout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Records keyed only by the client they belong to: meals, goals,
    /// nutrition summaries, statistics.
    ClientRecords { client_id: i64 },
    UserAccount { user_id: i64, role: Role },
    Program { coach_id: i64, client_id: Option<i64> },
    Workout {
        client_id: i64,
        created_by: i64,
        program_coach_id: Option<i64>,
    },
    Appointment { coach_id: i64, client_id: i64 },
    Message { sender_id: i64, recipient_id: i64 },
}

impl From<&Program> for Resource {
    fn from(p: &Program) -> Self {
        Resource::Program {
            coach_id: p.coach_id,
            client_id: p.client_id,
        }
    }
}

impl From<&Appointment> for Resource {
    fn from(a: &Appointment) -> Self {
        Resource::Appointment {
            coach_id: a.coach_id,
            client_id: a.client_id,
        }
    }
}

impl From<&Message> for Resource {
    fn from(m: &Message) -> Self {
        Resource::Message {
            sender_id: m.sender_id,
            recipient_id: m.recipient_id,
        }
    }
}

impl From<&Workout> for Resource {
    fn from(w: &Workout) -> Self {
        Resource::Workout {
            client_id: w.client_id,
            created_by: w.created_by,
            program_coach_id: w.program_coach_id,
        }
    }
}

/// A coach is linked to a client through a program, an appointment that was
/// not cancelled, or the client's explicit `coach_id` assignment.
#[instrument(skip(pool))]
pub async fn coach_linked_to_client(
    pool: &SqlitePool,
    coach_id: i64,
    client_id: i64,
) -> Result<bool, AppError> {
    let linked: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM programs WHERE coach_id = ?1 AND client_id = ?2
         UNION
         SELECT 1 FROM appointments
         WHERE coach_id = ?1 AND client_id = ?2 AND status != 'cancelled'
         UNION
         SELECT 1 FROM users WHERE id = ?2 AND coach_id = ?1
         LIMIT 1",
    )
    .bind(coach_id)
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(linked.is_some())
}

/// Messaging is stricter than record access: the pair must share an active
/// program or a live or past appointment. Admins may message and be messaged
/// by anyone.
#[instrument(skip(pool, sender, recipient), fields(sender_id = sender.id, recipient_id = recipient.id))]
pub async fn may_message(
    pool: &SqlitePool,
    sender: &User,
    recipient: &User,
) -> Result<bool, AppError> {
    let (coach_id, client_id) = match (sender.role, recipient.role) {
        (Role::Admin, _) | (_, Role::Admin) => return Ok(true),
        (Role::Coach, Role::Client) => (sender.id, recipient.id),
        (Role::Client, Role::Coach) => (recipient.id, sender.id),
        _ => return Ok(false),
    };

    let related: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM programs
         WHERE coach_id = ?1 AND client_id = ?2 AND status = 'active'
         UNION
         SELECT 1 FROM appointments
         WHERE coach_id = ?1 AND client_id = ?2
           AND status IN ('scheduled', 'confirmed', 'completed')
         LIMIT 1",
    )
    .bind(coach_id)
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(related.is_some())
}

async fn reaches_client(pool: &SqlitePool, actor: &User, client_id: i64) -> Result<bool, AppError> {
    match actor.role {
        Role::Admin => Ok(true),
        Role::Client => Ok(actor.id == client_id),
        Role::Coach => coach_linked_to_client(pool, actor.id, client_id).await,
    }
}

#[instrument(skip(pool, actor), fields(actor_id = actor.id, role = %actor.role))]
pub async fn is_allowed(
    pool: &SqlitePool,
    actor: &User,
    resource: Resource,
    access: Access,
) -> Result<bool, AppError> {
    if actor.role == Role::Admin {
        return Ok(true);
    }

    let allowed = match resource {
        Resource::ClientRecords { client_id } => reaches_client(pool, actor, client_id).await?,

        Resource::UserAccount { user_id, role } => {
            if actor.id == user_id {
                true
            } else {
                match (actor.role, role) {
                    (Role::Coach, Role::Client) => {
                        coach_linked_to_client(pool, actor.id, user_id).await?
                    }
                    // A client may look up the coaches it works with.
                    (Role::Client, Role::Coach) if access == Access::Read => {
                        coach_linked_to_client(pool, user_id, actor.id).await?
                    }
                    _ => false,
                }
            }
        }

        Resource::Program {
            coach_id,
            client_id,
        } => match (actor.role, access) {
            (Role::Coach, _) => coach_id == actor.id,
            (Role::Client, Access::Read) => client_id == Some(actor.id),
            _ => false,
        },

        Resource::Workout {
            client_id,
            created_by,
            program_coach_id,
        } => match actor.role {
            Role::Client => client_id == actor.id,
            _ => {
                created_by == actor.id
                    || program_coach_id == Some(actor.id)
                    || coach_linked_to_client(pool, actor.id, client_id).await?
            }
        },

        Resource::Appointment {
            coach_id,
            client_id,
        } => actor.id == coach_id || actor.id == client_id,

        Resource::Message {
            sender_id,
            recipient_id,
        } => match access {
            Access::Read => actor.id == sender_id || actor.id == recipient_id,
            Access::Write => actor.id == sender_id,
        },
    };

    if !allowed {
        info!(?resource, ?access, "Access denied by policy");
    }
    Ok(allowed)
}

/// For lookups by id: a record the actor may not see answers exactly like a
/// missing one.
pub async fn require_visible(
    pool: &SqlitePool,
    actor: &User,
    resource: Resource,
    access: Access,
    what: &str,
) -> Result<(), AppError> {
    if is_allowed(pool, actor, resource, access).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("{} not found", what)))
    }
}

/// For operations naming a target the actor already knows about, such as a
/// `client_id` parameter.
pub async fn require(
    pool: &SqlitePool,
    actor: &User,
    resource: Resource,
    access: Access,
) -> Result<(), AppError> {
    if is_allowed(pool, actor, resource, access).await? {
        Ok(())
    } else {
        warn!(actor_id = actor.id, ?resource, ?access, "Forbidden");
        Err(AppError::Authorization(
            "You don't have access to this resource".to_string(),
        ))
    }
}
