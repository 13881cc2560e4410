use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::models::string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,
    LogOwnMeals,
    UpdateOwnWorkouts,
    SendMessages,
    BookAppointments,

    ManagePrograms,
    ManageWorkouts,
    ManageExercises,
    SetNutritionGoals,
    ViewLinkedClients,
    ManageAppointments,

    ViewAllUsers,
    ManageUsers,
    EditUserRoles,
    ViewGlobalStats,
}

string_enum! {
    Role("role") {
        Client => "client",
        Coach => "coach",
        Admin => "admin",
    }
}

static CLIENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);
    permissions.insert(Permission::LogOwnMeals);
    permissions.insert(Permission::UpdateOwnWorkouts);
    permissions.insert(Permission::SendMessages);
    permissions.insert(Permission::BookAppointments);

    permissions
});

static COACH_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(CLIENT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManagePrograms);
    permissions.insert(Permission::ManageWorkouts);
    permissions.insert(Permission::ManageExercises);
    permissions.insert(Permission::SetNutritionGoals);
    permissions.insert(Permission::ViewLinkedClients);
    permissions.insert(Permission::ManageAppointments);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COACH_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewAllUsers);
    permissions.insert(Permission::ManageUsers);
    permissions.insert(Permission::EditUserRoles);
    permissions.insert(Permission::ViewGlobalStats);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Client => &CLIENT_PERMISSIONS,
            Role::Coach => &COACH_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Roles that may be chosen at self-registration.
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, Role::Client | Role::Coach)
    }
}
