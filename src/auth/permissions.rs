use crate::error::AppError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    School,
    SchoolYear,
    Grade,
    Cycle,
    Classroom,
    Subject,
    Student,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Add,
    Change,
    Delete,
    View,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::School,
        Resource::SchoolYear,
        Resource::Grade,
        Resource::Cycle,
        Resource::Classroom,
        Resource::Subject,
        Resource::Student,
        Resource::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::School => "school",
            Resource::SchoolYear => "schoolyear",
            Resource::Grade => "grade",
            Resource::Cycle => "cycle",
            Resource::Classroom => "classroom",
            Resource::Subject => "subject",
            Resource::Student => "student",
            Resource::User => "user",
        }
    }
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Add, Action::Change, Action::Delete, Action::View];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Change => "change",
            Action::Delete => "delete",
            Action::View => "view",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    pub const fn add(resource: Resource) -> Self {
        Self::new(resource, Action::Add)
    }

    pub const fn change(resource: Resource) -> Self {
        Self::new(resource, Action::Change)
    }

    pub const fn delete(resource: Resource) -> Self {
        Self::new(resource, Action::Delete)
    }

    pub const fn view(resource: Resource) -> Self {
        Self::new(resource, Action::View)
    }

    /// `add_student`, `view_cycle`, ...
    pub fn codename(&self) -> String {
        format!("{}_{}", self.action.as_str(), self.resource.as_str())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codename())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Direction,
    Enseignant,
    Surveillant,
    Comptable,
    Parent,
    Eleve,
}

const MANAGED_BY_DIRECTION: [Resource; 5] = [
    Resource::SchoolYear,
    Resource::Grade,
    Resource::Classroom,
    Resource::Subject,
    Resource::Student,
];

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    Resource::ALL
        .iter()
        .flat_map(|resource| {
            Action::ALL
                .iter()
                .map(move |action| Permission::new(*resource, *action))
        })
        .collect()
});

static DIRECTION_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions: HashSet<Permission> = MANAGED_BY_DIRECTION
        .iter()
        .flat_map(|resource| {
            Action::ALL
                .iter()
                .map(move |action| Permission::new(*resource, *action))
        })
        .collect();

    permissions.insert(Permission::view(Resource::User));

    permissions
});

static ENSEIGNANT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    MANAGED_BY_DIRECTION
        .iter()
        .map(|resource| Permission::view(*resource))
        .collect()
});

static COMPTABLE_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::view(Resource::Student));

    permissions
});

static NO_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(HashSet::new);

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::Direction,
        Role::Enseignant,
        Role::Surveillant,
        Role::Comptable,
        Role::Parent,
        Role::Eleve,
    ];

    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Admin => &ADMIN_PERMISSIONS,
            Role::Direction => &DIRECTION_PERMISSIONS,
            Role::Enseignant => &ENSEIGNANT_PERMISSIONS,
            Role::Comptable => &COMPTABLE_PERMISSIONS,
            Role::Surveillant | Role::Parent | Role::Eleve => &NO_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Direction => "DIRECTION",
            Role::Enseignant => "ENSEIGNANT",
            Role::Surveillant => "SURVEILLANT",
            Role::Comptable => "COMPTABLE",
            Role::Parent => "PARENT",
            Role::Eleve => "ELEVE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin système",
            Role::Direction => "Direction",
            Role::Enseignant => "Enseignant",
            Role::Surveillant => "Surveillant",
            Role::Comptable => "Comptable",
            Role::Parent => "Parent",
            Role::Eleve => "Élève",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Direction
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| AppError::Validation(format!("Unknown role: {}", s)))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
