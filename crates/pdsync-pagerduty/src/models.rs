//! PagerDuty REST API v2 wire types (the subset pdsync reads).

use serde::Deserialize;

use pdsync_core::models::{OnCallIdentity, Schedule};

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl From<ScheduleObject> for Schedule {
    fn from(s: ScheduleObject) -> Self {
        Self {
            id: s.id,
            name: s.name,
        }
    }
}

/// `GET /schedules/{id}`
#[derive(Debug, Deserialize)]
pub struct ScheduleResponse {
    pub schedule: ScheduleObject,
}

/// `GET /schedules`
#[derive(Debug, Deserialize)]
pub struct ScheduleListResponse {
    #[serde(default)]
    pub schedules: Vec<ScheduleObject>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl From<UserObject> for OnCallIdentity {
    fn from(u: UserObject) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
        }
    }
}

/// `GET /schedules/{id}/users`
#[derive(Debug, Deserialize)]
pub struct OnCallUsersResponse {
    #[serde(default)]
    pub users: Vec<UserObject>,
}

/// Error envelope: `{"error": {"message": "...", "code": 2100}}`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ErrorObject {
    pub fn describe(&self) -> String {
        if self.errors.is_empty() {
            self.message.clone()
        } else {
            format!("{} ({})", self.message, self.errors.join("; "))
        }
    }
}
