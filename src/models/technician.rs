use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Technician {
    /// UUID of the technician
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Slug of the name, used for lookups
    pub slug: String,
    /// Home zone, a soft hint for dispatch
    pub zone: Option<String>,
    /// Inactive technicians keep their history but take no new jobs
    pub active: bool,
    pub created_at: Timestamp,
}

impl Default for Technician {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            slug: String::new(),
            zone: None,
            active: true,
            created_at: Timestamp::now(),
        }
    }
}
