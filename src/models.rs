use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// Read-only projections of server rows. Unknown fields are ignored and
// missing ones default, since the server omits NULL columns.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub id: i64,
    pub file_name: String,
    pub category: String,
    pub program_name: String,
    pub subject_name: String,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    pub id: i64,
    pub subject: String,
    pub program: String,
    pub grade_level: String,
    pub semester: String,
}

impl Subject {
    /// Selector label, e.g. `Physics (STEM, 11, 1)`.
    pub fn option_label(&self) -> String {
        format!(
            "{} ({}, {}, {})",
            self.subject, self.program, self.grade_level, self.semester
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total: i64,
    #[serde(default)]
    pub stats: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewSubject {
    pub program: String,
    pub grade_level: String,
    pub semester: String,
    pub subject: String,
    pub teacher_id: String,
}
