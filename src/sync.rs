//! Fetch-and-render cycles for materials, categories and subjects, plus the
//! confirm-then-mutate flows that feed them.
//!
//! Every load replaces the target view wholesale. Mutations never touch a
//! view directly: on success they re-fetch the affected list.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::feedback::{FeedbackBus, Severity};
use crate::gateway::{BusyIndicator, GatewayError, RequestGateway};
use crate::models::{DashboardSummary, Material, NewSubject, Subject};
use crate::views::{Component, SelectOption, Views};

pub const MATERIALS_PATH: &str = "/get-materials";
pub const UPLOAD_PATH: &str = "/upload-material";
pub const DELETE_MATERIAL_PATH: &str = "/delete-material";
pub const DASHBOARD_PATH: &str = "/api/teacher/dashboard-data";
pub const TEACHER_SUBJECTS_PATH: &str = "/api/teacher/get-subjects";
pub const ADD_SUBJECT_PATH: &str = "/api/teacher/add-subject";
pub const ASSIGN_SUBJECT_PATH: &str = "/api/teacher/assign-subject";
pub const DELETE_SUBJECT_PATH: &str = "/api/teacher/delete-subject";
pub const ALL_SUBJECTS_PATH: &str = "/api/admin/get-subjects";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("component {0} is not registered")]
    ComponentAbsent(Component),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("unexpected payload: {0}")]
    Payload(String),
}

pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Mutation {
    Cancelled,
    Invalid { field: &'static str, message: String },
    /// `refreshed` is `None` when the follow-up reload was skipped or failed.
    Applied { refreshed: Option<usize> },
    Failed { status: u16, message: String },
}

/// A file picked in the host's upload form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadForm {
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub file: Option<SelectedFile>,
}

impl UploadForm {
    pub fn reset(&mut self) {
        self.fields.clear();
        self.file = None;
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.file.is_none()
    }

    fn payload(&self, file: &SelectedFile) -> serde_json::Value {
        let mut body = self.fields.clone();
        body.insert("file_name".into(), json!(file.name));
        body.insert("file_base64".into(), json!(STANDARD.encode(&file.bytes)));
        serde_json::Value::Object(body)
    }
}

/// Distinct non-empty categories in first-seen order.
pub fn unique_categories(materials: &[Material]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in materials {
        if !m.category.is_empty() && !out.contains(&m.category) {
            out.push(m.category.clone());
        }
    }
    out
}

fn parse_list<T: serde::de::DeserializeOwned>(
    body: &serde_json::Value,
    field: &str,
) -> Result<Vec<T>, SyncError> {
    match body.get(field) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| SyncError::Payload(format!("{field}: {e}"))),
    }
}

pub struct MaterialSync<'a> {
    gateway: &'a RequestGateway,
    views: &'a mut Views,
    bus: &'a mut FeedbackBus,
}

impl<'a> MaterialSync<'a> {
    pub fn new(gateway: &'a RequestGateway, views: &'a mut Views, bus: &'a mut FeedbackBus) -> Self {
        Self {
            gateway,
            views,
            bus,
        }
    }

    fn require(&self, component: Component) -> Result<(), SyncError> {
        if self.views.is_registered(component) {
            Ok(())
        } else {
            Err(SyncError::ComponentAbsent(component))
        }
    }

    fn report(&mut self, result: Result<usize, SyncError>, message: &str) -> Result<usize, SyncError> {
        if let Err(e) = &result {
            if !matches!(e, SyncError::ComponentAbsent(_)) {
                self.bus.show_alert(message, Severity::Error);
            }
        }
        result
    }

    pub fn load_materials(&mut self, filters: &[(&str, &str)]) -> Result<usize, SyncError> {
        let result = self.fetch_materials(filters);
        self.report(result, "Error loading materials")
    }

    fn fetch_materials(&mut self, filters: &[(&str, &str)]) -> Result<usize, SyncError> {
        self.require(Component::MaterialsList)?;
        let body = self.gateway.get_json(MATERIALS_PATH, filters, None)?;
        let items: Vec<Material> = parse_list(&body, "materials")?;
        let n = items.len();
        if let Some(view) = self.views.materials.as_mut() {
            view.replace(items);
        }
        debug!(count = n, "materials rendered");
        Ok(n)
    }

    pub fn load_categories(&mut self) -> Result<usize, SyncError> {
        let result = self.fetch_categories();
        self.report(result, "Error loading categories")
    }

    fn fetch_categories(&mut self) -> Result<usize, SyncError> {
        self.require(Component::CategorySelect)?;
        let body = self.gateway.get_json(MATERIALS_PATH, &[], None)?;
        let materials: Vec<Material> = parse_list(&body, "materials")?;
        let categories = unique_categories(&materials);
        let n = categories.len();
        if let Some(select) = self.views.category_select.as_mut() {
            select.replace_options(categories.into_iter().map(|c| SelectOption {
                value: c.clone(),
                label: c,
            }));
        }
        Ok(n)
    }

    pub fn load_subjects(&mut self, teacher_id: &str) -> Result<usize, SyncError> {
        let result = self.fetch_subjects(teacher_id);
        self.report(result, "Error loading subjects")
    }

    fn fetch_subjects(&mut self, teacher_id: &str) -> Result<usize, SyncError> {
        self.require(Component::SubjectsTable)?;
        let body = self
            .gateway
            .get_json(TEACHER_SUBJECTS_PATH, &[("teacher_id", teacher_id)], None)?;
        let items: Vec<Subject> = parse_list(&body, "subjects")?;
        let n = items.len();
        if let Some(view) = self.views.subjects.as_mut() {
            view.replace(items);
        }
        Ok(n)
    }

    pub fn load_all_subjects(&mut self) -> Result<usize, SyncError> {
        let result = self.fetch_all_subjects();
        self.report(result, "Error loading subjects")
    }

    fn fetch_all_subjects(&mut self) -> Result<usize, SyncError> {
        self.require(Component::AssignSubjectSelect)?;
        let body = self.gateway.get_json(ALL_SUBJECTS_PATH, &[], None)?;
        let subjects: Vec<Subject> = parse_list(&body, "subjects")?;
        let n = subjects.len();
        if let Some(select) = self.views.assign_select.as_mut() {
            select.replace_options(subjects.iter().map(|s| SelectOption {
                value: s.id.to_string(),
                label: s.option_label(),
            }));
        }
        Ok(n)
    }

    pub fn load_dashboard(
        &mut self,
        teacher_id: &str,
    ) -> Result<Option<DashboardSummary>, SyncError> {
        self.require(Component::TeacherInfo)?;
        if teacher_id.is_empty() {
            return Ok(None);
        }
        let reply = self
            .gateway
            .post_json(DASHBOARD_PATH, &json!({ "teacher_id": teacher_id }), None);
        let summary = reply
            .json()
            .filter(|j| j.get("total").is_some())
            .map(|j| serde_json::from_value::<DashboardSummary>(j.clone()))
            .transpose()
            .map_err(|e| SyncError::Payload(format!("dashboard: {e}")));
        let summary = match summary {
            Ok(s) => s,
            Err(e) => {
                self.bus.show_alert("Error loading dashboard", Severity::Error);
                return Err(e);
            }
        };
        if let (Some(s), Some(info)) = (&summary, self.views.teacher_info.as_mut()) {
            info.text = Some(format!("Total uploads: {}", s.total));
        }
        if self.views.is_registered(Component::MaterialsList) {
            self.load_materials(&[("teacher_id", teacher_id)])?;
        }
        Ok(summary)
    }

    pub fn upload_material(
        &mut self,
        form: &mut UploadForm,
        teacher_id: &str,
        busy: Option<&mut dyn BusyIndicator>,
    ) -> Result<Mutation, SyncError> {
        self.require(Component::MaterialsList)?;
        let Some(file) = form.file.as_ref() else {
            self.bus.show_alert("Select file", Severity::Error);
            return Ok(Mutation::Invalid {
                field: "file",
                message: "Select file".into(),
            });
        };
        let reply = self.gateway.post_json(UPLOAD_PATH, &form.payload(file), busy);
        if !reply.succeeded() {
            let message = reply.message().unwrap_or("Upload failed").to_string();
            self.bus.show_alert(message.clone(), Severity::Error);
            return Ok(Mutation::Failed {
                status: reply.status,
                message,
            });
        }
        info!(file = %file.name, "material uploaded");
        self.bus.show_alert("Uploaded", Severity::Success);
        form.reset();
        let refreshed = self.refresh_materials(teacher_id);
        Ok(Mutation::Applied { refreshed })
    }

    pub fn delete_material(
        &mut self,
        id: i64,
        teacher_id: &str,
        confirm: &mut dyn Confirm,
        busy: Option<&mut dyn BusyIndicator>,
    ) -> Result<Mutation, SyncError> {
        self.require(Component::MaterialsList)?;
        if !confirm.confirm("Delete this material?") {
            return Ok(Mutation::Cancelled);
        }
        let reply = self
            .gateway
            .post_json(DELETE_MATERIAL_PATH, &json!({ "id": id }), busy);
        if !reply.ok {
            return Ok(self.failed(reply.status, reply.message(), "Delete failed"));
        }
        info!(id, "material deleted");
        self.bus.show_alert("Deleted", Severity::Success);
        let refreshed = self.refresh_materials(teacher_id);
        Ok(Mutation::Applied { refreshed })
    }

    pub fn add_subject(
        &mut self,
        subject: &NewSubject,
        busy: Option<&mut dyn BusyIndicator>,
    ) -> Result<Mutation, SyncError> {
        self.require(Component::SubjectsTable)?;
        let required = [
            ("program", &subject.program),
            ("grade_level", &subject.grade_level),
            ("semester", &subject.semester),
            ("subject", &subject.subject),
            ("teacher_id", &subject.teacher_id),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Ok(Mutation::Invalid {
                field: *field,
                message: "This field is required".into(),
            });
        }
        let payload = json!({
            "program": subject.program,
            "grade_level": subject.grade_level,
            "semester": subject.semester,
            "subject": subject.subject,
            "teacher_id": subject.teacher_id,
        });
        let reply = self.gateway.post_json(ADD_SUBJECT_PATH, &payload, busy);
        if !reply.succeeded() {
            return Ok(self.failed(reply.status, None, "Error adding subject"));
        }
        self.bus.show_alert("Subject added", Severity::Success);
        let refreshed = self.refresh_subjects(subject.teacher_id.trim());
        Ok(Mutation::Applied { refreshed })
    }

    pub fn assign_subject(
        &mut self,
        subject_id: &str,
        teacher_id: &str,
        confirm: &mut dyn Confirm,
        busy: Option<&mut dyn BusyIndicator>,
    ) -> Result<Mutation, SyncError> {
        self.require(Component::SubjectsTable)?;
        if subject_id.trim().is_empty() {
            self.bus
                .show_alert("Please select a subject", Severity::Error);
            return Ok(Mutation::Invalid {
                field: "subject_id",
                message: "Please select a subject".into(),
            });
        }
        if !confirm.confirm("Assign this subject?") {
            return Ok(Mutation::Cancelled);
        }
        let reply = self.gateway.post_json(
            ASSIGN_SUBJECT_PATH,
            &json!({ "subject_id": subject_id, "teacher_id": teacher_id }),
            busy,
        );
        if !reply.ok {
            return Ok(self.failed(reply.status, reply.message(), "Assign failed"));
        }
        self.bus.show_alert("Subject assigned", Severity::Success);
        if let Some(select) = self.views.assign_select.as_mut() {
            select.select(None);
        }
        let refreshed = self.refresh_subjects(teacher_id);
        Ok(Mutation::Applied { refreshed })
    }

    pub fn delete_subject(
        &mut self,
        id: i64,
        teacher_id: &str,
        confirm: &mut dyn Confirm,
        busy: Option<&mut dyn BusyIndicator>,
    ) -> Result<Mutation, SyncError> {
        self.require(Component::SubjectsTable)?;
        if !confirm.confirm("Delete this subject?") {
            return Ok(Mutation::Cancelled);
        }
        let reply = self.gateway.post_json(
            DELETE_SUBJECT_PATH,
            &json!({ "id": id, "teacher_id": teacher_id }),
            busy,
        );
        if !reply.ok {
            return Ok(self.failed(reply.status, reply.message(), "Delete failed"));
        }
        self.bus.show_alert("Subject deleted", Severity::Success);
        let refreshed = self.refresh_subjects(teacher_id);
        Ok(Mutation::Applied { refreshed })
    }

    // The server has already applied the mutation, so a failed reload is
    // reported on the bus and never turns the outcome into an error.
    fn refresh_materials(&mut self, teacher_id: &str) -> Option<usize> {
        if teacher_id.trim().is_empty() {
            debug!("no teacher id; materials refresh skipped");
            return None;
        }
        self.load_materials(&[("teacher_id", teacher_id)])
            .inspect_err(|e| warn!(error = %e, "materials refresh failed"))
            .ok()
    }

    fn refresh_subjects(&mut self, teacher_id: &str) -> Option<usize> {
        if teacher_id.trim().is_empty() {
            debug!("no teacher id; subjects refresh skipped");
            return None;
        }
        self.load_subjects(teacher_id)
            .inspect_err(|e| warn!(error = %e, "subjects refresh failed"))
            .ok()
    }

    fn failed(&mut self, status: u16, server_message: Option<&str>, fallback: &str) -> Mutation {
        let message = server_message.unwrap_or(fallback).to_string();
        self.bus.show_alert(message.clone(), Severity::Error);
        Mutation::Failed { status, message }
    }
}
