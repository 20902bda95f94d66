//! View-models for the host's render targets.
//!
//! A component is either registered by the host (and then always rendered
//! by replacement) or absent; there is no probing for existence at use time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Material, Subject};

pub const NO_MATERIALS: &str = "No materials yet";
pub const NO_SUBJECTS: &str = "No subjects assigned";
pub const ASSIGN_PLACEHOLDER: &str = "Select Subject to Assign";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Component {
    MaterialsList,
    CategorySelect,
    SubjectsTable,
    AssignSubjectSelect,
    TeacherInfo,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::MaterialsList => "materialsList",
            Component::CategorySelect => "categorySelect",
            Component::SubjectsTable => "subjectsTable",
            Component::AssignSubjectSelect => "assignSubjectSelect",
            Component::TeacherInfo => "teacherInfo",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView<T> {
    items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placeholder: Option<&'static str>,
    renders: u32,
    #[serde(skip)]
    empty_text: &'static str,
}

impl<T> ListView<T> {
    pub fn new(empty_text: &'static str) -> Self {
        Self {
            items: Vec::new(),
            placeholder: None,
            renders: 0,
            empty_text,
        }
    }

    /// Clears the view and repopulates it. Never appends.
    pub fn replace(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.clear();
        self.items.extend(items);
        self.placeholder = if self.items.is_empty() {
            Some(self.empty_text)
        } else {
            None
        };
        self.renders += 1;
    }

    #[cfg(test)]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[cfg(test)]
    pub fn placeholder(&self) -> Option<&'static str> {
        self.placeholder
    }

    #[cfg(test)]
    pub fn renders(&self) -> u32 {
        self.renders
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// A selector with fixed leading options owned by the host markup and a
/// derived tail that is replaced on every load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    leading: Vec<SelectOption>,
    options: Vec<SelectOption>,
    selected: Option<String>,
    renders: u32,
}

impl Selector {
    pub fn with_leading(leading: Vec<SelectOption>) -> Self {
        Self {
            leading,
            ..Self::default()
        }
    }

    pub fn replace_options(&mut self, options: impl IntoIterator<Item = SelectOption>) {
        self.options.clear();
        self.options.extend(options);
        if let Some(sel) = &self.selected {
            if !self.options.iter().any(|o| &o.value == sel) {
                self.selected = None;
            }
        }
        self.renders += 1;
    }

    #[cfg(test)]
    pub fn options(&self) -> impl Iterator<Item = &SelectOption> {
        self.leading.iter().chain(self.options.iter())
    }

    #[cfg(test)]
    pub fn derived(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn select(&mut self, value: Option<String>) {
        self.selected = value;
    }

    #[cfg(test)]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[cfg(test)]
    pub fn renders(&self) -> u32 {
        self.renders
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfoLine {
    pub text: Option<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Views {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials: Option<ListView<Material>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_select: Option<Selector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjects: Option<ListView<Subject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assign_select: Option<Selector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_info: Option<InfoLine>,
}

impl Views {
    /// Declares a component present. Re-registering keeps existing state.
    pub fn register(&mut self, component: Component) {
        match component {
            Component::MaterialsList => {
                self.materials
                    .get_or_insert_with(|| ListView::new(NO_MATERIALS));
            }
            Component::CategorySelect => {
                self.category_select.get_or_insert_with(Selector::default);
            }
            Component::SubjectsTable => {
                self.subjects.get_or_insert_with(|| ListView::new(NO_SUBJECTS));
            }
            Component::AssignSubjectSelect => {
                self.assign_select.get_or_insert_with(|| {
                    Selector::with_leading(vec![SelectOption {
                        value: String::new(),
                        label: ASSIGN_PLACEHOLDER.to_string(),
                    }])
                });
            }
            Component::TeacherInfo => {
                self.teacher_info.get_or_insert_with(InfoLine::default);
            }
        }
    }

    pub fn is_registered(&self, component: Component) -> bool {
        match component {
            Component::MaterialsList => self.materials.is_some(),
            Component::CategorySelect => self.category_select.is_some(),
            Component::SubjectsTable => self.subjects.is_some(),
            Component::AssignSubjectSelect => self.assign_select.is_some(),
            Component::TeacherInfo => self.teacher_info.is_some(),
        }
    }
}
