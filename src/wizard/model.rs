use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use super::dates::Interval;
use super::ordered::{Ordered, OrderedList};
use super::WizardStep;

/// Accepts `YYYY-MM-DD`, a full ISO timestamp (date part is kept), an
/// empty string or null.
pub(crate) fn optional_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let s = raw.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid date {s:?}: {e}")))
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Institution {
    pub institution_name: String,
    pub admin_name: String,
    pub email: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub manage_users: bool,
    pub manage_roles: bool,
    pub manage_classes: bool,
    pub manage_subjects: bool,
    pub view_reports: bool,
    pub edit_settings: bool,
}

impl Permissions {
    pub const NAMES: [&'static str; 6] = [
        "manageUsers",
        "manageRoles",
        "manageClasses",
        "manageSubjects",
        "viewReports",
        "editSettings",
    ];

    pub fn all() -> Self {
        Self {
            manage_users: true,
            manage_roles: true,
            manage_classes: true,
            manage_subjects: true,
            view_reports: true,
            edit_settings: true,
        }
    }

    pub fn is_full(&self) -> bool {
        *self == Self::all()
    }

    /// Returns false for an unknown permission name.
    pub fn set(&mut self, name: &str, enabled: bool) -> bool {
        let slot = match name {
            "manageUsers" => &mut self.manage_users,
            "manageRoles" => &mut self.manage_roles,
            "manageClasses" => &mut self.manage_classes,
            "manageSubjects" => &mut self.manage_subjects,
            "viewReports" => &mut self.view_reports,
            "editSettings" => &mut self.edit_settings,
            _ => return false,
        };
        *slot = enabled;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: String,
    pub permissions: Permissions,
    pub is_custom: bool,
}

pub const DEFAULT_ROLE_IDS: [&str; 4] = ["admin", "teacher", "student", "parent"];

pub fn default_roles() -> Vec<Role> {
    let role = |id: &str, name: &str, description: &str, permissions: Permissions| Role {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        permissions,
        is_custom: false,
    };
    vec![
        role(
            "admin",
            "Admin",
            "Full access to all features and settings",
            Permissions::all(),
        ),
        role(
            "teacher",
            "Teacher",
            "Access to attendance, grades, and communication tools",
            Permissions {
                manage_classes: true,
                manage_subjects: true,
                view_reports: true,
                ..Permissions::default()
            },
        ),
        role(
            "student",
            "Student",
            "Access to assignments, grades, and schedules",
            Permissions::default(),
        ),
        role(
            "parent",
            "Parent",
            "Access to student performance and attendance",
            Permissions {
                view_reports: true,
                ..Permissions::default()
            },
        ),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Term {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "optional_date")]
    pub end_date: Option<NaiveDate>,
    pub order: usize,
}

impl Term {
    pub fn interval(&self) -> Option<Interval> {
        Some(Interval::new(self.start_date?, self.end_date?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcademicYear {
    pub name: String,
    #[serde(deserialize_with = "optional_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "optional_date")]
    pub end_date: Option<NaiveDate>,
    pub terms: OrderedList<Term>,
}

impl AcademicYear {
    pub fn interval(&self) -> Option<Interval> {
        Some(Interval::new(self.start_date?, self.end_date?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub capacity: Option<u32>,
    pub order: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassEntry {
    pub id: String,
    pub name: String,
    pub teacher_id: String,
    pub sections: OrderedList<Section>,
}

impl ClassEntry {
    /// Name, teacher, at least one section, every section named.
    pub fn checklist(&self) -> [bool; 4] {
        [
            !is_blank(&self.name),
            !is_blank(&self.teacher_id),
            !self.sections.is_empty(),
            !self.sections.is_empty() && self.sections.iter().all(|s| !is_blank(&s.name)),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningObjective {
    pub id: String,
    pub text: String,
    pub order: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Document,
    Video,
    #[default]
    Link,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub url: String,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Curriculum {
    pub syllabus: String,
    pub learning_objectives: OrderedList<LearningObjective>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub teacher_id: String,
    pub curriculum: Curriculum,
}

impl SubjectEntry {
    pub fn checklist(&self) -> [bool; 5] {
        [
            !is_blank(&self.name),
            !is_blank(&self.description),
            !is_blank(&self.teacher_id),
            !is_blank(&self.curriculum.syllabus),
            self.curriculum
                .learning_objectives
                .iter()
                .any(|o| !is_blank(&o.text)),
        ]
    }
}

macro_rules! impl_ordered {
    ($($ty:ty),*) => {
        $(impl Ordered for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
            fn order(&self) -> usize {
                self.order
            }
            fn set_order(&mut self, order: usize) {
                self.order = order;
            }
        })*
    };
}

impl_ordered!(Term, Section, LearningObjective);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Draft {
    pub institution: Institution,
    pub roles: Vec<Role>,
    pub academic_year: AcademicYear,
    pub classes: Vec<ClassEntry>,
    pub subjects: Vec<SubjectEntry>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            institution: Institution::default(),
            roles: default_roles(),
            academic_year: AcademicYear::default(),
            classes: Vec::new(),
            subjects: Vec::new(),
        }
    }
}

impl Draft {
    pub fn class_mut(&mut self, class_id: &str) -> Option<&mut ClassEntry> {
        self.classes.iter_mut().find(|c| c.id == class_id)
    }

    pub fn subject_mut(&mut self, subject_id: &str) -> Option<&mut SubjectEntry> {
        self.subjects.iter_mut().find(|s| s.id == subject_id)
    }

    pub fn role_mut(&mut self, role_id: &str) -> Option<&mut Role> {
        self.roles.iter_mut().find(|r| r.id == role_id)
    }

    /// Counts shown on the post-setup dashboard.
    pub fn summary(&self) -> DraftSummary {
        DraftSummary {
            roles: self.roles.len(),
            custom_roles: self.roles.iter().filter(|r| r.is_custom).count(),
            terms: self.academic_year.terms.len(),
            classes: self.classes.len(),
            sections: self.classes.iter().map(|c| c.sections.len()).sum(),
            subjects: self.subjects.len(),
            learning_objectives: self
                .subjects
                .iter()
                .map(|s| s.curriculum.learning_objectives.len())
                .sum(),
            resources: self.subjects.iter().map(|s| s.curriculum.resources.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub roles: usize,
    pub custom_roles: usize,
    pub terms: usize,
    pub classes: usize,
    pub sections: usize,
    pub subjects: usize,
    pub learning_objectives: usize,
    pub resources: usize,
}

/// The payload one step submits, in the same wire shape the form uses.
#[derive(Debug, Clone, PartialEq)]
pub enum StepData {
    Registration(Institution),
    Roles(Vec<Role>),
    AcademicYear(AcademicYear),
    ClassSection(Vec<ClassEntry>),
    Subject(Vec<SubjectEntry>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RolesForm {
    #[serde(default)]
    roles: Vec<Role>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcademicYearForm {
    #[serde(default)]
    academic_year: AcademicYear,
}

#[derive(Deserialize)]
struct ClassesForm {
    #[serde(default)]
    classes: Vec<ClassEntry>,
}

#[derive(Deserialize)]
struct SubjectsForm {
    #[serde(default)]
    subjects: Vec<SubjectEntry>,
}

impl StepData {
    pub fn from_json(step: WizardStep, value: Value) -> Result<Self, serde_json::Error> {
        let mut data = match step {
            WizardStep::Registration => Self::Registration(serde_json::from_value(value)?),
            WizardStep::Roles => {
                Self::Roles(serde_json::from_value::<RolesForm>(value)?.roles)
            }
            WizardStep::AcademicYear => Self::AcademicYear(
                serde_json::from_value::<AcademicYearForm>(value)?.academic_year,
            ),
            WizardStep::ClassSection => {
                Self::ClassSection(serde_json::from_value::<ClassesForm>(value)?.classes)
            }
            WizardStep::Subject => {
                Self::Subject(serde_json::from_value::<SubjectsForm>(value)?.subjects)
            }
            WizardStep::Complete => {
                return Err(serde::de::Error::custom("the complete step takes no data"))
            }
        };
        data.fill_missing_ids();
        Ok(data)
    }

    pub fn from_draft(step: WizardStep, draft: &Draft) -> Option<Self> {
        Some(match step {
            WizardStep::Registration => Self::Registration(draft.institution.clone()),
            WizardStep::Roles => Self::Roles(draft.roles.clone()),
            WizardStep::AcademicYear => Self::AcademicYear(draft.academic_year.clone()),
            WizardStep::ClassSection => Self::ClassSection(draft.classes.clone()),
            WizardStep::Subject => Self::Subject(draft.subjects.clone()),
            WizardStep::Complete => return None,
        })
    }

    pub fn step(&self) -> WizardStep {
        match self {
            Self::Registration(_) => WizardStep::Registration,
            Self::Roles(_) => WizardStep::Roles,
            Self::AcademicYear(_) => WizardStep::AcademicYear,
            Self::ClassSection(_) => WizardStep::ClassSection,
            Self::Subject(_) => WizardStep::Subject,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Registration(i) => json!(i),
            Self::Roles(r) => json!({ "roles": r }),
            Self::AcademicYear(y) => json!({ "academicYear": y }),
            Self::ClassSection(c) => json!({ "classes": c }),
            Self::Subject(s) => json!({ "subjects": s }),
        }
    }

    /// Replaces the step's whole section, so identical resubmits converge.
    pub fn apply_to(self, draft: &mut Draft) {
        match self {
            Self::Registration(i) => draft.institution = i,
            Self::Roles(r) => draft.roles = r,
            Self::AcademicYear(y) => draft.academic_year = y,
            Self::ClassSection(c) => draft.classes = c,
            Self::Subject(s) => draft.subjects = s,
        }
    }

    // Ordered children get ids from OrderedList; top-level entries need them
    // too so the form can address them.
    fn fill_missing_ids(&mut self) {
        let fill = |id: &mut String| {
            if is_blank(id) {
                *id = uuid::Uuid::new_v4().to_string();
            }
        };
        match self {
            Self::Roles(roles) => roles.iter_mut().for_each(|r| fill(&mut r.id)),
            Self::ClassSection(classes) => classes.iter_mut().for_each(|c| fill(&mut c.id)),
            Self::Subject(subjects) => {
                for s in subjects.iter_mut() {
                    fill(&mut s.id);
                    s.curriculum
                        .resources
                        .iter_mut()
                        .for_each(|r| fill(&mut r.id));
                }
            }
            Self::Registration(_) | Self::AcademicYear(_) => {}
        }
    }
}
