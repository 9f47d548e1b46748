//! Completion score for the progress bar. Display only: it never gates a
//! transition.

use serde::Serialize;

use super::model::{Draft, StepData};
use super::steps;
use super::WizardStep;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Fill {
    Scalar { filled: bool },
    Collection { valid: usize, total: usize },
    /// Sub-field checks passed across every entry of a collection.
    Graded { passed: usize, possible: usize },
}

impl Fill {
    fn fraction(self) -> f64 {
        match self {
            Fill::Scalar { filled } => {
                if filled {
                    1.0
                } else {
                    0.0
                }
            }
            Fill::Collection { total: 0, .. } => 0.0,
            Fill::Collection { valid, total } => valid.min(total) as f64 / total as f64,
            Fill::Graded { possible: 0, .. } => 0.0,
            Fill::Graded { passed, possible } => passed.min(possible) as f64 / possible as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub key: &'static str,
    pub weight: u32,
    pub fill: Fill,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn scalar(mut self, key: &'static str, weight: u32, filled: bool) -> Self {
        self.entries.push(ManifestEntry {
            key,
            weight,
            fill: Fill::Scalar { filled },
        });
        self
    }

    pub fn collection(mut self, key: &'static str, weight: u32, valid: usize, total: usize) -> Self {
        self.entries.push(ManifestEntry {
            key,
            weight,
            fill: Fill::Collection { valid, total },
        });
        self
    }

    pub fn graded<const N: usize>(
        mut self,
        key: &'static str,
        weight: u32,
        checklists: impl IntoIterator<Item = [bool; N]>,
    ) -> Self {
        let (mut passed, mut possible) = (0, 0);
        for checks in checklists {
            passed += checks.iter().filter(|c| **c).count();
            possible += N;
        }
        self.entries.push(ManifestEntry {
            key,
            weight,
            fill: Fill::Graded { passed, possible },
        });
        self
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Weighted score rounded to the nearest integer. A partly filled step
    /// never shows 0 or 100.
    pub fn percent(&self) -> u8 {
        let total_weight: u32 = self.entries.iter().map(|e| e.weight).sum();
        if total_weight == 0 {
            return 0;
        }
        let earned: f64 = self
            .entries
            .iter()
            .map(|e| e.weight as f64 * e.fill.fraction())
            .sum();
        let raw = earned / total_weight as f64 * 100.0;
        if raw <= 0.0 {
            return 0;
        }
        if raw >= 100.0 {
            return 100;
        }
        (raw.round() as u8).clamp(1, 99)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgress {
    pub step: WizardStep,
    pub percent: u8,
    pub position: u8,
    pub total_steps: u8,
    pub overall_percent: u8,
}

pub fn manifest_for(data: &StepData) -> Manifest {
    match data {
        StepData::Registration(i) => Manifest::default()
            .scalar("institutionName", 40, !i.institution_name.trim().is_empty())
            .scalar("adminName", 30, !i.admin_name.trim().is_empty())
            .scalar("email", 30, steps::is_valid_email(&i.email)),
        StepData::Roles(roles) => {
            let valid = roles
                .iter()
                .filter(|r| !r.name.trim().is_empty() && !r.description.trim().is_empty())
                .count();
            Manifest::default()
                .collection("roles", 70, valid, roles.len())
                .scalar(
                    "fullAccessRole",
                    30,
                    roles.iter().any(|r| r.permissions.is_full()),
                )
        }
        StepData::AcademicYear(year) => {
            let outer = year.interval();
            let valid = year
                .terms
                .iter()
                .filter(|t| {
                    let Some(inner) = t.interval() else {
                        return false;
                    };
                    !t.name.trim().is_empty()
                        && inner.start < inner.end
                        && outer
                            .map(|o| inner.start >= o.start && inner.end <= o.end)
                            .unwrap_or(false)
                })
                .count();
            Manifest::default()
                .scalar("name", 20, !year.name.trim().is_empty())
                .scalar("dateRange", 20, outer.is_some())
                .collection("terms", 60, valid, year.terms.len())
        }
        StepData::ClassSection(classes) => {
            Manifest::default().graded("classes", 100, classes.iter().map(|c| c.checklist()))
        }
        StepData::Subject(subjects) => {
            Manifest::default().graded("subjects", 100, subjects.iter().map(|s| s.checklist()))
        }
    }
}

pub fn step_progress(step: WizardStep, draft: &Draft) -> StepProgress {
    let percent = match StepData::from_draft(step, draft) {
        Some(data) => manifest_for(&data).percent(),
        None => 100,
    };
    StepProgress {
        step,
        percent,
        position: step.position(),
        total_steps: WizardStep::TOTAL,
        overall_percent: step.overall_percent(),
    }
}
