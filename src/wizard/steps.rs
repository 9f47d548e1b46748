//! Shared per-step validation. Every step composes the same date-range
//! predicates; all rules run so the caller gets every failing field.

use url::Url;

use super::dates::{self, Interval};
use super::error::{FieldError, ValidationKind, ValidationReport};
use super::model::{
    AcademicYear, ClassEntry, Institution, ResourceKind, Role, StepData, SubjectEntry,
    DEFAULT_ROLE_IDS,
};

pub const MAX_DOCUMENT_BYTES: u64 = 5 * 1024 * 1024;
const MIN_NAME_CHARS: usize = 2;

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

pub fn is_valid_email(s: &str) -> bool {
    let s = s.trim();
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.contains(char::is_whitespace)
        && domain
            .split('.')
            .filter(|p| !p.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// `YYYY-YYYY` with four ASCII digits on each side.
pub fn is_academic_year_name(s: &str) -> bool {
    let b = s.trim().as_bytes();
    b.len() == 9
        && b[4] == b'-'
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[5..].iter().all(u8::is_ascii_digit)
}

pub fn validate(data: &StepData, previous: Option<&Institution>) -> ValidationReport {
    match data {
        StepData::Registration(i) => validate_registration(i, previous),
        StepData::Roles(r) => validate_roles(r),
        StepData::AcademicYear(y) => validate_academic_year(y),
        StepData::ClassSection(c) => validate_classes(c),
        StepData::Subject(s) => validate_subjects(s),
    }
}

/// `previous` is the institution already recorded by a completed
/// registration; it may be resubmitted unchanged but not edited.
pub fn validate_registration(
    inst: &Institution,
    previous: Option<&Institution>,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    if let Some(prev) = previous {
        if prev != inst {
            report.push(FieldError::new(
                "institution",
                ValidationKind::Immutable,
                "Institution details cannot be changed after registration",
            ));
            return report;
        }
    }

    for (field, value, label) in [
        ("institutionName", &inst.institution_name, "Institution name"),
        ("adminName", &inst.admin_name, "Admin name"),
    ] {
        if blank(value) {
            report.push(FieldError::required(field, format!("{label} is required")));
        } else if value.trim().chars().count() < MIN_NAME_CHARS {
            report.push(FieldError::format(
                field,
                format!("{label} must be at least {MIN_NAME_CHARS} characters"),
            ));
        }
    }

    if blank(&inst.email) {
        report.push(FieldError::required("email", "Email is required"));
    } else if !is_valid_email(&inst.email) {
        report.push(FieldError::format(
            "email",
            "Please enter a valid email address",
        ));
    }

    if let Some(country) = &inst.country {
        if country.trim().chars().count() > 64 {
            report.push(FieldError::format(
                "country",
                "country length must be <= 64",
            ));
        }
    }
    report
}

pub fn validate_roles(roles: &[Role]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for id in DEFAULT_ROLE_IDS {
        if !roles.iter().any(|r| r.id == id) {
            report.push(FieldError::required(
                format!("roles.{id}"),
                format!("Default role {id} is required for system functionality"),
            ));
        }
    }
    for (i, role) in roles.iter().enumerate() {
        if blank(&role.name) {
            report.push(FieldError::required(
                format!("roles[{i}].name"),
                "Role name cannot be empty",
            ));
        }
        if blank(&role.description) {
            report.push(FieldError::required(
                format!("roles[{i}].description"),
                "Role description cannot be empty",
            ));
        }
        let dup = roles[..i]
            .iter()
            .any(|r| !blank(&r.name) && r.name.trim().eq_ignore_ascii_case(role.name.trim()));
        if dup {
            report.push(FieldError::format(
                format!("roles[{i}].name"),
                format!("Role name {} is already used", role.name.trim()),
            ));
        }
    }
    if !roles.iter().any(|r| r.permissions.is_full()) {
        report.push(FieldError::required(
            "roles",
            "At least one role must have full administrative permissions",
        ));
    }
    report
}

pub fn validate_academic_year(year: &AcademicYear) -> ValidationReport {
    let mut report = ValidationReport::default();

    if blank(&year.name) {
        report.push(FieldError::required(
            "academicYear.name",
            "Academic year name is required",
        ));
    } else if !is_academic_year_name(&year.name) {
        report.push(FieldError::format(
            "academicYear.name",
            "Academic year must be in format YYYY-YYYY",
        ));
    }
    if year.start_date.is_none() {
        report.push(FieldError::required(
            "academicYear.startDate",
            "Start date is required",
        ));
    }
    if year.end_date.is_none() {
        report.push(FieldError::required(
            "academicYear.endDate",
            "End date is required",
        ));
    }

    let outer = year.interval();
    if let Some(o) = outer {
        if let Err(e) = dates::validate_outer_range(o.start, o.end) {
            report.push(FieldError::from_range("academicYear.endDate", &e));
        }
        if let Err(e) = dates::validate_year_span(o.start, o.end) {
            report.push(FieldError::from_range("academicYear.endDate", &e));
        }
    }

    if year.terms.is_empty() {
        report.push(FieldError::required(
            "academicYear.terms",
            "At least one term is required",
        ));
        return report;
    }

    // (position, order, interval) for terms whose own range is sound.
    let mut sound: Vec<(usize, usize, Interval)> = Vec::new();
    for (i, term) in year.terms.iter().enumerate() {
        let base = format!("academicYear.terms[{i}]");
        if blank(&term.name) {
            report.push(FieldError::required(
                format!("{base}.name"),
                "Term name is required",
            ));
        }
        if term.start_date.is_none() {
            report.push(FieldError::required(
                format!("{base}.startDate"),
                "Term start date is required",
            ));
        }
        if term.end_date.is_none() {
            report.push(FieldError::required(
                format!("{base}.endDate"),
                "Term end date is required",
            ));
        }
        let Some(inner) = term.interval() else {
            continue;
        };
        if let Err(e) = dates::validate_outer_range(inner.start, inner.end) {
            report.push(FieldError::from_range(format!("{base}.endDate"), &e));
            continue;
        }
        if let Some(o) = outer {
            if let Err(e) = dates::validate_containment(o, inner) {
                report.push(FieldError::from_range(base.clone(), &e));
            }
        }
        sound.push((i, term.order, inner));
    }

    let intervals: Vec<Interval> = sound.iter().map(|(_, _, iv)| *iv).collect();
    let pairs = match dates::validate_no_overlap(&intervals) {
        Ok(()) => Vec::new(),
        Err(_) => dates::overlapping_pairs(&intervals),
    };
    for (a, b) in pairs {
        let (ia, ib) = (sound[a].0, sound[b].0);
        let name = |idx: usize| {
            year.terms
                .get(idx)
                .map(|t| t.name.trim().to_string())
                .unwrap_or_default()
        };
        report.push(FieldError::new(
            format!("academicYear.terms[{ib}]"),
            ValidationKind::OverlappingIntervals,
            format!(
                "Terms cannot overlap: {} overlaps {}",
                name(ib),
                name(ia)
            ),
        ));
    }

    let ordered: Vec<(usize, Interval)> = sound.iter().map(|(_, o, iv)| (*o, *iv)).collect();
    if let Err(e) = dates::validate_chronological(&ordered) {
        if let dates::DateRangeError::OutOfOrder { order } = e {
            report.push(FieldError::new(
                format!("academicYear.terms[{order}]"),
                ValidationKind::OutOfOrder,
                format!(
                    "Term at position {} starts before the previous term ends; reorder terms chronologically",
                    order + 1
                ),
            ));
        } else {
            report.push(FieldError::from_range("academicYear.terms", &e));
        }
    }
    report
}

pub fn validate_classes(classes: &[ClassEntry]) -> ValidationReport {
    let mut report = ValidationReport::default();
    if classes.is_empty() {
        report.push(FieldError::required(
            "classes",
            "You must add at least one class",
        ));
        return report;
    }
    for (i, class) in classes.iter().enumerate() {
        let base = format!("classes[{i}]");
        if blank(&class.name) {
            report.push(FieldError::required(
                format!("{base}.name"),
                "Class name is required",
            ));
        }
        if blank(&class.teacher_id) {
            report.push(FieldError::required(
                format!("{base}.teacherId"),
                "Teacher is required",
            ));
        }
        if class.sections.is_empty() {
            report.push(FieldError::required(
                format!("{base}.sections"),
                "Each class must have at least one section",
            ));
        }
        for (j, section) in class.sections.iter().enumerate() {
            if blank(&section.name) {
                report.push(FieldError::required(
                    format!("{base}.sections[{j}].name"),
                    "Section name is required",
                ));
            }
            if section.capacity == Some(0) {
                report.push(FieldError::format(
                    format!("{base}.sections[{j}].capacity"),
                    "Section capacity must be at least 1",
                ));
            }
        }
    }
    report
}

pub fn validate_subjects(subjects: &[SubjectEntry]) -> ValidationReport {
    let mut report = ValidationReport::default();
    if subjects.is_empty() {
        report.push(FieldError::required(
            "subjects",
            "At least one subject is required",
        ));
        return report;
    }
    for (i, subject) in subjects.iter().enumerate() {
        let base = format!("subjects[{i}]");
        for (field, value, message) in [
            ("name", &subject.name, "Subject name is required"),
            ("description", &subject.description, "Description is required"),
            ("teacherId", &subject.teacher_id, "Teacher is required"),
            ("curriculum.syllabus", &subject.curriculum.syllabus, "Syllabus is required"),
        ] {
            if blank(value) {
                report.push(FieldError::required(format!("{base}.{field}"), message));
            }
        }

        let objectives = &subject.curriculum.learning_objectives;
        if objectives.is_empty() {
            report.push(FieldError::required(
                format!("{base}.curriculum.learningObjectives"),
                "At least one learning objective is required",
            ));
        }
        for (j, o) in objectives.iter().enumerate() {
            if blank(&o.text) {
                report.push(FieldError::required(
                    format!("{base}.curriculum.learningObjectives[{j}]"),
                    "Learning objective cannot be empty",
                ));
            }
        }

        for (j, r) in subject.curriculum.resources.iter().enumerate() {
            let rbase = format!("{base}.curriculum.resources[{j}]");
            if blank(&r.name) {
                report.push(FieldError::required(
                    format!("{rbase}.name"),
                    "Resource name is required",
                ));
            }
            if Url::parse(r.url.trim()).is_err() {
                report.push(FieldError::format(
                    format!("{rbase}.url"),
                    "Please enter a valid URL",
                ));
            }
            if r.kind == ResourceKind::Document && r.size.unwrap_or(0) > MAX_DOCUMENT_BYTES {
                report.push(FieldError::format(
                    format!("{rbase}.size"),
                    "File size should be less than 5MB",
                ));
            }
        }
    }
    report
}
