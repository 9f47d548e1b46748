//! Student enrollment into the classes and sections of a completed setup.

use chrono::{Months, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::wizard::error::{FieldError, ValidationKind, ValidationReport};
use crate::wizard::model::{optional_date, Draft};
use crate::wizard::steps::is_valid_email;

pub const MIN_AGE_YEARS: u32 = 3;
pub const GENDERS: [&str; 3] = ["male", "female", "other"];
const MAX_NAME_CHARS: usize = 50;
const MAX_GUARDIAN_CHARS: usize = 100;
const MIN_PHONE_CHARS: usize = 10;
const MAX_PHONE_CHARS: usize = 15;

const COLUMNS: &str = "id, class_id, section_id, first_name, last_name, date_of_birth, gender,
     roll_number, guardian_name, guardian_phone, guardian_email, address, academic_year,
     enrolled_at";

/// What the enrollment form submits.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Enrollment {
    pub first_name: String,
    pub last_name: String,
    #[serde(deserialize_with = "optional_date")]
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub class_id: String,
    pub section_id: String,
    pub roll_number: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub guardian_email: String,
    pub address: Option<String>,
}

impl Enrollment {
    fn trimmed(&self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth: self.date_of_birth,
            gender: self.gender.trim().to_ascii_lowercase(),
            class_id: self.class_id.trim().to_string(),
            section_id: self.section_id.trim().to_string(),
            roll_number: self.roll_number.trim().to_string(),
            guardian_name: self.guardian_name.trim().to_string(),
            guardian_phone: self.guardian_phone.trim().to_string(),
            guardian_email: self.guardian_email.trim().to_string(),
            address: self
                .address
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub class_id: String,
    pub section_id: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub roll_number: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub guardian_email: String,
    pub address: Option<String>,
    pub academic_year: String,
    pub enrolled_at: String,
}

/// Existing enrollments that bear on a new one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Occupancy {
    pub in_section: usize,
    pub roll_number_taken: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionLoad {
    pub class_id: String,
    pub class_name: String,
    pub section_id: String,
    pub section_name: String,
    pub capacity: Option<u32>,
    pub enrolled: usize,
}

#[derive(Debug, Default)]
pub struct StudentFilter<'a> {
    pub class_id: Option<&'a str>,
    pub section_id: Option<&'a str>,
    /// Case-insensitive match on first or last name.
    pub search: Option<&'a str>,
}

#[derive(Debug, Error)]
pub enum EnrollError {
    #[error("enrollment has {} validation error(s)", .0.errors.len())]
    Validation(ValidationReport),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

fn old_enough(dob: NaiveDate, today: NaiveDate) -> bool {
    today
        .checked_sub_months(Months::new(MIN_AGE_YEARS * 12))
        .is_some_and(|latest| dob <= latest)
}

fn is_roll_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn is_phone_number(s: &str) -> bool {
    let digits = s.strip_prefix('+').unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn check_name(report: &mut ValidationReport, field: &str, label: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        report.push(FieldError::required(field, format!("{label} is required")));
    } else if value.trim().chars().count() > max {
        report.push(FieldError::format(field, format!("{label} is too long")));
    }
}

/// Runs every enrollment rule against the setup's classes and sections.
pub fn validate_enrollment(
    e: &Enrollment,
    setup: &Draft,
    today: NaiveDate,
    occupancy: Occupancy,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_name(&mut report, "firstName", "First name", &e.first_name, MAX_NAME_CHARS);
    check_name(&mut report, "lastName", "Last name", &e.last_name, MAX_NAME_CHARS);

    match e.date_of_birth {
        None => report.push(FieldError::required("dateOfBirth", "Date of birth is required")),
        Some(dob) if !old_enough(dob, today) => report.push(FieldError::new(
            "dateOfBirth",
            ValidationKind::OutOfBounds,
            format!("Student must be at least {MIN_AGE_YEARS} years old"),
        )),
        Some(_) => {}
    }

    let gender = e.gender.trim();
    if gender.is_empty() {
        report.push(FieldError::required("gender", "Gender is required"));
    } else if !GENDERS.contains(&gender.to_ascii_lowercase().as_str()) {
        report.push(FieldError::format("gender", "Gender must be male, female or other"));
    }

    let class_id = e.class_id.trim();
    let section_id = e.section_id.trim();
    if class_id.is_empty() {
        report.push(FieldError::required("classId", "Class is required"));
        if section_id.is_empty() {
            report.push(FieldError::required("sectionId", "Section is required"));
        }
    } else {
        match setup.classes.iter().find(|c| c.id == class_id) {
            None => report.push(FieldError::format(
                "classId",
                format!("Class {class_id} is not part of the setup"),
            )),
            Some(_) if section_id.is_empty() => {
                report.push(FieldError::required("sectionId", "Section is required"));
            }
            Some(class) => match class.sections.iter().find(|s| s.id == section_id) {
                None => report.push(FieldError::format(
                    "sectionId",
                    format!("Section {section_id} is not part of {}", class.name.trim()),
                )),
                Some(section) => {
                    if let Some(cap) = section.capacity {
                        if occupancy.in_section >= cap as usize {
                            report.push(FieldError::new(
                                "sectionId",
                                ValidationKind::CapacityReached,
                                format!(
                                    "Section {} of {} is full ({cap} students)",
                                    section.name.trim(),
                                    class.name.trim()
                                ),
                            ));
                        }
                    }
                }
            },
        }
    }

    let roll = e.roll_number.trim();
    if roll.is_empty() {
        report.push(FieldError::required("rollNumber", "Roll number is required"));
    } else if !is_roll_number(roll) {
        report.push(FieldError::format(
            "rollNumber",
            "Roll number must be uppercase letters and digits",
        ));
    } else if occupancy.roll_number_taken {
        report.push(FieldError::new(
            "rollNumber",
            ValidationKind::Duplicate,
            format!("Roll number {roll} is already used in this class"),
        ));
    }

    check_name(
        &mut report,
        "guardianName",
        "Guardian name",
        &e.guardian_name,
        MAX_GUARDIAN_CHARS,
    );

    let phone = e.guardian_phone.trim();
    if phone.is_empty() {
        report.push(FieldError::required("guardianPhone", "Guardian phone is required"));
    } else if phone.chars().count() < MIN_PHONE_CHARS {
        report.push(FieldError::format(
            "guardianPhone",
            format!("Phone number must be at least {MIN_PHONE_CHARS} digits"),
        ));
    } else if phone.chars().count() > MAX_PHONE_CHARS {
        report.push(FieldError::format("guardianPhone", "Phone number is too long"));
    } else if !is_phone_number(phone) {
        report.push(FieldError::format("guardianPhone", "Invalid phone number"));
    }

    if e.guardian_email.trim().is_empty() {
        report.push(FieldError::required("guardianEmail", "Guardian email is required"));
    } else if !is_valid_email(&e.guardian_email) {
        report.push(FieldError::format("guardianEmail", "Invalid email address"));
    }

    report
}

pub fn occupancy(
    conn: &Connection,
    session_key: &str,
    class_id: &str,
    section_id: &str,
    roll_number: &str,
) -> rusqlite::Result<Occupancy> {
    let in_section: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students
         WHERE session_key = ? AND class_id = ? AND section_id = ?",
        (session_key, class_id, section_id),
        |r| r.get(0),
    )?;
    let taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM students
             WHERE session_key = ? AND class_id = ? AND roll_number = ?",
            (session_key, class_id, roll_number),
            |r| r.get(0),
        )
        .optional()?;
    Ok(Occupancy {
        in_section: usize::try_from(in_section).unwrap_or(0),
        roll_number_taken: taken.is_some(),
    })
}

/// Validates and records one student. `setup` is the completed draft the
/// class and section must come from.
pub fn enroll(
    conn: &Connection,
    session_key: &str,
    setup: &Draft,
    input: &Enrollment,
    today: NaiveDate,
) -> Result<Student, EnrollError> {
    let e = input.trimmed();
    let occ = occupancy(conn, session_key, &e.class_id, &e.section_id, &e.roll_number)?;
    let report = validate_enrollment(&e, setup, today, occ);
    if !report.is_ok() {
        return Err(EnrollError::Validation(report));
    }

    let student = Student {
        id: Uuid::new_v4().to_string(),
        display_name: format!("{}, {}", e.last_name, e.first_name),
        date_of_birth: e
            .date_of_birth
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        academic_year: setup.academic_year.name.trim().to_string(),
        enrolled_at: Utc::now().to_rfc3339(),
        class_id: e.class_id,
        section_id: e.section_id,
        first_name: e.first_name,
        last_name: e.last_name,
        gender: e.gender,
        roll_number: e.roll_number,
        guardian_name: e.guardian_name,
        guardian_phone: e.guardian_phone,
        guardian_email: e.guardian_email,
        address: e.address,
    };
    conn.execute(
        "INSERT INTO students(id, session_key, class_id, section_id, first_name, last_name,
           date_of_birth, gender, roll_number, guardian_name, guardian_phone, guardian_email,
           address, academic_year, enrolled_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            student.id,
            session_key,
            student.class_id,
            student.section_id,
            student.first_name,
            student.last_name,
            student.date_of_birth,
            student.gender,
            student.roll_number,
            student.guardian_name,
            student.guardian_phone,
            student.guardian_email,
            student.address,
            student.academic_year,
            student.enrolled_at,
        ],
    )?;
    debug!(session_key, class_id = %student.class_id, section_id = %student.section_id, "student enrolled");
    Ok(student)
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    let first_name: String = r.get(3)?;
    let last_name: String = r.get(4)?;
    Ok(Student {
        id: r.get(0)?,
        class_id: r.get(1)?,
        section_id: r.get(2)?,
        display_name: format!("{last_name}, {first_name}"),
        first_name,
        last_name,
        date_of_birth: r.get(5)?,
        gender: r.get(6)?,
        roll_number: r.get(7)?,
        guardian_name: r.get(8)?,
        guardian_phone: r.get(9)?,
        guardian_email: r.get(10)?,
        address: r.get(11)?,
        academic_year: r.get(12)?,
        enrolled_at: r.get(13)?,
    })
}

pub fn list(
    conn: &Connection,
    session_key: &str,
    filter: &StudentFilter<'_>,
) -> rusqlite::Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM students
         WHERE session_key = ?1
           AND (?2 IS NULL OR class_id = ?2)
           AND (?3 IS NULL OR section_id = ?3)
         ORDER BY class_id, section_id, roll_number"
    ))?;
    let students = stmt
        .query_map(
            (session_key, filter.class_id, filter.section_id),
            student_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let needle = filter
        .search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let Some(needle) = needle else {
        return Ok(students);
    };
    Ok(students
        .into_iter()
        .filter(|s| {
            s.first_name.to_lowercase().contains(&needle)
                || s.last_name.to_lowercase().contains(&needle)
        })
        .collect())
}

pub fn get(conn: &Connection, session_key: &str, id: &str) -> rusqlite::Result<Option<Student>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM students WHERE session_key = ? AND id = ?"),
        (session_key, id),
        student_from_row,
    )
    .optional()
}

pub fn delete(conn: &Connection, session_key: &str, id: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM students WHERE session_key = ? AND id = ?",
        (session_key, id),
    )?;
    Ok(changed > 0)
}

/// Every section of the setup with its enrolled head count.
pub fn section_loads(
    conn: &Connection,
    session_key: &str,
    setup: &Draft,
) -> rusqlite::Result<Vec<SectionLoad>> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM students
         WHERE session_key = ? AND class_id = ? AND section_id = ?",
    )?;
    let mut out = Vec::new();
    for class in &setup.classes {
        for section in class.sections.iter() {
            let enrolled: i64 =
                stmt.query_row((session_key, &class.id, &section.id), |r| r.get(0))?;
            out.push(SectionLoad {
                class_id: class.id.clone(),
                class_name: class.name.clone(),
                section_id: section.id.clone(),
                section_name: section.name.clone(),
                capacity: section.capacity,
                enrolled: usize::try_from(enrolled).unwrap_or(0),
            });
        }
    }
    Ok(out)
}
