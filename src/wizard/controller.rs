use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{PersistenceError, SubmitError, ValidationKind, ValidationReport};
use super::model::{Draft, Institution, StepData};
use super::steps;
use super::WizardStep;

/// What gets written at every step boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDraft {
    pub step: WizardStep,
    #[serde(default)]
    pub completed_steps: Vec<WizardStep>,
    #[serde(default)]
    pub draft: Draft,
}

pub trait DraftStore {
    fn load(&self, session_key: &str) -> Result<Option<SavedDraft>, PersistenceError>;
    fn save(&self, session_key: &str, saved: &SavedDraft) -> Result<(), PersistenceError>;
    /// Hands a finished setup off and clears the working draft.
    fn complete(&self, session_key: &str, saved: &SavedDraft) -> Result<(), PersistenceError>;
}

pub trait Navigator {
    fn advance_to(&mut self, step: WizardStep);
    fn go_back(&mut self, to: WizardStep);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

pub trait Notifier {
    fn notify(&mut self, kind: NoticeKind, message: &str);
}

pub struct Collaborators<'a> {
    pub store: &'a dyn DraftStore,
    pub navigator: &'a mut dyn Navigator,
    pub notifier: &'a mut dyn Notifier,
}

/// A validated submit waiting for its write. While one exists the
/// controller refuses another submit.
#[must_use]
#[derive(Debug)]
pub struct PendingSubmit {
    step: WizardStep,
    next: WizardStep,
    candidate: Draft,
}

#[derive(Debug, Clone)]
pub struct WizardController {
    session_key: String,
    step: WizardStep,
    completed: BTreeSet<WizardStep>,
    draft: Draft,
    in_flight: Option<WizardStep>,
}

impl WizardController {
    pub fn new(session_key: impl Into<String>, start: WizardStep) -> Self {
        Self {
            session_key: session_key.into(),
            step: start,
            completed: BTreeSet::new(),
            draft: Draft::default(),
            in_flight: None,
        }
    }

    /// Restores the saved session, or starts an empty draft at `start`.
    /// Earlier steps are not re-validated on resume.
    pub fn load_draft(
        store: &dyn DraftStore,
        session_key: &str,
        start: WizardStep,
    ) -> Result<Self, PersistenceError> {
        match store.load(session_key)? {
            Some(saved) => {
                debug!(session_key, step = %saved.step, "restored draft");
                Ok(Self {
                    session_key: session_key.to_string(),
                    step: saved.step,
                    completed: saved.completed_steps.into_iter().collect(),
                    draft: saved.draft,
                    in_flight: None,
                })
            }
            None => {
                debug!(session_key, step = %start, "no saved draft; starting empty");
                Ok(Self::new(session_key, start))
            }
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn completed_steps(&self) -> Vec<WizardStep> {
        self.completed.iter().copied().collect()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// A handed-off setup stays handed off, whatever step is showing.
    pub fn is_complete(&self) -> bool {
        self.step == WizardStep::Complete || self.completed.contains(&WizardStep::Subject)
    }

    pub fn validate(&self, data: &StepData) -> ValidationReport {
        steps::validate(data, self.locked_institution())
    }

    fn locked_institution(&self) -> Option<&Institution> {
        self.completed
            .contains(&WizardStep::Registration)
            .then_some(&self.draft.institution)
    }

    pub fn begin_submit(
        &mut self,
        step: WizardStep,
        data: StepData,
    ) -> Result<PendingSubmit, SubmitError> {
        if let Some(busy) = self.in_flight {
            return Err(SubmitError::SubmitInProgress(busy));
        }
        if self.is_complete() {
            return Err(SubmitError::AlreadyComplete);
        }
        if step != self.step || data.step() != step {
            return Err(SubmitError::WrongStep {
                expected: self.step,
                got: data.step(),
            });
        }

        let report = self.validate(&data);
        if !report.is_ok() {
            return Err(SubmitError::Validation(report));
        }

        let mut candidate = self.draft.clone();
        data.apply_to(&mut candidate);
        self.in_flight = Some(step);
        Ok(PendingSubmit {
            step,
            next: step.next(),
            candidate,
        })
    }

    /// Drops a validated submit without writing it.
    pub fn abort_submit(&mut self, pending: PendingSubmit) {
        if self.in_flight == Some(pending.step) {
            self.in_flight = None;
        }
        debug!(session_key = %self.session_key, step = %pending.step, "submit aborted");
    }

    pub fn finish_submit(
        &mut self,
        pending: PendingSubmit,
        c: &mut Collaborators<'_>,
    ) -> Result<WizardStep, SubmitError> {
        let mut completed = self.completed.clone();
        completed.insert(pending.step);
        let saved = SavedDraft {
            step: pending.next,
            completed_steps: completed.iter().copied().collect(),
            draft: pending.candidate,
        };

        let written = if pending.next == WizardStep::Complete {
            c.store.complete(&self.session_key, &saved)
        } else {
            c.store.save(&self.session_key, &saved)
        };
        self.in_flight = None;

        if let Err(e) = written {
            warn!(session_key = %self.session_key, step = %pending.step, error = %e, "draft write failed");
            c.notifier.notify(
                NoticeKind::Error,
                &format!(
                    "Failed to save {}. Please try again.",
                    pending.step.title().to_lowercase()
                ),
            );
            return Err(e.into());
        }

        self.draft = saved.draft;
        self.completed = completed;
        self.step = pending.next;
        info!(session_key = %self.session_key, from = %pending.step, to = %self.step, "step submitted");

        c.navigator.advance_to(self.step);
        c.notifier.notify(
            NoticeKind::Success,
            &format!("{} completed successfully", pending.step.title()),
        );
        Ok(self.step)
    }

    pub fn submit_step(
        &mut self,
        c: &mut Collaborators<'_>,
        step: WizardStep,
        data: StepData,
    ) -> Result<WizardStep, SubmitError> {
        let pending = match self.begin_submit(step, data) {
            Ok(p) => p,
            Err(e) => {
                if let SubmitError::Validation(report) = &e {
                    debug!(step = %step, errors = report.errors.len(), "step rejected");
                    let message = if report.has_kind(ValidationKind::Immutable) {
                        "Institution details cannot be changed after registration".to_string()
                    } else {
                        format!(
                            "Please fix {} field(s) before continuing",
                            report.errors.len()
                        )
                    };
                    c.notifier.notify(NoticeKind::Error, &message);
                }
                return Err(e);
            }
        };
        self.finish_submit(pending, c)
    }

    /// Never validates or touches the draft. A completed setup stays put.
    pub fn go_back(&mut self, navigator: &mut dyn Navigator) -> WizardStep {
        if self.is_complete() {
            return self.step;
        }
        self.step = self.step.prev();
        navigator.go_back(self.step);
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::model::{
        AcademicYear, ClassEntry, Curriculum, LearningObjective, Section, SubjectEntry, Term,
    };
    use crate::wizard::ordered::OrderedList;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        drafts: RefCell<HashMap<String, SavedDraft>>,
        completed: RefCell<HashMap<String, SavedDraft>>,
        failing: Cell<bool>,
        writes: Cell<usize>,
    }

    impl MemoryStore {
        fn check(&self) -> Result<(), PersistenceError> {
            if self.failing.get() {
                return Err(PersistenceError::Db(rusqlite::Error::InvalidQuery));
            }
            self.writes.set(self.writes.get() + 1);
            Ok(())
        }
    }

    impl DraftStore for MemoryStore {
        fn load(&self, key: &str) -> Result<Option<SavedDraft>, PersistenceError> {
            Ok(self.drafts.borrow().get(key).cloned())
        }
        fn save(&self, key: &str, saved: &SavedDraft) -> Result<(), PersistenceError> {
            self.check()?;
            self.drafts.borrow_mut().insert(key.into(), saved.clone());
            Ok(())
        }
        fn complete(&self, key: &str, saved: &SavedDraft) -> Result<(), PersistenceError> {
            self.check()?;
            self.drafts.borrow_mut().remove(key);
            self.completed.borrow_mut().insert(key.into(), saved.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        nav: Vec<String>,
        notices: Vec<(NoticeKind, String)>,
    }

    impl Navigator for Recorder {
        fn advance_to(&mut self, step: WizardStep) {
            self.nav.push(format!("advance:{step}"));
        }
        fn go_back(&mut self, to: WizardStep) {
            self.nav.push(format!("back:{to}"));
        }
    }

    impl Notifier for Recorder {
        fn notify(&mut self, kind: NoticeKind, message: &str) {
            self.notices.push((kind, message.to_string()));
        }
    }

    struct Harness {
        store: MemoryStore,
        nav: Recorder,
        notes: Recorder,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: MemoryStore::default(),
                nav: Recorder::default(),
                notes: Recorder::default(),
            }
        }

        fn submit(
            &mut self,
            w: &mut WizardController,
            data: StepData,
        ) -> Result<WizardStep, SubmitError> {
            let mut c = Collaborators {
                store: &self.store,
                navigator: &mut self.nav,
                notifier: &mut self.notes,
            };
            let step = data.step();
            w.submit_step(&mut c, step, data)
        }
    }

    fn d(s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }

    fn registration() -> StepData {
        StepData::Registration(Institution {
            institution_name: "Springfield High".into(),
            admin_name: "Ada Admin".into(),
            email: "ada@springfield.edu".into(),
            country: Some("us".into()),
        })
    }

    fn academic_year() -> StepData {
        let mut terms = OrderedList::new();
        terms.append(Term {
            name: "Fall".into(),
            start_date: d("2024-06-01"),
            end_date: d("2024-10-31"),
            ..Term::default()
        });
        terms.append(Term {
            name: "Spring".into(),
            start_date: d("2024-11-01"),
            end_date: d("2025-05-31"),
            ..Term::default()
        });
        StepData::AcademicYear(AcademicYear {
            name: "2024-2025".into(),
            start_date: d("2024-06-01"),
            end_date: d("2025-05-31"),
            terms,
        })
    }

    fn classes() -> StepData {
        let mut sections = OrderedList::new();
        sections.append(Section {
            name: "A".into(),
            capacity: Some(30),
            ..Section::default()
        });
        StepData::ClassSection(vec![ClassEntry {
            id: "grade-1".into(),
            name: "Grade 1".into(),
            teacher_id: "t-1".into(),
            sections,
        }])
    }

    fn subjects() -> StepData {
        let mut objectives = OrderedList::new();
        objectives.append(LearningObjective {
            text: "Read simple sentences".into(),
            ..LearningObjective::default()
        });
        StepData::Subject(vec![SubjectEntry {
            id: "english".into(),
            name: "English".into(),
            description: "Reading and writing".into(),
            teacher_id: "t-1".into(),
            curriculum: Curriculum {
                syllabus: "Phonics, grammar".into(),
                learning_objectives: objectives,
                resources: Vec::new(),
            },
        }])
    }

    fn roles(w: &WizardController) -> StepData {
        StepData::Roles(w.draft().roles.clone())
    }

    #[test]
    fn full_flow_reaches_complete_and_hands_off() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Registration);

        assert_eq!(h.submit(&mut w, registration()).ok(), Some(WizardStep::Roles));
        let r = roles(&w);
        assert_eq!(h.submit(&mut w, r).ok(), Some(WizardStep::AcademicYear));
        assert_eq!(
            h.submit(&mut w, academic_year()).ok(),
            Some(WizardStep::ClassSection)
        );
        assert_eq!(h.submit(&mut w, classes()).ok(), Some(WizardStep::Subject));
        assert_eq!(h.submit(&mut w, subjects()).ok(), Some(WizardStep::Complete));

        assert!(h.store.drafts.borrow().is_empty());
        let done = h.store.completed.borrow().get("s1").cloned().expect("handed off");
        assert_eq!(done.step, WizardStep::Complete);
        assert_eq!(done.completed_steps.len(), 5);
        assert_eq!(done.draft.subjects[0].name, "English");
        assert_eq!(h.nav.nav.last().map(String::as_str), Some("advance:complete"));

        assert!(matches!(
            h.submit(&mut w, subjects()),
            Err(SubmitError::AlreadyComplete)
        ));
    }

    #[test]
    fn completed_setup_ignores_back_and_refuses_resubmit() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Registration);
        h.submit(&mut w, registration()).expect("registration");
        let r = roles(&w);
        h.submit(&mut w, r).expect("roles");
        h.submit(&mut w, academic_year()).expect("academic year");
        h.submit(&mut w, classes()).expect("classes");
        h.submit(&mut w, subjects()).expect("subjects");
        let writes = h.store.writes.get();
        let nav = h.nav.nav.len();

        assert_eq!(w.go_back(&mut h.nav), WizardStep::Complete);
        assert_eq!(w.go_back(&mut h.nav), WizardStep::Complete);
        assert_eq!(h.nav.nav.len(), nav);

        assert!(matches!(
            h.submit(&mut w, subjects()),
            Err(SubmitError::AlreadyComplete)
        ));
        assert!(matches!(
            w.begin_submit(WizardStep::ClassSection, classes()),
            Err(SubmitError::AlreadyComplete)
        ));
        assert_eq!(h.store.writes.get(), writes);
        assert!(h.store.drafts.borrow().is_empty());
    }

    #[test]
    fn completed_steps_alone_mark_the_setup_done() {
        let mut h = Harness::new();
        let saved = SavedDraft {
            step: WizardStep::ClassSection,
            completed_steps: vec![
                WizardStep::Registration,
                WizardStep::Roles,
                WizardStep::AcademicYear,
                WizardStep::ClassSection,
                WizardStep::Subject,
            ],
            draft: Draft::default(),
        };
        h.store.drafts.borrow_mut().insert("s1".into(), saved);
        let mut w =
            WizardController::load_draft(&h.store, "s1", WizardStep::Registration).expect("load");

        assert!(w.is_complete());
        assert!(matches!(
            h.submit(&mut w, classes()),
            Err(SubmitError::AlreadyComplete)
        ));
        assert_eq!(h.store.writes.get(), 0);
    }

    #[test]
    fn aborted_submit_releases_the_guard() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Registration);

        let pending = w
            .begin_submit(WizardStep::Registration, registration())
            .expect("first submit");
        assert!(w.is_submitting());
        w.abort_submit(pending);
        assert!(!w.is_submitting());
        assert_eq!(w.step(), WizardStep::Registration);
        assert_eq!(w.draft(), &Draft::default());
        assert_eq!(h.store.writes.get(), 0);

        assert_eq!(h.submit(&mut w, registration()).ok(), Some(WizardStep::Roles));
    }

    #[test]
    fn validation_failure_neither_mutates_nor_persists() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::ClassSection);
        let before = w.draft().clone();

        let grade_1 = StepData::ClassSection(vec![ClassEntry {
            id: "g1".into(),
            name: "Grade 1".into(),
            teacher_id: "t-1".into(),
            sections: OrderedList::new(),
        }]);
        let Err(SubmitError::Validation(report)) = h.submit(&mut w, grade_1) else {
            panic!("expected validation failure");
        };
        assert!(report.has_kind(ValidationKind::RequiredFieldMissing));
        assert_eq!(report.errors[0].field, "classes[0].sections");

        assert_eq!(w.draft(), &before);
        assert_eq!(w.step(), WizardStep::ClassSection);
        assert_eq!(h.store.writes.get(), 0);
        assert!(!w.is_submitting());
        assert_eq!(h.notes.notices.last().map(|n| n.0), Some(NoticeKind::Error));
    }

    #[test]
    fn persistence_failure_is_recoverable() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Registration);
        h.store.failing.set(true);

        let err = h.submit(&mut w, registration()).expect_err("write fails");
        assert_eq!(err.code(), "persistence_failed");
        assert_eq!(w.step(), WizardStep::Registration);
        assert_eq!(w.draft(), &Draft::default());
        assert!(!w.is_submitting());
        assert_eq!(h.notes.notices.last().map(|n| n.0), Some(NoticeKind::Error));
        assert!(h.nav.nav.is_empty());

        h.store.failing.set(false);
        assert_eq!(h.submit(&mut w, registration()).ok(), Some(WizardStep::Roles));
        assert_eq!(w.draft().institution.institution_name, "Springfield High");
    }

    #[test]
    fn second_submit_while_pending_is_rejected() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Registration);

        let pending = w
            .begin_submit(WizardStep::Registration, registration())
            .expect("first submit");
        assert_eq!(pending.step, WizardStep::Registration);
        assert!(matches!(
            w.begin_submit(WizardStep::Registration, registration()),
            Err(SubmitError::SubmitInProgress(WizardStep::Registration))
        ));

        let mut c = Collaborators {
            store: &h.store,
            navigator: &mut h.nav,
            notifier: &mut h.notes,
        };
        assert_eq!(w.finish_submit(pending, &mut c).ok(), Some(WizardStep::Roles));
        assert_eq!(h.store.writes.get(), 1);
    }

    #[test]
    fn identical_resubmit_after_back_yields_same_draft() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::AcademicYear);
        h.submit(&mut w, academic_year()).expect("first");
        let first = h.store.drafts.borrow().get("s1").cloned().expect("saved");

        let data = StepData::from_draft(WizardStep::AcademicYear, w.draft()).expect("data");
        assert_eq!(w.go_back(&mut h.nav), WizardStep::AcademicYear);
        h.submit(&mut w, data).expect("second");
        let second = h.store.drafts.borrow().get("s1").cloned().expect("saved");

        assert_eq!(first, second);
        assert_eq!(second.draft.academic_year.terms.len(), 2);
    }

    #[test]
    fn registration_cannot_change_after_completion() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Registration);
        h.submit(&mut w, registration()).expect("register");
        w.go_back(&mut h.nav);

        let StepData::Registration(mut inst) = registration() else {
            unreachable!()
        };
        inst.institution_name = "Shelbyville High".into();
        let Err(SubmitError::Validation(report)) =
            h.submit(&mut w, StepData::Registration(inst))
        else {
            panic!("expected immutable error");
        };
        assert!(report.has_kind(ValidationKind::Immutable));
        assert_eq!(h.submit(&mut w, registration()).ok(), Some(WizardStep::Roles));
    }

    #[test]
    fn back_is_unconditional_and_stops_at_registration() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Roles);
        assert_eq!(w.go_back(&mut h.nav), WizardStep::Registration);
        assert_eq!(w.go_back(&mut h.nav), WizardStep::Registration);
        assert_eq!(h.nav.nav, vec!["back:registration", "back:registration"]);
        assert_eq!(h.store.writes.get(), 0);
    }

    #[test]
    fn wrong_step_is_refused() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Registration);
        assert!(matches!(
            h.submit(&mut w, classes()),
            Err(SubmitError::WrongStep {
                expected: WizardStep::Registration,
                got: WizardStep::ClassSection
            })
        ));
    }

    #[test]
    fn load_resumes_saved_session_or_starts_at_requested_step() {
        let mut h = Harness::new();
        let mut w = WizardController::new("s1", WizardStep::Registration);
        h.submit(&mut w, registration()).expect("register");

        let resumed =
            WizardController::load_draft(&h.store, "s1", WizardStep::Registration).expect("load");
        assert_eq!(resumed.step(), WizardStep::Roles);
        assert_eq!(resumed.completed_steps(), vec![WizardStep::Registration]);
        assert_eq!(resumed.draft(), w.draft());

        let fresh =
            WizardController::load_draft(&h.store, "other", WizardStep::ClassSection).expect("load");
        assert_eq!(fresh.step(), WizardStep::ClassSection);
        assert!(fresh.completed_steps().is_empty());
        assert_eq!(fresh.step().position(), 4);
    }
}
