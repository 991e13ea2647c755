//! Tours and their steps
//!
//! A step is a trigger plus one of three behaviours: wait for the trigger,
//! act on the element it matched, or end the tour successfully once it holds.

use serde::Deserialize;

use crate::common::{Error, Result};
use crate::document::{Action, Selector};

/// What a step does once its trigger is satisfied
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    /// Advance without touching the document
    Wait,
    /// Perform the action on the matched element, then advance
    Act(Action),
    /// End the run as passed
    Check,
}

/// One step of a tour
#[derive(Debug, Clone)]
pub struct Step {
    content: String,
    trigger: Selector,
    kind: StepKind,
}

impl Step {
    pub fn new(content: &str, trigger: &str, kind: StepKind) -> Result<Self> {
        Ok(Self {
            content: content.to_string(),
            trigger: Selector::parse(trigger)?,
            kind,
        })
    }

    /// Wait for `trigger`, then advance
    pub fn wait(content: &str, trigger: &str) -> Result<Self> {
        Self::new(content, trigger, StepKind::Wait)
    }

    /// Wait for `trigger`, then perform `action` on the matched element
    pub fn act(content: &str, trigger: &str, action: Action) -> Result<Self> {
        Self::new(content, trigger, StepKind::Act(action))
    }

    /// Wait for `trigger`, then end the run as passed
    pub fn check(content: &str, trigger: &str) -> Result<Self> {
        Self::new(content, trigger, StepKind::Check)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn trigger(&self) -> &Selector {
        &self.trigger
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn is_check(&self) -> bool {
        self.kind == StepKind::Check
    }
}

/// A step as written in a tour file
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct StepDef {
    /// Human-readable description
    #[serde(default)]
    pub content: String,
    /// Selector that must match a visible element
    pub trigger: String,
    /// `click` or `text <value>`
    pub run: Option<String>,
    /// Ends the tour once the trigger holds
    #[serde(default, alias = "isCheck")]
    pub is_check: bool,
}

impl TryFrom<StepDef> for Step {
    type Error = Error;

    fn try_from(def: StepDef) -> Result<Self> {
        let kind = match (def.run.as_deref(), def.is_check) {
            (Some(_), true) => {
                return Err(Error::InvalidStep(
                    "a check step cannot also have a 'run' instruction".to_string(),
                ))
            }
            (Some(run), false) => StepKind::Act(Action::parse(run)?),
            (None, true) => StepKind::Check,
            (None, false) => StepKind::Wait,
        };
        Step::new(&def.content, &def.trigger, kind)
    }
}

/// A named, immutable sequence of steps
#[derive(Debug)]
pub struct Tour {
    name: String,
    steps: Vec<Step>,
}

impl Tour {
    pub fn new(name: &str, steps: Vec<Step>) -> Self {
        Self {
            name: name.to_string(),
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A tour as written in a tour or scenario file
#[derive(Deserialize, Debug, Clone)]
pub struct TourDef {
    /// Unique tour name
    pub name: String,
    /// The steps, in execution order
    pub steps: Vec<StepDef>,
}

impl TryFrom<TourDef> for Tour {
    type Error = Error;

    fn try_from(def: TourDef) -> Result<Self> {
        let mut steps = Vec::with_capacity(def.steps.len());
        for (index, step) in def.steps.into_iter().enumerate() {
            let content = step.content.clone();
            let step = Step::try_from(step).map_err(|e| {
                Error::InvalidStep(format!(
                    "tour '{}', step {} ('{}'): {}",
                    def.name, index, content, e
                ))
            })?;
            steps.push(step);
        }
        Ok(Tour::new(&def.name, steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(yaml: &str) -> StepDef {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_step_kinds_from_definition() {
        let step = Step::try_from(def(
            "content: Write feedback reason\ntrigger: \"textarea[name='opt_out_feedback']\"\nrun: text My feedback\n",
        ))
        .unwrap();
        assert_eq!(
            step.kind(),
            &StepKind::Act(Action::SetText("My feedback".to_string()))
        );

        let step = Step::try_from(def("trigger: div#button_feedback\n")).unwrap();
        assert_eq!(step.kind(), &StepKind::Wait);
        assert_eq!(step.content(), "");

        let step = Step::try_from(def("trigger: button#send_form[disabled]\nisCheck: true\n")).unwrap();
        assert!(step.is_check());
        assert_eq!(step.trigger().as_str(), "button#send_form[disabled]");
    }

    #[test]
    fn test_check_with_run_is_rejected() {
        let err = Step::try_from(def("trigger: '#a'\nrun: click\nis_check: true\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidStep(_)));
    }

    #[test]
    fn test_bad_trigger_is_rejected() {
        let err = Step::wait("broken", "div:contains('x'").unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn test_tour_definition_reports_failing_step() {
        let tour: TourDef = serde_yaml::from_str(
            r##"
name: broken
steps:
  - trigger: "#ok"
  - content: Bad run
    trigger: "#a"
    run: hover
"##,
        )
        .unwrap();

        let err = Tour::try_from(tour).unwrap_err().to_string();
        assert!(err.contains("tour 'broken', step 1 ('Bad run')"), "{}", err);
    }

    #[test]
    fn test_unknown_step_field_is_rejected() {
        let result: std::result::Result<StepDef, _> =
            serde_yaml::from_str("trigger: '#a'\nextra_trigger: '#b'\n");
        assert!(result.is_err());
    }
}
