// Generic multi-step wizard engine
//
// Every operation is a pure transition: it reads the receiver and returns a new state.
// Callers replace the state they hold; the old value stays valid (useful for undo and
// for keeping the last good state when a transition fails).

use super::error::WizardError;
use super::form::{FieldValue, FormRecord};
use super::sink::{generate_reference_id, SubmissionEnvelope, SubmissionResult, SubmissionSink};
use super::step::StepDefinition;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_WIZARD_NAME: &str = "wizard";
const DEFAULT_REFERENCE_PREFIX: &str = "REF";

#[derive(Debug)]
struct WizardDefinition<D> {
    name: String,
    reference_prefix: String,
    steps: Vec<StepDefinition<D>>,
}

/// A validated, reusable step list. Cheap to clone; every state it creates shares the same
/// definition.
#[derive(Debug)]
pub struct WizardEngine<D> {
    definition: Arc<WizardDefinition<D>>,
}

impl<D> Clone for WizardEngine<D> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
        }
    }
}

impl<D: FormRecord> WizardEngine<D> {
    pub fn new(
        name: impl Into<String>,
        reference_prefix: impl Into<String>,
        steps: Vec<StepDefinition<D>>,
    ) -> Result<Self, WizardError> {
        let name = name.into();
        if steps.is_empty() {
            return Err(WizardError::Configuration(format!(
                "wizard '{}' has no steps",
                name
            )));
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if step.id().trim().is_empty() {
                return Err(WizardError::Configuration(format!(
                    "wizard '{}' has a step with an empty id",
                    name
                )));
            }
            if !seen.insert(step.id().to_string()) {
                return Err(WizardError::Configuration(format!(
                    "wizard '{}' declares step '{}' more than once",
                    name,
                    step.id()
                )));
            }
        }

        let reference_prefix = reference_prefix.into();
        let reference_prefix = if reference_prefix.trim().is_empty() {
            DEFAULT_REFERENCE_PREFIX.to_string()
        } else {
            reference_prefix.trim().to_ascii_uppercase()
        };

        Ok(Self {
            definition: Arc::new(WizardDefinition {
                name,
                reference_prefix,
                steps,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn steps(&self) -> &[StepDefinition<D>] {
        &self.definition.steps
    }

    /// Start a run on the first step with `initial` as the form data (e.g. prefilled from a
    /// profile).
    pub fn initialize(&self, initial: D) -> WizardState<D> {
        info!(
            "[PHASE: wizard] [STEP: initialize] wizard={} steps={}",
            self.definition.name,
            self.definition.steps.len()
        );
        WizardState {
            definition: Arc::clone(&self.definition),
            current: 0,
            form: initial,
            submission: None,
        }
    }
}

#[derive(Debug)]
pub struct WizardState<D> {
    definition: Arc<WizardDefinition<D>>,
    current: usize,
    form: D,
    submission: Option<SubmissionResult>,
}

impl<D: Clone> Clone for WizardState<D> {
    fn clone(&self) -> Self {
        Self {
            definition: Arc::clone(&self.definition),
            current: self.current,
            form: self.form.clone(),
            submission: self.submission.clone(),
        }
    }
}

impl<D: FormRecord> WizardState<D> {
    /// One-shot construction without a named engine.
    pub fn initialize(steps: Vec<StepDefinition<D>>, initial: D) -> Result<Self, WizardError> {
        let engine = WizardEngine::new(DEFAULT_WIZARD_NAME, DEFAULT_REFERENCE_PREFIX, steps)?;
        Ok(engine.initialize(initial))
    }

    pub fn wizard_name(&self) -> &str {
        &self.definition.name
    }

    pub fn steps(&self) -> &[StepDefinition<D>] {
        &self.definition.steps
    }

    pub fn step_count(&self) -> usize {
        self.definition.steps.len()
    }

    pub fn current_step_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &StepDefinition<D> {
        &self.definition.steps[self.current]
    }

    pub fn current_step_id(&self) -> &str {
        self.current_step().id()
    }

    pub fn is_first_step(&self) -> bool {
        self.current == 0
    }

    pub fn is_last_step(&self) -> bool {
        self.current + 1 == self.definition.steps.len()
    }

    pub fn form_data(&self) -> &D {
        &self.form
    }

    pub fn is_complete(&self) -> bool {
        self.submission.is_some()
    }

    pub fn submission(&self) -> Option<&SubmissionResult> {
        self.submission.as_ref()
    }

    /// Return a state with `key` set to `value`. `Null` clears the field.
    pub fn update_field(
        &self,
        key: &str,
        value: impl Into<FieldValue>,
    ) -> Result<Self, WizardError> {
        self.ensure_open("update_field")?;
        let mut next = self.clone();
        next.form.set_field(key, value.into())?;
        debug!(
            "[PHASE: wizard] [STEP: update_field] wizard={} step={} field={}",
            self.definition.name,
            self.current_step_id(),
            key
        );
        Ok(next)
    }

    pub fn can_advance(&self) -> bool {
        self.current_step().is_valid(&self.form)
    }

    pub fn advance(&self) -> Result<Self, WizardError> {
        self.ensure_open("advance")?;
        if self.is_last_step() {
            return Err(WizardError::InvalidStep(format!(
                "'{}' is the last step; submit instead of advancing",
                self.current_step_id()
            )));
        }
        if !self.can_advance() {
            return Err(WizardError::InvalidStep(format!(
                "step '{}' is not complete",
                self.current_step_id()
            )));
        }

        let mut next = self.clone();
        next.current += 1;
        info!(
            "[PHASE: wizard] [STEP: advance] wizard={} from={} to={} progress={}",
            self.definition.name,
            self.current_step_id(),
            next.current_step_id(),
            next.progress_percent()
        );
        Ok(next)
    }

    pub fn retreat(&self) -> Result<Self, WizardError> {
        self.ensure_open("retreat")?;
        if self.is_first_step() {
            return Err(WizardError::InvalidStep(format!(
                "'{}' is the first step; there is nothing to go back to",
                self.current_step_id()
            )));
        }

        let mut next = self.clone();
        next.current -= 1;
        info!(
            "[PHASE: wizard] [STEP: retreat] wizard={} from={} to={}",
            self.definition.name,
            self.current_step_id(),
            next.current_step_id()
        );
        Ok(next)
    }

    /// Position through the wizard as a whole percentage, rounded half up.
    pub fn progress_percent(&self) -> u8 {
        let last = self.definition.steps.len().saturating_sub(1);
        if last == 0 {
            return 0;
        }
        ((self.current * 200 + last) / (2 * last)).min(100) as u8
    }

    /// Hand the form to `sink` and, on success, return the completed state together with
    /// the submission result.
    ///
    /// Precondition failures (not on the last step, final gate unmet, already submitted)
    /// are `InvalidStep` and never reach the sink. A sink failure leaves `self` untouched.
    pub async fn submit(
        &self,
        sink: &dyn SubmissionSink,
    ) -> Result<(Self, SubmissionResult), WizardError> {
        self.ensure_open("submit")?;
        if !self.is_last_step() {
            return Err(WizardError::InvalidStep(format!(
                "submit is only allowed on the last step (currently on '{}')",
                self.current_step_id()
            )));
        }
        if !self.can_advance() {
            return Err(WizardError::InvalidStep(format!(
                "final step '{}' requirements are not satisfied",
                self.current_step_id()
            )));
        }

        let payload = serde_json::to_value(&self.form)
            .map_err(|e| super::error::SinkError::Payload(e.to_string()))?;
        let envelope = SubmissionEnvelope {
            wizard: self.definition.name.clone(),
            payload,
        };

        let started = Instant::now();
        info!(
            "[PHASE: wizard] [STEP: submit] wizard={} sink={} entered",
            self.definition.name,
            sink.name()
        );
        let ack = match sink.deliver(&envelope).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(
                    "[PHASE: wizard] [STEP: submit] wizard={} sink={} failed (duration_ms={}): {}",
                    self.definition.name,
                    sink.name(),
                    started.elapsed().as_millis(),
                    e
                );
                return Err(WizardError::Submission(e));
            }
        };

        let submitted_at = ack.received_at.unwrap_or_else(Utc::now);
        let reference_id = ack
            .reference_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| {
                generate_reference_id(&self.definition.reference_prefix, submitted_at)
            });

        let result = SubmissionResult {
            wizard: self.definition.name.clone(),
            reference_id,
            submitted_at,
        };
        let mut next = self.clone();
        next.submission = Some(result.clone());

        info!(
            "[PHASE: wizard] [STEP: submit] wizard={} reference={} exit ok (duration_ms={})",
            self.definition.name,
            result.reference_id,
            started.elapsed().as_millis()
        );
        Ok((next, result))
    }

    fn ensure_open(&self, operation: &str) -> Result<(), WizardError> {
        match &self.submission {
            Some(done) => Err(WizardError::InvalidStep(format!(
                "{} is not allowed: wizard '{}' was already submitted as {}",
                operation, self.definition.name, done.reference_id
            ))),
            None => Ok(()),
        }
    }
}
