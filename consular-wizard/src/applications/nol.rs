// No-Objection Letter (NOL) application

use super::{
    choice_enum, choice_value, expect_choice, file_value, sample_attachment, unknown, Application,
    ApplicationKind, FieldKind, FieldSpec,
};
use crate::utils::validation::{is_filled, is_valid_passport_number};
use crate::wizard::form::{expect_file, expect_flag, expect_text};
use crate::wizard::{CitizenProfile, FieldError, FieldValue, FileRef, FormRecord, StepDefinition};
use serde::Serialize;

choice_enum! {
    NolPurpose {
        Employment => ("employment", "Employment"),
        Study => ("study", "Higher studies"),
        Marriage => ("marriage", "Marriage"),
        Property => ("property", "Property transfer"),
        Other => ("other", "Other"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NolForm {
    pub full_name: String,
    pub passport_number: String,

    pub purpose: Option<NolPurpose>,
    pub purpose_details: String,
    pub addressed_to: String,

    pub supporting_document: Option<FileRef>,

    pub declaration_accepted: bool,
}

const APPLICANT: &[FieldSpec] = &[
    FieldSpec::new("full_name", "Full name", FieldKind::Text),
    FieldSpec::new("passport_number", "Passport number", FieldKind::Text),
];

const PURPOSE: &[FieldSpec] = &[
    FieldSpec::new("purpose", "Purpose", FieldKind::Choice(NolPurpose::CHOICES)),
    FieldSpec::new(
        "purpose_details",
        "Details (required for Other)",
        FieldKind::Text,
    ),
    FieldSpec::new("addressed_to", "Addressed to (organisation)", FieldKind::Text),
];

const DOCUMENTS: &[FieldSpec] = &[FieldSpec::new(
    "supporting_document",
    "Supporting document",
    FieldKind::File,
)];

const DECLARATION: &[FieldSpec] = &[FieldSpec::new(
    "declaration_accepted",
    "I declare the information given is true and complete",
    FieldKind::Flag,
)];

impl NolForm {
    fn applicant_complete(&self) -> bool {
        is_filled(&self.full_name) && is_valid_passport_number(&self.passport_number)
    }

    fn purpose_complete(&self) -> bool {
        match self.purpose {
            None => false,
            Some(NolPurpose::Other) => {
                is_filled(&self.purpose_details) && is_filled(&self.addressed_to)
            }
            Some(_) => is_filled(&self.addressed_to),
        }
    }
}

impl FormRecord for NolForm {
    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<(), FieldError> {
        match key {
            "full_name" => self.full_name = expect_text(key, value)?,
            "passport_number" => self.passport_number = expect_text(key, value)?,
            "purpose" => self.purpose = expect_choice(key, value, NolPurpose::from_id)?,
            "purpose_details" => self.purpose_details = expect_text(key, value)?,
            "addressed_to" => self.addressed_to = expect_text(key, value)?,
            "supporting_document" => self.supporting_document = expect_file(key, value)?,
            "declaration_accepted" => self.declaration_accepted = expect_flag(key, value)?,
            _ => return Err(unknown(key)),
        }
        Ok(())
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        let value = match key {
            "full_name" => FieldValue::text(&self.full_name),
            "passport_number" => FieldValue::text(&self.passport_number),
            "purpose" => choice_value(self.purpose.map(NolPurpose::id)),
            "purpose_details" => FieldValue::text(&self.purpose_details),
            "addressed_to" => FieldValue::text(&self.addressed_to),
            "supporting_document" => file_value(&self.supporting_document),
            "declaration_accepted" => FieldValue::Flag(self.declaration_accepted),
            _ => return None,
        };
        Some(value)
    }
}

impl Application for NolForm {
    const KIND: ApplicationKind = ApplicationKind::NoObjectionLetter;

    fn steps() -> Vec<StepDefinition<Self>> {
        vec![
            StepDefinition::new("applicant", "Applicant", NolForm::applicant_complete),
            StepDefinition::new("purpose", "Purpose of Letter", NolForm::purpose_complete),
            StepDefinition::new("documents", "Supporting Documents", |f: &NolForm| {
                f.supporting_document.is_some()
            }),
            StepDefinition::new("declaration", "Declaration", |f: &NolForm| {
                f.declaration_accepted
            }),
        ]
    }

    fn fields(step_id: &str) -> &'static [FieldSpec] {
        match step_id {
            "applicant" => APPLICANT,
            "purpose" => PURPOSE,
            "documents" => DOCUMENTS,
            "declaration" => DECLARATION,
            _ => &[],
        }
    }

    fn prefill(&mut self, profile: &CitizenProfile) {
        self.full_name = profile.full_name.clone();
        self.passport_number = profile.passport_number.clone();
    }

    fn sample() -> Self {
        Self {
            full_name: "Bilal Ahmed".to_string(),
            passport_number: "CD7654321".to_string(),
            purpose: Some(NolPurpose::Employment),
            purpose_details: String::new(),
            addressed_to: "Gulf Engineering LLC".to_string(),
            supporting_document: Some(sample_attachment("offer-letter.pdf")),
            declaration_accepted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::testing;

    #[test]
    fn other_purpose_needs_details() {
        let mut form = NolForm::sample();
        form.purpose = Some(NolPurpose::Other);
        assert!(!form.purpose_complete());

        form.purpose_details = "Family emergency visit".to_string();
        assert!(form.purpose_complete());
    }

    #[test]
    fn purpose_requires_a_selection() {
        let mut form = NolForm::sample();
        form.set_field("purpose", FieldValue::Null).unwrap();
        assert!(!form.purpose_complete());
    }

    #[test]
    fn applicant_needs_valid_passport() {
        let mut form = NolForm::sample();
        form.passport_number = "not-a-passport".to_string();
        assert!(!form.applicant_complete());
    }

    #[test]
    fn declaration_is_a_flag_field() {
        let mut form = NolForm::default();
        let err = form
            .set_field("declaration_accepted", FieldValue::text("true"))
            .unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { .. }));
        form.set_field("declaration_accepted", FieldValue::Flag(true))
            .unwrap();
        assert!(form.declaration_accepted);
    }

    #[test]
    fn prefill_only_touches_applicant_fields() {
        let profile = CitizenProfile {
            full_name: "Sana Malik".to_string(),
            passport_number: "EF1122334".to_string(),
            email: "sana@example.org".to_string(),
            ..Default::default()
        };
        let mut form = NolForm::default();
        form.prefill(&profile);
        assert_eq!(form.full_name, "Sana Malik");
        assert_eq!(form.passport_number, "EF1122334");
        assert!(form.purpose.is_none());
        assert!(form.applicant_complete());
    }

    #[test]
    fn shared_application_contract() {
        testing::assert_fields_round_trip::<NolForm>();
        testing::assert_gates_read_only_earlier_steps::<NolForm>();
        testing::assert_empty_form_blocks_first_step::<NolForm>();
    }

    #[tokio::test]
    async fn sample_runs_to_submission() {
        testing::assert_sample_submits::<NolForm>("NOL-").await;
    }
}
