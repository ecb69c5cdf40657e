// Document attestation application

use super::{
    choice_enum, choice_value, expect_choice, file_value, sample_attachment, unknown, Application,
    ApplicationKind, FieldKind, FieldSpec,
};
use crate::utils::validation::{is_filled, is_valid_email};
use crate::wizard::form::{expect_count, expect_file, expect_flag, expect_text};
use crate::wizard::{CitizenProfile, FieldError, FieldValue, FileRef, FormRecord, StepDefinition};
use serde::Serialize;

pub const MAX_COPIES: u32 = 10;

choice_enum! {
    DocumentType {
        Degree => ("degree", "Educational degree / transcript"),
        BirthCertificate => ("birth_certificate", "Birth certificate"),
        MarriageCertificate => ("marriage_certificate", "Marriage certificate"),
        Commercial => ("commercial", "Commercial document"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationForm {
    pub full_name: String,
    pub email: String,

    pub document_type: Option<DocumentType>,
    pub issuing_authority: String,
    pub copies: Option<u32>,

    pub scanned_document: Option<FileRef>,

    pub consent_given: bool,
}

const APPLICANT: &[FieldSpec] = &[
    FieldSpec::new("full_name", "Full name", FieldKind::Text),
    FieldSpec::new("email", "Email", FieldKind::Text),
];

const DOCUMENT: &[FieldSpec] = &[
    FieldSpec::new(
        "document_type",
        "Document type",
        FieldKind::Choice(DocumentType::CHOICES),
    ),
    FieldSpec::new("issuing_authority", "Issuing authority", FieldKind::Text),
    FieldSpec::new("copies", "Number of copies (1-10)", FieldKind::Text),
];

const UPLOAD: &[FieldSpec] = &[FieldSpec::new(
    "scanned_document",
    "Scanned document",
    FieldKind::File,
)];

const REVIEW: &[FieldSpec] = &[FieldSpec::new(
    "consent_given",
    "I consent to verification of this document with the issuing authority",
    FieldKind::Flag,
)];

impl AttestationForm {
    /// Requested copies when within `1..=MAX_COPIES`.
    pub fn copies_requested(&self) -> Option<u32> {
        self.copies.filter(|n| (1..=MAX_COPIES).contains(n))
    }

    fn document_complete(&self) -> bool {
        self.document_type.is_some()
            && is_filled(&self.issuing_authority)
            && self.copies_requested().is_some()
    }
}

impl FormRecord for AttestationForm {
    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<(), FieldError> {
        match key {
            "full_name" => self.full_name = expect_text(key, value)?,
            "email" => self.email = expect_text(key, value)?,
            "document_type" => {
                self.document_type = expect_choice(key, value, DocumentType::from_id)?
            }
            "issuing_authority" => self.issuing_authority = expect_text(key, value)?,
            "copies" => self.copies = expect_count(key, value)?,
            "scanned_document" => self.scanned_document = expect_file(key, value)?,
            "consent_given" => self.consent_given = expect_flag(key, value)?,
            _ => return Err(unknown(key)),
        }
        Ok(())
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        let value = match key {
            "full_name" => FieldValue::text(&self.full_name),
            "email" => FieldValue::text(&self.email),
            "document_type" => choice_value(self.document_type.map(DocumentType::id)),
            "issuing_authority" => FieldValue::text(&self.issuing_authority),
            "copies" => self
                .copies
                .map(|n| FieldValue::text(n.to_string()))
                .unwrap_or(FieldValue::Null),
            "scanned_document" => file_value(&self.scanned_document),
            "consent_given" => FieldValue::Flag(self.consent_given),
            _ => return None,
        };
        Some(value)
    }
}

impl Application for AttestationForm {
    const KIND: ApplicationKind = ApplicationKind::Attestation;

    fn steps() -> Vec<StepDefinition<Self>> {
        vec![
            StepDefinition::new("applicant", "Applicant", |f: &AttestationForm| {
                is_filled(&f.full_name) && is_valid_email(&f.email)
            }),
            StepDefinition::new(
                "document",
                "Document Details",
                AttestationForm::document_complete,
            ),
            StepDefinition::new("upload", "Upload", |f: &AttestationForm| {
                f.scanned_document.is_some()
            }),
            StepDefinition::new("review", "Review & Consent", |f: &AttestationForm| {
                f.consent_given
            }),
        ]
    }

    fn fields(step_id: &str) -> &'static [FieldSpec] {
        match step_id {
            "applicant" => APPLICANT,
            "document" => DOCUMENT,
            "upload" => UPLOAD,
            "review" => REVIEW,
            _ => &[],
        }
    }

    fn prefill(&mut self, profile: &CitizenProfile) {
        self.full_name = profile.full_name.clone();
        self.email = profile.email.clone();
    }

    fn sample() -> Self {
        Self {
            full_name: "Sana Malik".to_string(),
            email: "sana.malik@example.org".to_string(),
            document_type: Some(DocumentType::Degree),
            issuing_authority: "Higher Education Commission".to_string(),
            copies: Some(2),
            scanned_document: Some(sample_attachment("degree.pdf")),
            consent_given: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::testing;

    #[test]
    fn copies_must_be_within_range() {
        let mut form = AttestationForm::sample();
        for out_of_range in ["0", "11", ""] {
            form.set_field("copies", FieldValue::text(out_of_range))
                .unwrap();
            assert!(!form.document_complete(), "copies '{}' accepted", out_of_range);
        }
        form.set_field("copies", FieldValue::text("10")).unwrap();
        assert!(form.document_complete());
        assert_eq!(form.copies_requested(), Some(10));
    }

    #[test]
    fn copies_are_stored_as_a_number() {
        let mut form = AttestationForm::default();
        form.set_field("copies", FieldValue::text(" 4 ")).unwrap();
        assert_eq!(form.copies, Some(4));
        assert_eq!(form.field("copies"), Some(FieldValue::text("4")));

        let err = form
            .set_field("copies", FieldValue::text("two"))
            .unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { .. }));
        // A rejected write leaves the previous count.
        assert_eq!(form.copies, Some(4));

        form.set_field("copies", FieldValue::Null).unwrap();
        assert_eq!(form.copies, None);
    }

    #[test]
    fn document_type_serializes_as_id() {
        let json = serde_json::to_value(AttestationForm::sample()).unwrap();
        assert_eq!(json["documentType"], "degree");
        assert_eq!(json["issuingAuthority"], "Higher Education Commission");
        assert_eq!(json["copies"], 2);
    }

    #[test]
    fn removing_upload_after_review_blocks_going_forward_again() {
        let state = AttestationForm::engine()
            .unwrap()
            .initialize(AttestationForm::sample())
            .advance()
            .unwrap()
            .advance()
            .unwrap();
        assert_eq!(state.current_step_id(), "upload");

        let cleared = state
            .update_field("scanned_document", FieldValue::Null)
            .unwrap();
        assert!(!cleared.can_advance());
        assert!(cleared.advance().is_err());
        // Earlier answers are still there.
        assert_eq!(cleared.form_data().issuing_authority, "Higher Education Commission");
    }

    #[test]
    fn shared_application_contract() {
        testing::assert_fields_round_trip::<AttestationForm>();
        testing::assert_gates_read_only_earlier_steps::<AttestationForm>();
        testing::assert_empty_form_blocks_first_step::<AttestationForm>();
    }

    #[tokio::test]
    async fn sample_runs_to_submission() {
        testing::assert_sample_submits::<AttestationForm>("ATT-").await;
    }
}
