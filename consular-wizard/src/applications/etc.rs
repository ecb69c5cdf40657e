// Emergency Travel Certificate (ETC) application

use super::{
    choice_enum, choice_value, expect_choice, file_value, sample_attachment, unknown, Application,
    ApplicationKind, FieldKind, FieldSpec,
};
use crate::utils::validation::{
    is_filled, is_valid_email, is_valid_iso_date, is_valid_passport_number, is_valid_phone,
    parse_iso_date,
};
use crate::wizard::form::{expect_file, expect_flag, expect_text};
use crate::wizard::{CitizenProfile, FieldError, FieldValue, FileRef, FormRecord, StepDefinition};
use serde::Serialize;

choice_enum! {
    EtcReason {
        Lost => ("lost", "Passport lost or stolen"),
        Expired => ("expired", "Passport expired abroad"),
        Damaged => ("damaged", "Passport damaged"),
        Repatriation => ("repatriation", "Deportation / repatriation"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcForm {
    pub full_name: String,
    pub father_name: String,
    pub passport_number: String,
    pub national_id: String,
    pub date_of_birth: String,

    pub email: String,
    pub confirm_email: String,
    pub phone: String,

    pub reason: Option<EtcReason>,
    pub destination: String,
    pub travel_date: String,

    pub photo: Option<FileRef>,
    pub police_report: Option<FileRef>,

    pub declaration_accepted: bool,
}

const PERSONAL: &[FieldSpec] = &[
    FieldSpec::new("full_name", "Full name", FieldKind::Text),
    FieldSpec::new("father_name", "Father's name", FieldKind::Text),
    FieldSpec::new("passport_number", "Passport number", FieldKind::Text),
    FieldSpec::new("national_id", "National ID (if no passport)", FieldKind::Text),
    FieldSpec::new("date_of_birth", "Date of birth", FieldKind::Date),
];

const CONTACT: &[FieldSpec] = &[
    FieldSpec::new("email", "Email", FieldKind::Text),
    FieldSpec::new("confirm_email", "Confirm email", FieldKind::Text),
    FieldSpec::new("phone", "Phone", FieldKind::Text),
];

const TRAVEL: &[FieldSpec] = &[
    FieldSpec::new("reason", "Reason", FieldKind::Choice(EtcReason::CHOICES)),
    FieldSpec::new("destination", "Destination", FieldKind::Text),
    FieldSpec::new("travel_date", "Intended travel date", FieldKind::Date),
];

const DOCUMENTS: &[FieldSpec] = &[
    FieldSpec::new("photo", "Passport-size photo", FieldKind::File),
    FieldSpec::new(
        "police_report",
        "Police report (required if lost)",
        FieldKind::File,
    ),
];

const DECLARATION: &[FieldSpec] = &[FieldSpec::new(
    "declaration_accepted",
    "I declare the information given is true and complete",
    FieldKind::Flag,
)];

impl EtcForm {
    fn personal_complete(&self) -> bool {
        let identity = is_valid_passport_number(&self.passport_number)
            || (self.passport_number.trim().is_empty() && is_filled(&self.national_id));
        is_filled(&self.full_name) && identity && is_valid_iso_date(&self.date_of_birth)
    }

    fn contact_complete(&self) -> bool {
        is_valid_email(&self.email)
            && self
                .email
                .trim()
                .eq_ignore_ascii_case(self.confirm_email.trim())
            && is_valid_phone(&self.phone)
    }

    fn travel_complete(&self) -> bool {
        let dates_ordered = match (
            parse_iso_date(&self.date_of_birth),
            parse_iso_date(&self.travel_date),
        ) {
            (Some(born), Some(travel)) => travel >= born,
            _ => false,
        };
        self.reason.is_some() && is_filled(&self.destination) && dates_ordered
    }

    fn documents_complete(&self) -> bool {
        let report_ok = self.reason != Some(EtcReason::Lost) || self.police_report.is_some();
        self.photo.is_some() && report_ok
    }
}

impl FormRecord for EtcForm {
    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<(), FieldError> {
        match key {
            "full_name" => self.full_name = expect_text(key, value)?,
            "father_name" => self.father_name = expect_text(key, value)?,
            "passport_number" => self.passport_number = expect_text(key, value)?,
            "national_id" => self.national_id = expect_text(key, value)?,
            "date_of_birth" => self.date_of_birth = expect_text(key, value)?,
            "email" => self.email = expect_text(key, value)?,
            "confirm_email" => self.confirm_email = expect_text(key, value)?,
            "phone" => self.phone = expect_text(key, value)?,
            "reason" => self.reason = expect_choice(key, value, EtcReason::from_id)?,
            "destination" => self.destination = expect_text(key, value)?,
            "travel_date" => self.travel_date = expect_text(key, value)?,
            "photo" => self.photo = expect_file(key, value)?,
            "police_report" => self.police_report = expect_file(key, value)?,
            "declaration_accepted" => self.declaration_accepted = expect_flag(key, value)?,
            _ => return Err(unknown(key)),
        }
        Ok(())
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        let value = match key {
            "full_name" => FieldValue::text(&self.full_name),
            "father_name" => FieldValue::text(&self.father_name),
            "passport_number" => FieldValue::text(&self.passport_number),
            "national_id" => FieldValue::text(&self.national_id),
            "date_of_birth" => FieldValue::text(&self.date_of_birth),
            "email" => FieldValue::text(&self.email),
            "confirm_email" => FieldValue::text(&self.confirm_email),
            "phone" => FieldValue::text(&self.phone),
            "reason" => choice_value(self.reason.map(EtcReason::id)),
            "destination" => FieldValue::text(&self.destination),
            "travel_date" => FieldValue::text(&self.travel_date),
            "photo" => file_value(&self.photo),
            "police_report" => file_value(&self.police_report),
            "declaration_accepted" => FieldValue::Flag(self.declaration_accepted),
            _ => return None,
        };
        Some(value)
    }
}

impl Application for EtcForm {
    const KIND: ApplicationKind = ApplicationKind::EmergencyTravelCertificate;

    fn steps() -> Vec<StepDefinition<Self>> {
        vec![
            StepDefinition::new("personal", "Personal Details", EtcForm::personal_complete),
            StepDefinition::new("contact", "Contact Information", EtcForm::contact_complete),
            StepDefinition::new("travel", "Travel Details", EtcForm::travel_complete),
            StepDefinition::new("documents", "Supporting Documents", EtcForm::documents_complete),
            StepDefinition::new("declaration", "Declaration", |f: &EtcForm| {
                f.declaration_accepted
            }),
        ]
    }

    fn fields(step_id: &str) -> &'static [FieldSpec] {
        match step_id {
            "personal" => PERSONAL,
            "contact" => CONTACT,
            "travel" => TRAVEL,
            "documents" => DOCUMENTS,
            "declaration" => DECLARATION,
            _ => &[],
        }
    }

    fn prefill(&mut self, profile: &CitizenProfile) {
        self.full_name = profile.full_name.clone();
        self.passport_number = profile.passport_number.clone();
        self.national_id = profile.national_id.clone();
        self.email = profile.email.clone();
        self.confirm_email = profile.email.clone();
        self.phone = profile.phone.clone();
    }

    fn sample() -> Self {
        Self {
            full_name: "Ayesha Khan".to_string(),
            father_name: "Imran Khan".to_string(),
            passport_number: "AB1234567".to_string(),
            national_id: String::new(),
            date_of_birth: "1990-04-12".to_string(),
            email: "ayesha.khan@example.org".to_string(),
            confirm_email: "ayesha.khan@example.org".to_string(),
            phone: "+92 300 1234567".to_string(),
            reason: Some(EtcReason::Lost),
            destination: "Lahore".to_string(),
            travel_date: "2026-11-02".to_string(),
            photo: Some(sample_attachment("photo.jpg")),
            police_report: Some(sample_attachment("police-report.pdf")),
            declaration_accepted: true,
        }
    }
}
