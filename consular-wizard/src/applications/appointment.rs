// Consular appointment scheduling

use super::{
    choice_enum, choice_value, expect_choice, unknown, Application, ApplicationKind, FieldKind,
    FieldSpec,
};
use crate::utils::validation::{
    is_filled, is_valid_email, is_valid_phone, parse_iso_date, parse_time_hhmm,
};
use crate::wizard::form::{expect_flag, expect_text};
use crate::wizard::{CitizenProfile, FieldError, FieldValue, FormRecord, StepDefinition};
use chrono::{Datelike, Weekday};
use serde::Serialize;

/// Counter hours: first slot 09:00, last slot 16:45, every 15 minutes.
pub const FIRST_SLOT_MINUTES: u32 = 9 * 60;
pub const LAST_SLOT_MINUTES: u32 = 16 * 60 + 45;
pub const SLOT_LENGTH_MINUTES: u32 = 15;

choice_enum! {
    ServiceType {
        PassportRenewal => ("passport_renewal", "Passport renewal"),
        EtcCollection => ("etc_collection", "Emergency travel certificate collection"),
        Attestation => ("attestation", "Document attestation"),
        NolInterview => ("nol_interview", "No-objection letter interview"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentForm {
    pub service: Option<ServiceType>,

    pub date: String,
    pub time: String,

    pub full_name: String,
    pub email: String,
    pub phone: String,

    pub terms_accepted: bool,
}

const SERVICE: &[FieldSpec] = &[FieldSpec::new(
    "service",
    "Service",
    FieldKind::Choice(ServiceType::CHOICES),
)];

const SLOT: &[FieldSpec] = &[
    FieldSpec::new("date", "Date (Mon-Fri)", FieldKind::Date),
    FieldSpec::new("time", "Time (09:00-16:45, 15 min)", FieldKind::Time),
];

const CONTACT: &[FieldSpec] = &[
    FieldSpec::new("full_name", "Full name", FieldKind::Text),
    FieldSpec::new("email", "Email", FieldKind::Text),
    FieldSpec::new("phone", "Phone", FieldKind::Text),
];

const CONFIRM: &[FieldSpec] = &[FieldSpec::new(
    "terms_accepted",
    "I will bring original documents and arrive 10 minutes early",
    FieldKind::Flag,
)];

/// True when `time` is a bookable slot start.
pub fn is_bookable_time(time: &str) -> bool {
    match parse_time_hhmm(time) {
        Some(m) => {
            (FIRST_SLOT_MINUTES..=LAST_SLOT_MINUTES).contains(&m)
                && (m - FIRST_SLOT_MINUTES) % SLOT_LENGTH_MINUTES == 0
        }
        None => false,
    }
}

/// True when `date` is a weekday.
pub fn is_bookable_date(date: &str) -> bool {
    parse_iso_date(date)
        .map(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .unwrap_or(false)
}

impl AppointmentForm {
    fn slot_complete(&self) -> bool {
        is_bookable_date(&self.date) && is_bookable_time(&self.time)
    }

    fn contact_complete(&self) -> bool {
        is_filled(&self.full_name) && is_valid_email(&self.email) && is_valid_phone(&self.phone)
    }
}

impl FormRecord for AppointmentForm {
    fn set_field(&mut self, key: &str, value: FieldValue) -> Result<(), FieldError> {
        match key {
            "service" => self.service = expect_choice(key, value, ServiceType::from_id)?,
            "date" => self.date = expect_text(key, value)?,
            "time" => self.time = expect_text(key, value)?,
            "full_name" => self.full_name = expect_text(key, value)?,
            "email" => self.email = expect_text(key, value)?,
            "phone" => self.phone = expect_text(key, value)?,
            "terms_accepted" => self.terms_accepted = expect_flag(key, value)?,
            _ => return Err(unknown(key)),
        }
        Ok(())
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        let value = match key {
            "service" => choice_value(self.service.map(ServiceType::id)),
            "date" => FieldValue::text(&self.date),
            "time" => FieldValue::text(&self.time),
            "full_name" => FieldValue::text(&self.full_name),
            "email" => FieldValue::text(&self.email),
            "phone" => FieldValue::text(&self.phone),
            "terms_accepted" => FieldValue::Flag(self.terms_accepted),
            _ => return None,
        };
        Some(value)
    }
}

impl Application for AppointmentForm {
    const KIND: ApplicationKind = ApplicationKind::Appointment;

    fn steps() -> Vec<StepDefinition<Self>> {
        vec![
            StepDefinition::new("service", "Select Service", |f: &AppointmentForm| {
                f.service.is_some()
            }),
            StepDefinition::new("slot", "Date & Time", AppointmentForm::slot_complete),
            StepDefinition::new("contact", "Your Details", AppointmentForm::contact_complete),
            StepDefinition::new("confirm", "Confirm", |f: &AppointmentForm| f.terms_accepted),
        ]
    }

    fn fields(step_id: &str) -> &'static [FieldSpec] {
        match step_id {
            "service" => SERVICE,
            "slot" => SLOT,
            "contact" => CONTACT,
            "confirm" => CONFIRM,
            _ => &[],
        }
    }

    fn prefill(&mut self, profile: &CitizenProfile) {
        self.full_name = profile.full_name.clone();
        self.email = profile.email.clone();
        self.phone = profile.phone.clone();
    }

    fn sample() -> Self {
        Self {
            service: Some(ServiceType::PassportRenewal),
            date: "2026-11-02".to_string(),
            time: "10:30".to_string(),
            full_name: "Usman Tariq".to_string(),
            email: "usman.tariq@example.org".to_string(),
            phone: "+971 50 1234567".to_string(),
            terms_accepted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::testing;

    #[test]
    fn bookable_times_follow_the_slot_grid() {
        assert!(is_bookable_time("09:00"));
        assert!(is_bookable_time("16:45"));
        assert!(is_bookable_time("12:15"));
        assert!(!is_bookable_time("08:45"));
        assert!(!is_bookable_time("17:00"));
        assert!(!is_bookable_time("10:10"));
        assert!(!is_bookable_time("noon"));
    }

    #[test]
    fn weekends_are_not_bookable() {
        assert!(is_bookable_date("2026-11-02")); // Monday
        assert!(!is_bookable_date("2026-11-07")); // Saturday
        assert!(!is_bookable_date("2026-02-30"));
    }

    #[test]
    fn slot_gate_needs_both_date_and_time() {
        let state = AppointmentForm::start(None)
            .unwrap()
            .update_field("service", "attestation")
            .unwrap()
            .advance()
            .unwrap();
        assert_eq!(state.current_step_id(), "slot");

        let state = state.update_field("date", "2026-11-03").unwrap();
        assert!(!state.can_advance());
        let state = state.update_field("time", "11:00").unwrap();
        assert!(state.can_advance());
        assert_eq!(state.advance().unwrap().current_step_id(), "contact");
    }

    #[test]
    fn prefill_fills_contact_step() {
        let profile = CitizenProfile {
            full_name: "Usman Tariq".to_string(),
            email: "usman@example.org".to_string(),
            phone: "+971 50 1234567".to_string(),
            ..Default::default()
        };
        let mut form = AppointmentForm::default();
        form.prefill(&profile);
        assert!(form.contact_complete());
    }

    #[test]
    fn shared_application_contract() {
        testing::assert_fields_round_trip::<AppointmentForm>();
        testing::assert_gates_read_only_earlier_steps::<AppointmentForm>();
        testing::assert_empty_form_blocks_first_step::<AppointmentForm>();
    }

    #[tokio::test]
    async fn sample_runs_to_submission() {
        testing::assert_sample_submits::<AppointmentForm>("APT-").await;
    }
}
