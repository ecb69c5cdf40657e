//! Citizen service applications built on the wizard engine.
//!
//! Each application is a typed form record plus its ordered steps. Step gates only read
//! fields collected on that step or earlier ones.

pub mod appointment;
pub mod attestation;
pub mod etc;
pub mod nol;

use crate::wizard::{
    CitizenProfile, FieldError, FieldValue, FileRef, FormRecord, StepDefinition, WizardEngine,
    WizardError, WizardState,
};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use appointment::AppointmentForm;
pub use attestation::AttestationForm;
pub use etc::EtcForm;
pub use nol::NolForm;

/// Declare a radio-style choice: an enum serialised as its id, with display labels.
macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($id:literal, $label:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
        pub enum $name {
            $(#[serde(rename = $id)] $variant),+
        }

        impl $name {
            pub const CHOICES: &'static [(&'static str, &'static str)] = &[$(($id, $label)),+];

            pub fn id(self) -> &'static str {
                match self {
                    $($name::$variant => $id),+
                }
            }

            pub fn from_id(id: &str) -> Option<Self> {
                match id.trim() {
                    $($id => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}
pub(crate) use choice_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationKind {
    EmergencyTravelCertificate,
    NoObjectionLetter,
    Attestation,
    Appointment,
}

impl ApplicationKind {
    pub const ALL: [ApplicationKind; 4] = [
        ApplicationKind::EmergencyTravelCertificate,
        ApplicationKind::NoObjectionLetter,
        ApplicationKind::Attestation,
        ApplicationKind::Appointment,
    ];

    pub fn as_id(&self) -> &'static str {
        match self {
            ApplicationKind::EmergencyTravelCertificate => "etc",
            ApplicationKind::NoObjectionLetter => "nol",
            ApplicationKind::Attestation => "attestation",
            ApplicationKind::Appointment => "appointment",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ApplicationKind::EmergencyTravelCertificate => "Emergency Travel Certificate",
            ApplicationKind::NoObjectionLetter => "No-Objection Letter",
            ApplicationKind::Attestation => "Document Attestation",
            ApplicationKind::Appointment => "Appointment Scheduling",
        }
    }

    pub fn reference_prefix(&self) -> &'static str {
        match self {
            ApplicationKind::EmergencyTravelCertificate => "ETC",
            ApplicationKind::NoObjectionLetter => "NOL",
            ApplicationKind::Attestation => "ATT",
            ApplicationKind::Appointment => "APT",
        }
    }
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_id())
    }
}

impl FromStr for ApplicationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ApplicationKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_id() == wanted)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown application '{}' (expected one of: etc, nol, attestation, appointment)",
                    s.trim()
                )
            })
    }
}

/// How the rendering layer should present and edit a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// `YYYY-MM-DD`
    Date,
    /// `HH:MM`
    Time,
    Flag,
    Choice(&'static [(&'static str, &'static str)]),
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { key, label, kind }
    }
}

pub trait Application: FormRecord + Default + fmt::Debug + 'static {
    const KIND: ApplicationKind;

    fn steps() -> Vec<StepDefinition<Self>>;

    /// Fields shown on `step_id`, in display order.
    fn fields(step_id: &str) -> &'static [FieldSpec];

    fn prefill(&mut self, profile: &CitizenProfile);

    /// Fully completed sample data, used by the smoke modes.
    fn sample() -> Self;

    fn engine() -> Result<WizardEngine<Self>, WizardError> {
        WizardEngine::new(
            Self::KIND.as_id(),
            Self::KIND.reference_prefix(),
            Self::steps(),
        )
    }

    fn start(profile: Option<&CitizenProfile>) -> Result<WizardState<Self>, WizardError> {
        let mut form = Self::default();
        if let Some(profile) = profile {
            form.prefill(profile);
        }
        Ok(Self::engine()?.initialize(form))
    }
}

pub(crate) fn expect_choice<C>(
    key: &str,
    value: FieldValue,
    parse: fn(&str) -> Option<C>,
) -> Result<Option<C>, FieldError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Text(s) if s.trim().is_empty() => Ok(None),
        FieldValue::Text(s) => parse(&s).map(Some).ok_or(FieldError::InvalidChoice {
            key: key.to_string(),
            value: s,
        }),
        _ => Err(FieldError::TypeMismatch {
            key: key.to_string(),
            expected: "choice",
        }),
    }
}

pub(crate) fn choice_value(id: Option<&'static str>) -> FieldValue {
    id.map(FieldValue::text).unwrap_or(FieldValue::Null)
}

pub(crate) fn file_value(file: &Option<FileRef>) -> FieldValue {
    file.clone().map(FieldValue::File).unwrap_or(FieldValue::Null)
}

/// Placeholder attachment for sample data; nothing is read from disk.
pub(crate) fn sample_attachment(file_name: &str) -> FileRef {
    FileRef {
        file_name: file_name.to_string(),
        size_bytes: 0,
        sha256: String::new(),
        path: PathBuf::from("samples").join(file_name),
    }
}

pub(crate) fn unknown(key: &str) -> FieldError {
    FieldError::UnknownField(key.to_string())
}
