// --- File: crates/carebook_common/src/models.rs ---
//! Domain models shared by the availability engine, the booking engine and storage.
//!
//! Every instant is UTC. Client timezones travel along as display hints only.

use crate::error::{validation_error, BookingError};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type TherapistId = Uuid;
pub type ClientId = Uuid;
pub type SlotId = Uuid;
pub type AppointmentId = Uuid;

const MINUTES_PER_DAY: i64 = 24 * 60;
/// Upper bound for advance notice and post-session break
const MAX_BUFFER_MINUTES: i64 = 366 * MINUTES_PER_DAY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Therapist {
    pub id: TherapistId,
    pub display_name: String,
    pub specializations: Vec<String>,
    pub languages: Vec<String>,
}

/// A therapist's weekly-repeating availability window, defined in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringSlot {
    pub id: SlotId,
    pub therapist_id: TherapistId,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    /// Booking closes this many minutes before the slot starts.
    pub advance_notice_minutes: i64,
    /// Appended after every booking taken in this slot.
    pub post_session_break_minutes: i64,
    pub active: bool,
}

impl RecurringSlot {
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes)
    }

    pub fn advance_notice(&self) -> Duration {
        Duration::minutes(self.advance_notice_minutes)
    }

    pub fn post_session_break(&self) -> Duration {
        Duration::minutes(self.post_session_break_minutes)
    }

    /// Absolute `[start, end)` of this slot on `date`.
    pub fn materialize(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = date.and_time(self.start_time).and_utc();
        (start, start + self.duration())
    }

    /// Duration must be in `(0, 24h]` and buffers within `[0, 366 days]`.
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.duration_minutes <= 0 || self.duration_minutes > MINUTES_PER_DAY {
            return Err(validation_error(format!(
                "slot {} has duration {} minutes, expected 1..={}",
                self.id, self.duration_minutes, MINUTES_PER_DAY
            )));
        }
        let buffers = [self.advance_notice_minutes, self.post_session_break_minutes];
        if buffers.iter().any(|b| !(0..=MAX_BUFFER_MINUTES).contains(b)) {
            return Err(validation_error(format!(
                "slot {} has a buffer outside 0..={} minutes",
                self.id, MAX_BUFFER_MINUTES
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentState {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentState {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentState::Pending => "pending",
            AppointmentState::Confirmed => "confirmed",
            AppointmentState::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, target: AppointmentState) -> bool {
        matches!(
            (self, target),
            (AppointmentState::Pending, AppointmentState::Confirmed)
                | (AppointmentState::Pending, AppointmentState::Cancelled)
                | (AppointmentState::Confirmed, AppointmentState::Cancelled)
        )
    }

    /// Returns `target` if the state machine allows moving there from `self`.
    pub fn transition_to(self, target: AppointmentState) -> Result<AppointmentState, BookingError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(BookingError::InvalidStateTransition {
                from: self,
                to: target,
            })
        }
    }
}

impl fmt::Display for AppointmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AppointmentState::Pending),
            "confirmed" => Ok(AppointmentState::Confirmed),
            "cancelled" => Ok(AppointmentState::Cancelled),
            other => Err(format!("unknown appointment state '{other}'")),
        }
    }
}

/// Whether an appointment was booked against a recurring slot or outside of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppointmentKind {
    Regular { slot_id: SlotId },
    AdHoc,
}

impl AppointmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentKind::Regular { .. } => "regular",
            AppointmentKind::AdHoc => "adhoc",
        }
    }

    pub fn slot_id(&self) -> Option<SlotId> {
        match self {
            AppointmentKind::Regular { slot_id } => Some(*slot_id),
            AppointmentKind::AdHoc => None,
        }
    }
}

/// Selects appointment kinds in repository queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Regular,
    AdHoc,
    Any,
}

impl KindFilter {
    pub fn matches(self, kind: &AppointmentKind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Regular => matches!(kind, AppointmentKind::Regular { .. }),
            KindFilter::AdHoc => matches!(kind, AppointmentKind::AdHoc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub therapist_id: TherapistId,
    pub client_id: ClientId,
    pub kind: AppointmentKind,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    /// IANA name of the client's timezone. Display only.
    pub client_timezone: Option<String>,
    pub state: AppointmentState,
}

impl Appointment {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(self.duration_minutes)
    }
}

/// An appointment as stored. Rows written before durations were recorded carry none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAppointment {
    pub id: AppointmentId,
    pub therapist_id: TherapistId,
    pub client_id: ClientId,
    pub kind: AppointmentKind,
    pub start: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub client_timezone: Option<String>,
    pub state: AppointmentState,
}

impl StoredAppointment {
    /// Resolves a missing duration to `default_minutes`. This is the only place the
    /// legacy fallback is applied.
    pub fn resolve(self, default_minutes: i64) -> Appointment {
        Appointment {
            id: self.id,
            therapist_id: self.therapist_id,
            client_id: self.client_id,
            kind: self.kind,
            start: self.start,
            duration_minutes: self.duration_minutes.unwrap_or(default_minutes),
            client_timezone: self.client_timezone,
            state: self.state,
        }
    }
}

/// Input for persisting a new pending appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub therapist_id: TherapistId,
    pub client_id: ClientId,
    pub kind: AppointmentKind,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub client_timezone: Option<String>,
}

/// A therapist listed on an [`AvailableRange`], with the slot the time belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableTherapist {
    pub therapist_id: TherapistId,
    pub display_name: String,
    pub slot_id: SlotId,
}

/// A computed `[start, end)` window and the therapists free throughout it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub therapists: Vec<AvailableTherapist>,
}

impl AvailableRange {
    pub fn lists(&self, therapist_id: TherapistId, slot_id: SlotId) -> bool {
        self.therapists
            .iter()
            .any(|t| t.therapist_id == therapist_id && t.slot_id == slot_id)
    }
}

/// Which therapists an availability query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TherapistSelector {
    BySpecialization {
        specialization: String,
        language: String,
    },
    ByIds(Vec<TherapistId>),
}

impl TherapistSelector {
    /// Builds a selector from the two mutually exclusive criteria.
    ///
    /// Exactly one of `specialization` (with `language`) or `therapist_ids` must be given.
    pub fn from_parts(
        specialization: Option<String>,
        language: Option<String>,
        therapist_ids: Option<Vec<TherapistId>>,
    ) -> Result<Self, BookingError> {
        let specialization = specialization.filter(|s| !s.trim().is_empty());
        match (specialization, therapist_ids) {
            (Some(_), Some(_)) => Err(validation_error(
                "specialization and therapist ids are mutually exclusive",
            )),
            (None, None) => Err(validation_error(
                "either a specialization or therapist ids is required",
            )),
            (Some(specialization), None) => {
                let language = language
                    .filter(|l| !l.trim().is_empty())
                    .ok_or_else(|| validation_error("language is required with a specialization"))?;
                Ok(TherapistSelector::BySpecialization {
                    specialization,
                    language,
                })
            }
            (None, Some(ids)) if ids.is_empty() => {
                Err(validation_error("therapist ids must not be empty"))
            }
            (None, Some(ids)) => Ok(TherapistSelector::ByIds(ids)),
        }
    }
}

/// Inclusive range of calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateWindow {
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub selector: TherapistSelector,
    pub window: Option<DateWindow>,
}

/// Request to book a time inside a therapist's recurring slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub therapist_id: TherapistId,
    pub client_id: ClientId,
    pub slot_id: SlotId,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub client_timezone: Option<String>,
}

/// Request to book a time outside any recurring slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdHocBookingRequest {
    pub therapist_id: TherapistId,
    pub client_id: ClientId,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub client_timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub appointment_id: AppointmentId,
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub session_metadata: serde_json::Value,
}

/// The session derived from a confirmed appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub appointment_id: AppointmentId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationOutcome {
    pub appointment: Appointment,
    pub session: SessionRecord,
    /// Pending appointments cancelled because they overlapped the confirmed one.
    pub cancelled: Vec<Appointment>,
}

/// Checks that a client timezone hint, when given, is an IANA zone name.
///
/// The hint is never used for arithmetic.
pub fn validate_timezone_hint(timezone: Option<&str>) -> Result<(), BookingError> {
    match timezone {
        None => Ok(()),
        Some(name) => name
            .parse::<chrono_tz::Tz>()
            .map(|_| ())
            .map_err(|_| validation_error(format!("unknown timezone '{name}'"))),
    }
}
