// --- File: crates/carebook_booking/src/engine.rs ---
//! The booking engine and its read-side operations.
//!
//! Admission lives in [`crate::admission`], confirmation in [`crate::resolver`].

use carebook_availability::{expand_therapist_availability, merge_availability};
use carebook_common::models::{
    Appointment, AppointmentId, AppointmentState, AvailabilityQuery, AvailableRange, DateWindow,
    KindFilter, Therapist, TherapistId, TherapistSelector,
};
use carebook_common::{
    log_error, log_result, not_found, validation_error, BookingError, BookingNotifier, Clock,
    LocalSessionCreator, LogNotifier, SessionCreator, SystemClock,
};
use carebook_config::{AppConfig, SchedulingConfig};
use carebook_db::{
    AppointmentRepository, ClientDirectory, InMemoryStore, SlotRepository, SqlStorage,
    TherapistDirectory,
};
use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// The storage roles the engine reads and writes through.
#[derive(Clone)]
pub struct Repositories {
    pub slots: Arc<dyn SlotRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub therapists: Arc<dyn TherapistDirectory>,
    pub clients: Arc<dyn ClientDirectory>,
}

impl Repositories {
    pub fn sql(storage: &SqlStorage) -> Self {
        Self {
            slots: Arc::new(storage.slots.clone()),
            appointments: Arc::new(storage.appointments.clone()),
            therapists: Arc::new(storage.directory.clone()),
            clients: Arc::new(storage.directory.clone()),
        }
    }

    pub fn in_memory(store: &InMemoryStore) -> Self {
        Self {
            slots: Arc::new(store.clone()),
            appointments: Arc::new(store.clone()),
            therapists: Arc::new(store.clone()),
            clients: Arc::new(store.clone()),
        }
    }
}

/// Computes availability, admits appointments and resolves confirmation conflicts.
///
/// Collaborators default to [`LocalSessionCreator`], [`LogNotifier`] and [`SystemClock`];
/// replace them with the `with_*` methods.
#[derive(Clone)]
pub struct BookingEngine {
    pub(crate) slots: Arc<dyn SlotRepository>,
    pub(crate) appointments: Arc<dyn AppointmentRepository>,
    pub(crate) therapists: Arc<dyn TherapistDirectory>,
    pub(crate) clients: Arc<dyn ClientDirectory>,
    /// When unset, a [`LocalSessionCreator`] on the engine's clock
    pub(crate) sessions: Option<Arc<dyn SessionCreator>>,
    pub(crate) notifier: Arc<dyn BookingNotifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) scheduling: SchedulingConfig,
}

impl BookingEngine {
    /// Build an engine over `repositories`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] if `scheduling` fails
    /// [`SchedulingConfig::validate`].
    pub fn new(
        repositories: Repositories,
        scheduling: SchedulingConfig,
    ) -> Result<Self, BookingError> {
        scheduling.validate().map_err(validation_error)?;
        Ok(Self {
            slots: repositories.slots,
            appointments: repositories.appointments,
            therapists: repositories.therapists,
            clients: repositories.clients,
            sessions: None,
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            scheduling,
        })
    }

    /// Connect to the configured database, create the schema and build an engine over it.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Infrastructure`] if the database section is missing or
    /// the database cannot be reached, [`BookingError::Validation`] for an unusable
    /// scheduling section.
    pub async fn from_config(config: &AppConfig) -> Result<Self, BookingError> {
        let storage = log_result(
            SqlStorage::connect(config).await,
            "[Engine] Storage connected",
            "[Engine] Failed to connect storage",
        )?;
        log_result(
            storage.init_schema().await,
            "[Engine] Schema ready",
            "[Engine] Failed to initialize schema",
        )?;
        info!("[Engine] Booking engine ready on {}", storage.db_client);
        Self::new(Repositories::sql(&storage), config.scheduling.clone())
    }

    pub fn with_session_creator(mut self, sessions: Arc<dyn SessionCreator>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn BookingNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn session_creator(&self) -> Arc<dyn SessionCreator> {
        match &self.sessions {
            Some(sessions) => Arc::clone(sessions),
            None => Arc::new(LocalSessionCreator::new(Arc::clone(&self.clock))),
        }
    }

    pub fn scheduling(&self) -> &SchedulingConfig {
        &self.scheduling
    }

    pub(crate) fn min_bookable(&self) -> Duration {
        Duration::minutes(self.scheduling.min_bookable_minutes)
    }

    /// Bookable ranges for the selected therapists over the query window.
    ///
    /// Without a window the query covers `default_window_days` starting today (UTC).
    pub async fn find_availability(
        &self,
        query: AvailabilityQuery,
    ) -> Result<Vec<AvailableRange>, BookingError> {
        let now = self.clock.now();
        let window = self.resolve_window(query.window, now)?;

        let therapists = match &query.selector {
            TherapistSelector::BySpecialization {
                specialization,
                language,
            } => self
                .therapists
                .find_by_specialization(specialization, language)
                .await
                .map_err(|e| infrastructure("[Engine] Therapist lookup failed", e))?,
            TherapistSelector::ByIds(ids) => {
                if ids.is_empty() || ids.iter().any(|id| id.is_nil()) {
                    return Err(validation_error("therapist ids must be non-empty and non-nil"));
                }
                self.therapists
                    .find_by_ids(ids)
                    .await
                    .map_err(|e| infrastructure("[Engine] Therapist lookup failed", e))?
            }
        };
        if therapists.is_empty() {
            debug!("[Engine] No therapist matches {:?}", query.selector);
            return Ok(Vec::new());
        }

        let ranges = self
            .availability_for(&therapists, window.start_date, window.end_date, now)
            .await?;
        debug!(
            "[Engine] {} range(s) for {} therapist(s) over {} - {}",
            ranges.len(),
            therapists.len(),
            window.start_date,
            window.end_date
        );
        Ok(ranges)
    }

    /// Expands and merges the availability of `therapists` over `[start_date, end_date]`.
    pub(crate) async fn availability_for(
        &self,
        therapists: &[Therapist],
        start_date: NaiveDate,
        end_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<AvailableRange>, BookingError> {
        let ids: Vec<TherapistId> = therapists.iter().map(|t| t.id).collect();

        let slots = self
            .slots
            .active_slots_for_therapists(&ids)
            .await
            .map_err(|e| infrastructure("[Engine] Loading recurring slots failed", e))?;

        let (from, to) = appointment_window(start_date, end_date)?;
        let confirmed = self
            .appointments
            .appointments_in_range(
                &ids,
                from,
                to,
                &[AppointmentState::Confirmed],
                KindFilter::Any,
            )
            .await
            .map_err(|e| infrastructure("[Engine] Loading appointments failed", e))?;

        let mut slots_by_therapist: HashMap<TherapistId, Vec<_>> = HashMap::new();
        for slot in slots {
            slots_by_therapist.entry(slot.therapist_id).or_default().push(slot);
        }
        let mut booked_by_therapist: HashMap<TherapistId, Vec<Appointment>> = HashMap::new();
        for appointment in confirmed {
            booked_by_therapist
                .entry(appointment.therapist_id)
                .or_default()
                .push(appointment);
        }

        let min_bookable = self.min_bookable();
        let free: Vec<_> = therapists
            .iter()
            .flat_map(|therapist| {
                expand_therapist_availability(
                    therapist,
                    slots_by_therapist
                        .get(&therapist.id)
                        .map(Vec::as_slice)
                        .unwrap_or_default(),
                    booked_by_therapist
                        .get(&therapist.id)
                        .map(Vec::as_slice)
                        .unwrap_or_default(),
                    start_date,
                    end_date,
                    now,
                    min_bookable,
                )
            })
            .collect();

        Ok(merge_availability(&free, min_bookable))
    }

    fn resolve_window(
        &self,
        window: Option<DateWindow>,
        now: DateTime<Utc>,
    ) -> Result<DateWindow, BookingError> {
        let window = match window {
            Some(window) => window,
            None => {
                let today = now.date_naive();
                // default_window_days is validated positive and bounded
                let extra = Days::new((self.scheduling.default_window_days - 1) as u64);
                DateWindow {
                    start_date: today,
                    end_date: today
                        .checked_add_days(extra)
                        .ok_or_else(|| past_calendar_end(today))?,
                }
            }
        };

        if window.end_date < window.start_date {
            return Err(validation_error(format!(
                "window end {} is before its start {}",
                window.end_date, window.start_date
            )));
        }
        if window.days() > self.scheduling.max_window_days {
            return Err(validation_error(format!(
                "window spans {} days, at most {} allowed",
                window.days(),
                self.scheduling.max_window_days
            )));
        }
        appointment_window(window.start_date, window.end_date)?;
        Ok(window)
    }

    /// The appointment with `id`
    pub async fn get_appointment(&self, id: AppointmentId) -> Result<Appointment, BookingError> {
        self.appointments
            .find_appointment(id)
            .await
            .map_err(|e| infrastructure("[Engine] Loading appointment failed", e))?
            .ok_or_else(|| not_found(format!("appointment {id}")))
    }

    /// Cancel a pending or confirmed appointment.
    ///
    /// The update is conditional on the state read just before; a concurrent change
    /// surfaces as [`BookingError::InvalidStateTransition`].
    pub async fn cancel_appointment(&self, id: AppointmentId) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(id).await?;
        let target = appointment.state.transition_to(AppointmentState::Cancelled)?;

        let updated = self
            .appointments
            .update_state(id, appointment.state, target)
            .await
            .map_err(|e| infrastructure("[Engine] Cancelling appointment failed", e))?;
        if !updated {
            let current = self.get_appointment(id).await?;
            debug!(
                "[Engine] Appointment {} changed to {} before it could be cancelled",
                id, current.state
            );
            return Err(BookingError::InvalidStateTransition {
                from: current.state,
                to: target,
            });
        }

        info!("[Engine] Cancelled appointment {}", id);
        Ok(Appointment {
            state: target,
            ..appointment
        })
    }
}

/// Midnight of `start_date` through midnight two days after `end_date`: every
/// appointment that can touch a slot of the window, since slots of the last day may
/// run up to 24h past its midnight.
pub(crate) fn appointment_window(
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<(DateTime<Utc>, DateTime<Utc>), BookingError> {
    let to = end_date
        .checked_add_days(Days::new(2))
        .ok_or_else(|| past_calendar_end(end_date))?;
    Ok((
        start_date.and_time(NaiveTime::MIN).and_utc(),
        to.and_time(NaiveTime::MIN).and_utc(),
    ))
}

pub(crate) fn past_calendar_end(date: NaiveDate) -> BookingError {
    validation_error(format!("{date} is too close to the end of the calendar"))
}

/// Converts a storage error, logging it when it is an infrastructure failure.
pub(crate) fn infrastructure(context: &str, error: carebook_db::DbError) -> BookingError {
    let error = BookingError::from(error);
    if !error.kind().is_business_outcome() {
        log_error(&error, context);
    }
    error
}
