use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub clinic_offset: FixedOffset,
}

/* -------------------------
   API envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

/* -------------------------
   Enums (smallint in DB)
--------------------------*/

/// 0 admin, 1 manager, 2 supervisor, 3 front desk, 4 doctor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum Role {
    Admin = 0,
    Manager = 1,
    Supervisor = 2,
    FrontDesk = 3,
    Doctor = 4,
}

impl Role {
    pub fn manages_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    pub fn books_appointments(self) -> bool {
        !matches!(self, Role::Doctor)
    }
}

/// Set by staff through the status selector; any value may follow any other.
///
/// The usual flow is scheduled -> confirmed -> completed, with cancelled and
/// no_show as the other outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum AppointmentStatus {
    Scheduled = 0,
    Confirmed = 1,
    Cancelled = 2,
    Completed = 3,
    NoShow = 4,
}

/* -------------------------
   Rows
--------------------------*/

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrganizationRow {
    pub organization_id: Uuid,
    pub name: String,
    pub tax_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UnitRow {
    pub unit_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
    pub visit_duration_min: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProfileRow {
    pub profile_id: Uuid,
    pub auth_user_id: Option<Uuid>,
    pub organization_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub current_unit_id: Option<Uuid>,
    pub default_unit_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DoctorRow {
    pub doctor_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub license_number: Option<String>,
    pub specialty_id: Option<Uuid>,
    pub profile_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DoctorWithSpecialty {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub doctor: DoctorRow,
    pub specialty_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PatientRow {
    pub patient_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub document: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Shared shape of the per-organization lookup tables
/// (specialties, appointment types, insurers).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CatalogRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InsurancePlanRow {
    pub plan_id: Uuid,
    pub insurer_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub organization_id: Uuid,
    pub unit_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type_id: Option<Uuid>,
    pub insurer_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub fit_in: bool,
    pub booked_by_id: Option<Uuid>,
}

/// Appointment with its patient, doctor and lookup names already joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AgendaAppointment {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub doctor_name: String,
    pub appointment_type_name: Option<String>,
    pub insurer_name: Option<String>,
    pub plan_name: Option<String>,
}

impl AsRef<Appointment> for Appointment {
    fn as_ref(&self) -> &Appointment {
        self
    }
}

impl AsRef<Appointment> for AgendaAppointment {
    fn as_ref(&self) -> &Appointment {
        &self.appointment
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScheduleConfigRow {
    pub config_id: Uuid,
    pub doctor_id: Uuid,
    pub unit_id: Uuid,
    /// 0 = Sunday
    pub weekday: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub visit_duration_min: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ScheduleBlock {
    pub block_id: Uuid,
    pub organization_id: Uuid,
    pub unit_id: Uuid,
    /// None blocks the whole unit.
    pub doctor_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/* -------------------------
   Helpers
--------------------------*/

/// For PATCH bodies: absent => None, null => Some(None), value => Some(Some(v)).
pub fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/// Trims and drops empty strings.
pub fn clean(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

pub fn required(field: &str, s: &str) -> Result<String, crate::error::ApiError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::error::ApiError::validation(format!("{field} is required")));
    }
    if s.len() > 200 {
        return Err(crate::error::ApiError::validation(format!(
            "{field} is too long (max 200)"
        )));
    }
    Ok(s.to_string())
}
