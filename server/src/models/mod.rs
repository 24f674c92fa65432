pub mod cardiology;
pub mod dialysis;
pub mod error;
pub mod gastroenterology;
pub mod neurology;
pub mod obgyn;
pub mod oncology;
pub mod ophthalmology;
pub mod orthopedics;
pub mod patient;
pub mod pediatrics;
pub mod pulmonology;
pub mod record;
pub mod response;
pub mod specimen;

pub use cardiology::CardiologyRecord;
pub use dialysis::{DialysisRecord, DialysisType};
pub use error::{ApiError, FieldError};
pub use gastroenterology::GastroenterologyRecord;
pub use neurology::NeurologyRecord;
pub use obgyn::{ObgynRecord, ObgynVisitType};
pub use oncology::{OncologyRecord, TreatmentStatus};
pub use ophthalmology::OphthalmologyRecord;
pub use orthopedics::OrthopedicsRecord;
pub use patient::{Gender, Patient, PatientStatus};
pub use pediatrics::PediatricsRecord;
pub use pulmonology::PulmonologyRecord;
pub use record::{ClinicalRecord, Validator, VisitStatus};
pub use response::{ApiResponse, ErrorResponse, PaginatedResponse, Pagination};
pub use specimen::{Specimen, SpecimenPriority, SpecimenStatus};

/// Patient-linked modules as (`/api` path segment, table)
pub const PATIENT_MODULES: &[(&str, &str)] = &[
    ("cardiology", CardiologyRecord::TABLE),
    ("oncology", OncologyRecord::TABLE),
    ("neurology", NeurologyRecord::TABLE),
    ("obgyn", ObgynRecord::TABLE),
    ("pediatrics", PediatricsRecord::TABLE),
    ("gastroenterology", GastroenterologyRecord::TABLE),
    ("pulmonology", PulmonologyRecord::TABLE),
    ("orthopedics", OrthopedicsRecord::TABLE),
    ("ophthalmology", OphthalmologyRecord::TABLE),
    ("dialysis", DialysisRecord::TABLE),
    ("specimens", Specimen::TABLE),
];
