pub mod config;
pub mod dataset;
pub mod error;
pub mod finding;
pub mod pattern;
pub mod profile;
pub mod stats;
pub mod value;

pub use config::{load_dotenv, DetectionConfig, SeverityOrder};
pub use dataset::{Column, Dataset};
pub use error::{CoreError, Result};
pub use finding::{AnomalyResult, AnomalyStatus, AnomalyType, DetectionMethod, Severity};
pub use pattern::{AnomalyPattern, ThresholdRule, ThresholdType, ThresholdValue, Violation};
pub use profile::{BehaviorProfile, ProfilePeriod};
pub use value::{DetectionInput, FieldValue, Record};
