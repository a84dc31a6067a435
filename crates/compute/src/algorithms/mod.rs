pub mod scaling;

#[cfg(feature = "ml")]
pub mod isolation_forest;
#[cfg(feature = "ml")]
pub mod lof;
