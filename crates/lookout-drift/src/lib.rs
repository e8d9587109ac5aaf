//! Dataset drift detection
//!
//! A candidate batch is compared feature by feature against a frozen
//! reference batch. Continuous features use the two-sample
//! Kolmogorov-Smirnov test, discrete features a chi-squared test of
//! independence over their code counts. Drift is declared when any p-value
//! falls below the Bonferroni-corrected threshold.

pub mod detector;
pub mod reference;
pub mod stats;

pub use detector::{DEFAULT_GLOBAL_P_VALUE, DriftDetector};
pub use reference::DriftReference;
pub use stats::{KsTest, chi2_contingency, ks_2samp};
