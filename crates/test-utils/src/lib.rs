//! Shared test utilities for the forecast Zarr creator workspace.
//!
//! - Test data path helpers and skip macros for optional sample files
//! - Synthetic field generators
//! - DINI-like fixtures
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Skip a test if the required file is not found.
///
/// ```ignore
/// use test_utils::require_test_file;
///
/// #[test]
/// fn test_reads_sample() {
///     let path = require_test_file!("dini_sample.grib2");
///     // Test code using path...
/// }
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Approximate floating-point equality.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that an iterator of `f32` holds no missing values.
///
/// ```ignore
/// use test_utils::assert_no_missing;
///
/// assert_no_missing!(field.values.iter());
/// ```
#[macro_export]
macro_rules! assert_no_missing {
    ($values:expr) => {{
        let missing = $values.into_iter().filter(|v: &&f32| v.is_nan()).count();
        if missing > 0 {
            panic!("assertion failed: {} missing values", missing);
        }
    }};
}
