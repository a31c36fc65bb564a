//! Common test fixtures for DINI-like forecast data.

/// Analysis times.
pub mod times {
    /// Default analysis time of the CLI.
    pub const ANALYSIS_TIME: &str = "2025-02-17T01:00:00Z";

    /// Run directory name for [`ANALYSIS_TIME`].
    pub const RUN_DIR: &str = "2025-02-17T0100Z";

    /// Store path component for [`ANALYSIS_TIME`].
    pub const STORE_TIME: &str = "2025-02-17T010000Z";
}

/// Vertical levels reported by the DINI model.
pub mod levels {
    pub const PRESSURE_HPA: [f64; 14] = [
        1000.0, 950.0, 925.0, 900.0, 850.0, 800.0, 700.0, 600.0, 500.0, 400.0, 300.0, 250.0,
        200.0, 100.0,
    ];

    /// Heights above ground of the generic `u`/`v` fields, including the
    /// two that only hold missing values.
    pub const WIND_HEIGHTS_M: [f64; 5] = [10.0, 50.0, 100.0, 150.0, 250.0];

    /// Heights above ground of the generic `t` field.
    pub const TEMPERATURE_HEIGHTS_M: [f64; 6] = [0.0, 2.0, 50.0, 100.0, 150.0, 250.0];
}

/// Small grid dimensions that split evenly in two.
pub mod grids {
    pub const NY: usize = 4;
    pub const NX: usize = 6;
    pub const STEPS: usize = 3;
}
