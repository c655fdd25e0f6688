// src/config/constants.rs
//! System-wide configuration constants

/// Acquisition and line-protocol constants
pub mod acquisition {
    /// Number of EMG channels carried by every sample
    pub const CHANNEL_COUNT: usize = 3;
    pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 1000;
    pub const DEFAULT_WINDOW_SIZE: usize = 100;
    pub const DEFAULT_BATCH_SIZE: usize = 100;
    pub const DEFAULT_READ_TIMEOUT_MS: u32 = 1000;
    pub const DEFAULT_IDLE_SLEEP_US: u64 = 500;
    pub const DEFAULT_BAUD_RATE: u32 = 115200;

    pub const MAX_WINDOW_SIZE: usize = 65_536;
    pub const MAX_BATCH_SIZE: usize = 100_000;

    /// Field separator of the ASCII line protocol
    pub const FIELD_SEPARATOR: char = ',';
    /// `onset,CH1,CH2,CH3`
    pub const FIELDS_WITH_ONSET: usize = CHANNEL_COUNT + 1;
    /// `CH1,CH2,CH3`
    pub const FIELDS_WITHOUT_ONSET: usize = CHANNEL_COUNT;
    /// Upper bound on a single line before it is discarded as garbage
    pub const MAX_LINE_BYTES: usize = 256;
}

/// Threshold classifier defaults
pub mod classifier {
    pub const DEFAULT_REST_LABEL: &str = "Reposo";

    // Wrist flexor (radial): raise wrist
    pub const DEFAULT_CH1_THRESHOLD: f32 = 15.0;
    pub const DEFAULT_CH1_LABEL: &str = "Arriba";
    // CH2 (finger extensor, "Mano abierta") has no default rule
    // Finger flexor: fist / wrist down
    pub const DEFAULT_CH3_THRESHOLD: f32 = 25.0;
    pub const DEFAULT_CH3_LABEL: &str = "Abajo";
}

/// Envelope extraction constants
pub mod conditioning {
    pub const DEFAULT_CUTOFF_HZ: f64 = 150.0;
    pub const DEFAULT_FILTER_ORDER: usize = 2;
    pub const MIN_FILTER_ORDER: usize = 1;
    pub const MAX_FILTER_ORDER: usize = 8;

    /// 10-bit ADC with a 5 V reference
    pub const DEFAULT_ADC_SCALE: f64 = 5.0 / 1023.0;

    /// Edge padding of the zero-phase filter, in multiples of the coefficient count
    pub const EDGE_PAD_FACTOR: usize = 3;
}

/// Reference capture naming
pub mod references {
    pub const DEFAULT_MVC_PREFIXES: &[&str] = &["CVM", "MVC"];
    pub const DEFAULT_REST_PATTERN: &str = "Reposo";
}

/// Quality analysis constants
pub mod quality {
    pub const DEFAULT_WELCH_SEGMENT_LEN: usize = 256;
    pub const MIN_WELCH_SEGMENT_LEN: usize = 8;
    /// Everything above this frequency counts as noise in the spectral SNR
    pub const DEFAULT_NOISE_CUTOFF_HZ: f64 = 60.0;
    pub const DEFAULT_MAGNITUDE_FLOOR_DB: f64 = -200.0;
    pub const PERCENT: f64 = 100.0;
}

/// Configuration file discovery
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "emg.toml";
    pub const ENV_PREFIX: &str = "EMG";
    pub const ENV_SEPARATOR: &str = "__";
}

pub use acquisition::CHANNEL_COUNT;
