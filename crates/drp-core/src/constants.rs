//! Protocol constants for the DRP core.

/// Policy engine: base weight per evidence kind.
pub const WEIGHT_LEARNING: f64 = 0.25;
pub const WEIGHT_RENEWABLE_ENERGY: f64 = 0.40;
pub const WEIGHT_HEALTHCARE: f64 = 0.20;
pub const WEIGHT_CIVIC_WORK: f64 = 0.15;
/// Weight for any evidence kind outside the known set.
pub const WEIGHT_DEFAULT: f64 = 0.05;

/// Cap on the renewable-energy kWh bonus.
pub const ENERGY_BONUS_CAP: f64 = 0.3;
/// Divisor applied to `energy_kwh` before capping.
pub const ENERGY_BONUS_DIVISOR: f64 = 100.0;
/// Flat bonus for evidence carrying at least one proof.
pub const PROOF_BONUS: f64 = 0.10;

/// Claims older than this incur the recency penalty.
pub const RECENCY_WINDOW_SECS: i64 = 90 * 24 * 3600;
pub const RECENCY_PENALTY: f64 = 0.1;

/// Verdict thresholds. Ties go to the higher-severity bucket.
pub const APPROVE_THRESHOLD: f64 = 0.60;
pub const REVIEW_THRESHOLD: f64 = 0.35;

/// Confidence threshold baked into the placeholder proof artifact.
pub const ZK_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Length of a decision id (hex characters).
pub const DECISION_ID_HEX_LEN: usize = 16;
/// Length of a public-key fingerprint (hex characters of SHA-256).
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Reputation bookkeeping for committee members.
pub const REPUTATION_START: f64 = 1.0;
pub const REPUTATION_REWARD: f64 = 0.01;
pub const REPUTATION_PENALTY: f64 = 0.02;
pub const REPUTATION_FLOOR: f64 = 0.1;

/// Retry policy for idempotent infrastructure reads.
pub const RETRY_ATTEMPTS: u32 = 3;
pub const RETRY_BASE_DELAY_MS: u64 = 100;
/// Each retry multiplies the delay by this factor (100 → 400 → 1600 ms).
pub const RETRY_BACKOFF_FACTOR: u64 = 4;
/// Jitter applied to each delay, as a percentage of the delay.
pub const RETRY_JITTER_PCT: u64 = 25;

/// Maximum page size for listing queries.
pub const MAX_PAGE_LIMIT: u32 = 200;
