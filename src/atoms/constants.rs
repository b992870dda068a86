// ── AgentDeck Atoms: Constants ─────────────────────────────────────────────
// All named constants for the crate live here.

// ── Update engine concurrency ─────────────────────────────────────────────
// Ceiling on simultaneous remote lookups across check and update batches.
pub const MAX_CONCURRENT_REQUESTS: usize = 5;

// ── GitHub quota facts ────────────────────────────────────────────────────
// Facts about the remote service. Nothing in the engine enforces them; they
// only shape user-facing warnings.
pub const UNAUTHENTICATED_HOURLY_QUOTA: u32 = 60;
pub const AUTHENTICATED_HOURLY_QUOTA: u32 = 5000;

/// Remaining-quota level below which the rate governor starts warning.
pub const LOW_QUOTA_THRESHOLD: u32 = 10;

// ── HTTP defaults ─────────────────────────────────────────────────────────
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
/// Raw file host; downloads here are not charged to the REST quota.
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_USER_AGENT: &str = "AgentDeck/0.1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

// ── Engine config keys ────────────────────────────────────────────────────
// Keys into the `engine_config` key/value table. Treat as stable identifiers.
pub(crate) const UPDATER_CONFIG_KEY: &str = "updater_config";
pub(crate) const GITHUB_TOKEN_KEY: &str = "github_pat";

// ── Token vault keychain identifiers ──────────────────────────────────────
// Changing either value makes an existing stored token undecryptable.
pub(crate) const TOKEN_VAULT_SERVICE: &str = "agentdeck-token-vault";
pub(crate) const TOKEN_VAULT_USER: &str = "encryption-key";

/// Prefix marking an encrypted value in `engine_config`.
pub(crate) const ENC_PREFIX: &str = "enc:";
