// =============================================================================
// Proxima Backend Constants
// =============================================================================
// This file contains all constants used throughout the backend to enable
// easy tuning and configuration from a single location.

// =============================================================================
// ELIGIBILITY SCANNING
// =============================================================================

/// Trailing window (days) in which encounters count toward eligibility
pub const DEFAULT_ENCOUNTER_WINDOW_DAYS: i64 = 14;

/// Minimum encounters within the window before a pair qualifies
pub const DEFAULT_MIN_ENCOUNTER_COUNT: i64 = 3;

// =============================================================================
// CONNECTION REQUESTS
// =============================================================================

/// How long (in days) a connection request stays open before it expires
pub const REQUEST_EXPIRY_DAYS: i64 = 30;

// =============================================================================
// MESSAGING
// =============================================================================

/// Maximum message length after trimming
pub const MESSAGE_MAX_CHARS: usize = 5000;

/// Characters of a message kept as the conversation's feed preview
pub const MESSAGE_PREVIEW_CHARS: usize = 100;

/// Default page size when fetching chat history
pub const DEFAULT_MESSAGE_PAGE_SIZE: i64 = 50;

// =============================================================================
// USER PROFILES
// =============================================================================

/// Maximum display name length
pub const NAME_MAX_CHARS: usize = 255;

/// Maximum pronouns length
pub const PRONOUNS_MAX_CHARS: usize = 50;

/// Maximum bio length
pub const BIO_MAX_CHARS: usize = 500;

/// Default page size when listing users
pub const DEFAULT_USER_PAGE_SIZE: i64 = 50;

// =============================================================================
// ENCOUNTER FEED
// =============================================================================

/// Maximum encounters returned for a single user's feed
pub const ENCOUNTER_FEED_LIMIT: i64 = 100;

/// Format used to truncate encounter timestamps to their minute bucket
pub const MINUTE_BUCKET_FORMAT: &str = "%Y-%m-%dT%H:%M";

// =============================================================================
// REQUEST SWEEPER
// =============================================================================

/// How often the request sweeper wakes up
pub const SWEEPER_INTERVAL_SECS: u64 = 60;

// =============================================================================
// SERVER CONFIGURATION
// =============================================================================

/// Default server port if not specified in environment
pub const DEFAULT_SERVER_PORT: u16 = 3000;
