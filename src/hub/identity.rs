use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const SESSION_ID_PREFIX: &str = "player_";

const ADJECTIVES: [&str; 10] = [
    "Swift", "Brave", "Quiet", "Clever", "Mighty", "Lucky", "Gentle", "Fierce", "Wise", "Bold",
];

const NOUNS: [&str; 10] = [
    "Fox", "Bear", "Wolf", "Hawk", "Otter", "Raven", "Stag", "Lynx", "Badger", "Heron",
];

/// Process-local counter; makes ids unique even within one millisecond
static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Generate session ID: player_{connect_ms}_{counter}
///
/// Unique for the lifetime of the process, not across restarts.
pub fn next_session_id(now: DateTime<Utc>) -> String {
    let n = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
    format!("{}{}_{}", SESSION_ID_PREFIX, now.timestamp_millis(), n)
}

/// Generate display name: {Adjective}{Noun}{0..99}
///
/// Collisions are possible and tolerated.
pub fn generate_display_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let number: u32 = rng.gen_range(0..99);
    format!("{}{}{}", adjective, noun, number)
}
