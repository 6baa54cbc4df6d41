use chrono::Utc;
use rand::Rng;

const PREFIX: &str = "BK";
const SUFFIX_LEN: usize = 4;
// Excludes 0/O/1/I/L.
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Human-readable booking code: timestamp-derived prefix plus a short random
/// suffix, e.g. `BK2603142055XK7Q`. Uniqueness is enforced by the booking
/// ledger's constraint; the coordinator retries with a fresh code on a
/// collision.
pub fn generate_booking_code() -> String {
    let timestamp = Utc::now().format("%y%m%d%H%M");
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{}{}{}", PREFIX, timestamp, suffix)
}
