//! Human-readable order numbers: `{PREFIX}-{unix millis}-{3 digits}`,
//! e.g. `ORD-1707556201923-482`.

use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;

const SUFFIX_MIN: u16 = 100;
const SUFFIX_MAX: u16 = 999;
const SUFFIXES_PER_MILLI: usize = (SUFFIX_MAX - SUFFIX_MIN + 1) as usize;

/// Source of order numbers. Uniqueness is ultimately enforced by the store;
/// implementations only need to make collisions rare.
pub trait OrderNumberGenerator: Send + Sync {
    fn generate(&self) -> String;
}

#[derive(Default)]
struct IssuedInMilli {
    millis: i64,
    suffixes: HashSet<u16>,
}

/// Timestamp plus random suffix. Within one process a (millisecond, suffix)
/// pair is never handed out twice; if a millisecond's 900 suffixes are
/// exhausted the clock is advanced logically. Other processes can still
/// collide, which the order service absorbs with one retry.
pub struct TimestampOrderNumbers {
    prefix: String,
    issued: Mutex<IssuedInMilli>,
}

impl TimestampOrderNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: Mutex::new(IssuedInMilli::default()),
        }
    }

    fn next_pair(&self) -> (i64, u16) {
        let mut rng = rand::thread_rng();
        let mut issued = self
            .issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Utc::now().timestamp_millis();
        if now > issued.millis {
            issued.millis = now;
            issued.suffixes.clear();
        } else if issued.suffixes.len() >= SUFFIXES_PER_MILLI {
            issued.millis += 1;
            issued.suffixes.clear();
        }

        loop {
            let suffix = rng.gen_range(SUFFIX_MIN..=SUFFIX_MAX);
            if issued.suffixes.insert(suffix) {
                return (issued.millis, suffix);
            }
        }
    }
}

impl OrderNumberGenerator for TimestampOrderNumbers {
    fn generate(&self) -> String {
        let (millis, suffix) = self.next_pair();
        format!("{}-{}-{}", self.prefix, millis, suffix)
    }
}

/// Checks that `candidate` has the shape produced by [`TimestampOrderNumbers`].
pub fn is_well_formed(prefix: &str, candidate: &str) -> bool {
    let Some(rest) = candidate
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('-'))
    else {
        return false;
    };
    let mut parts = rest.split('-');
    let (Some(millis), Some(suffix), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    let millis_ok = !millis.is_empty() && millis.bytes().all(|b| b.is_ascii_digit());
    let suffix_ok = suffix.len() == 3
        && suffix
            .parse::<u16>()
            .map(|s| (SUFFIX_MIN..=SUFFIX_MAX).contains(&s))
            .unwrap_or(false);
    millis_ok && suffix_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_numbers_are_well_formed() {
        let generator = TimestampOrderNumbers::new("ORD");
        let number = generator.generate();
        assert!(is_well_formed("ORD", &number), "{number}");
        assert!(!is_well_formed("CK", &number));
    }

    #[test]
    fn never_repeats_within_a_process() {
        let generator = TimestampOrderNumbers::new("ORD");
        let mut seen = HashSet::new();
        // More than one millisecond's worth of suffixes, forcing logical clock advance.
        for _ in 0..5_000 {
            assert!(seen.insert(generator.generate()));
        }
    }

    #[test]
    fn embeds_creation_time() {
        let before = Utc::now().timestamp_millis();
        let number = TimestampOrderNumbers::new("ORD").generate();
        let millis: i64 = number.split('-').nth(1).unwrap().parse().unwrap();
        assert!(millis >= before);
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(!is_well_formed("ORD", "ORD-123"));
        assert!(!is_well_formed("ORD", "ORD-abc-123"));
        assert!(!is_well_formed("ORD", "ORD-1707556201923-42"));
        assert!(!is_well_formed("ORD", "ORD-1707556201923-099"));
        assert!(!is_well_formed("ORD", "ORD-1707556201923-482-1"));
        assert!(is_well_formed("ORD", "ORD-1707556201923-482"));
    }
}
