use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};

const STEP: f64 = 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    KB,
    MB,
    GB,
    TB,
}

impl Unit {
    const ALL: [Unit; 4] = [Unit::KB, Unit::MB, Unit::GB, Unit::TB];

    /// Bytes per one of this unit.
    pub fn factor(self) -> f64 {
        match self {
            Self::KB => STEP,
            Self::MB => STEP.powi(2),
            Self::GB => STEP.powi(3),
            Self::TB => STEP.powi(4),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::KB => "KB",
            Self::MB => "MB",
            Self::GB => "GB",
            Self::TB => "TB",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::KB => "Kilobytes",
            Self::MB => "Megabytes",
            Self::GB => "Gigabytes",
            Self::TB => "Terabytes",
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({})", self.symbol(), self.name())
    }
}

/// A byte count scaled to the largest unit it fills.
///
/// Serializes as the `[symbolic, value, bytes]` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct HumanSize {
    pub symbolic: String,
    pub value: f64,
    pub bytes: u64,
    pub unit: Unit,
}

impl HumanSize {
    /// `"1.50 KB (Kilobytes)"`
    pub fn long(&self) -> String {
        format!("{:.2} {}", self.value, self.unit)
    }
}

impl Display for HumanSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.symbolic)
    }
}

impl Serialize for HumanSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.symbolic, self.value, self.bytes).serialize(serializer)
    }
}

/// Convert a byte count into a [`HumanSize`].
///
/// Steps through KB, MB, GB and TB, stopping at the first unit where the
/// count divided by 1024 is below that unit's size. TB is the ceiling. Zero
/// has no meaningful size and yields `None`.
///
/// ```
/// # use trawl_metrics::bytes_to_human;
/// let size = bytes_to_human(1536).unwrap();
/// assert_eq!(size.symbolic, "1.50 KB");
/// assert!(bytes_to_human(0).is_none());
/// ```
pub fn bytes_to_human(bytes: u64) -> Option<HumanSize> {
    if bytes == 0 {
        return None;
    }
    let count = bytes as f64;
    let unit = Unit::ALL.into_iter().find(|unit| count / STEP < unit.factor()).unwrap_or(Unit::TB);
    let value = count / unit.factor();
    Some(HumanSize { symbolic: format!("{value:.2} {}", unit.symbol()), value, bytes, unit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, "0.00 KB", Unit::KB)]
    #[case(512, "0.50 KB", Unit::KB)]
    #[case(1536, "1.50 KB", Unit::KB)]
    #[case(1024 * 1024, "1.00 MB", Unit::MB)]
    #[case(3 * 1024 * 1024, "3.00 MB", Unit::MB)]
    #[case(5 * 1024 * 1024 * 1024, "5.00 GB", Unit::GB)]
    #[case(2 * 1024_u64.pow(4), "2.00 TB", Unit::TB)]
    #[case(4096 * 1024_u64.pow(4), "4096.00 TB", Unit::TB)]
    fn test_bytes_to_human(#[case] bytes: u64, #[case] symbolic: &str, #[case] unit: Unit) {
        let size = bytes_to_human(bytes).unwrap();
        assert_eq!(size.symbolic, symbolic);
        assert_eq!(size.unit, unit);
        assert_eq!(size.bytes, bytes);
    }

    #[test]
    fn test_zero_is_none() {
        assert_eq!(bytes_to_human(0), None);
    }

    #[test]
    fn test_triple() {
        let size = bytes_to_human(1536).unwrap();
        assert_eq!(size.value, 1.5);
        assert_eq!(serde_json::to_value(&size).unwrap(), serde_json::json!(["1.50 KB", 1.5, 1536]));
        assert_eq!(size.long(), "1.50 KB (Kilobytes)");
    }
}
