//! Serde helpers writing [`Duration`]s as integral nanoseconds.

use std::time::Duration;

use serde::Serializer;

/// Serializes a duration as nanoseconds.
pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
}

/// Serializes an optional duration as nanoseconds or `null`.
pub mod option {
    use std::time::Duration;

    use serde::Serializer;

    /// Serializes `Some` as nanoseconds and `None` as a unit.
    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => super::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// Serializes a slice of durations as nanoseconds.
pub mod seq {
    use std::time::Duration;

    use serde::Serializer;
    use serde::ser::SerializeSeq;

    /// Serializes every element as nanoseconds.
    pub fn serialize<S: Serializer>(
        durations: &[Duration],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(durations.len()))?;
        for d in durations {
            seq.serialize_element(&u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))?;
        }
        seq.end()
    }
}
