use std::fmt;

use time::{OffsetDateTime, PrimitiveDateTime};

use crate::sspi_data_types::TimeStamp;

/// Number of 100 ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: i128 = 116_444_736_000_000_000;

/// Expiration time of a credential or a security context.
///
/// Providers report expiration as advisory data: a value that does not describe a representable
/// point in time (including the "never expires" sentinel `0x7FFF_FFFF_FFFF_FFFF`) is read as
/// [`Expiry::Never`] rather than as an error.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// No leg has completed yet, so the provider has not reported anything.
    #[default]
    NotAvailable,
    Never,
    At(OffsetDateTime),
}

impl Expiry {
    pub fn from_time_stamp(time_stamp: TimeStamp) -> Self {
        if time_stamp < 0 {
            return Expiry::Never;
        }

        let unix_nanos = (i128::from(time_stamp) - FILETIME_UNIX_EPOCH) * 100;

        match OffsetDateTime::from_unix_timestamp_nanos(unix_nanos) {
            Ok(date_time) => Expiry::At(date_time),
            Err(_) => Expiry::Never,
        }
    }

    /// Flattens the expiry into a timestamp: [`Expiry::NotAvailable`] becomes the smallest
    /// representable date and [`Expiry::Never`] the largest one.
    pub fn as_date_time(&self) -> OffsetDateTime {
        match self {
            Expiry::NotAvailable => PrimitiveDateTime::MIN.assume_utc(),
            Expiry::Never => PrimitiveDateTime::MAX.assume_utc(),
            Expiry::At(date_time) => *date_time,
        }
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        match self {
            Expiry::At(date_time) => *date_time <= now,
            Expiry::NotAvailable | Expiry::Never => false,
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::NotAvailable => f.write_str("not available"),
            Expiry::Never => f.write_str("never"),
            Expiry::At(date_time) => write!(f, "{date_time}"),
        }
    }
}
