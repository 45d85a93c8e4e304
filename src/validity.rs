//! Validity-window policies.
//!
//! [`compute_window`] is a pure function from a [`ValidityPolicy`] and a
//! reference instant to a [`Validity`]. It is used both for certificate
//! validity and for CRL `thisUpdate`/`nextUpdate`.

use time::{Duration, OffsetDateTime, UtcOffset};
use x509_cert::time::Time;

use crate::error::{CaError, Result};

/// First year that must be encoded as GeneralizedTime (RFC 5280 4.1.2.5).
const GENERALIZED_TIME_FROM_YEAR: i32 = 2050;

/// How the validity window of an issued object is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityPolicy {
    /// Valid from the reference time for `duration`.
    Relative { duration: Duration },
    /// A fixed calendar window, independent of the reference time.
    Absolute {
        not_before: OffsetDateTime,
        not_after: OffsetDateTime,
    },
    /// Like `Relative`, but never outliving `anchor` (typically the issuing
    /// certificate's notAfter).
    RelativeToExpiry {
        duration: Duration,
        anchor: OffsetDateTime,
    },
}

impl ValidityPolicy {
    /// Checks the parts of the policy that do not depend on a reference time.
    pub fn validate(&self) -> Result<()> {
        match *self {
            ValidityPolicy::Relative { duration }
            | ValidityPolicy::RelativeToExpiry { duration, .. } => {
                if duration <= Duration::ZERO {
                    return Err(CaError::Configuration(format!(
                        "validity duration must be positive, got {duration}"
                    )));
                }
                Ok(())
            }
            ValidityPolicy::Absolute {
                not_before,
                not_after,
            } => {
                if not_after <= not_before {
                    return Err(CaError::InvalidWindow {
                        not_before: to_utc(not_before),
                        not_after: to_utc(not_after),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Certificate or CRL validity period, always in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    pub fn duration(&self) -> Duration {
        self.not_after - self.not_before
    }

    /// Converts the window into the X.509 representation.
    pub fn to_x509_validity(&self) -> Result<x509_cert::time::Validity> {
        Ok(x509_cert::time::Validity {
            not_before: to_x509_time(self.not_before)?,
            not_after: to_x509_time(self.not_after)?,
        })
    }

    pub fn from_x509_validity(validity: &x509_cert::time::Validity) -> Self {
        Self {
            not_before: from_x509_time(&validity.not_before),
            not_after: from_x509_time(&validity.not_after),
        }
    }
}

/// Computes the validity window for `policy` relative to `reference_time`.
pub fn compute_window(policy: &ValidityPolicy, reference_time: OffsetDateTime) -> Result<Validity> {
    let reference_time = to_utc(reference_time);
    let (not_before, not_after) = match *policy {
        ValidityPolicy::Relative { duration } => {
            policy.validate()?;
            (reference_time, checked_add(reference_time, duration)?)
        }
        ValidityPolicy::Absolute {
            not_before,
            not_after,
        } => {
            policy.validate()?;
            (to_utc(not_before), to_utc(not_after))
        }
        ValidityPolicy::RelativeToExpiry { duration, anchor } => {
            let anchor = to_utc(anchor);
            if anchor <= reference_time {
                return Err(CaError::ExpiredAnchor {
                    anchor,
                    reference_time,
                });
            }
            policy.validate()?;
            let relative = checked_add(reference_time, duration)?;
            (reference_time, relative.min(anchor))
        }
    };

    if not_after <= not_before {
        return Err(CaError::InvalidWindow {
            not_before,
            not_after,
        });
    }

    Ok(Validity {
        not_before,
        not_after,
    })
}

fn to_utc(t: OffsetDateTime) -> OffsetDateTime {
    t.to_offset(UtcOffset::UTC)
}

fn checked_add(t: OffsetDateTime, duration: Duration) -> Result<OffsetDateTime> {
    t.checked_add(duration).ok_or_else(|| {
        CaError::Configuration(format!("validity duration {duration} overflows from {t}"))
    })
}

/// Encodes an instant as UTCTime before 2050 and GeneralizedTime after.
/// Sub-second precision is dropped.
pub fn to_x509_time(t: OffsetDateTime) -> Result<Time> {
    let t = to_utc(t);
    let system_time: std::time::SystemTime = t.into();
    if t.year() < GENERALIZED_TIME_FROM_YEAR {
        Ok(Time::UtcTime(der::asn1::UtcTime::from_system_time(
            system_time,
        )?))
    } else {
        Ok(Time::GeneralTime(
            der::asn1::GeneralizedTime::from_system_time(system_time)?,
        ))
    }
}

pub fn from_x509_time(t: &Time) -> OffsetDateTime {
    match t {
        Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
        Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use time::macros::datetime;

    #[test]
    fn relative_window_starts_at_reference_time() {
        let t = datetime!(2024-03-10 12:30:00 UTC);
        let policy = ValidityPolicy::Relative {
            duration: Duration::days(365),
        };
        let window = compute_window(&policy, t).unwrap();
        assert_eq!(window.not_before, t);
        assert_eq!(window.not_after, t + Duration::days(365));
    }

    #[test]
    fn relative_window_is_normalised_to_utc() {
        let local = datetime!(2024-03-10 14:30:00 +02:00);
        let policy = ValidityPolicy::Relative {
            duration: Duration::hours(1),
        };
        let window = compute_window(&policy, local).unwrap();
        assert_eq!(window.not_before, datetime!(2024-03-10 12:30:00 UTC));
        assert_eq!(window.not_before.offset(), UtcOffset::UTC);
    }

    #[test]
    fn absolute_window_is_returned_unchanged() {
        let policy = ValidityPolicy::Absolute {
            not_before: datetime!(2023-01-01 00:00:00 UTC),
            not_after: datetime!(2024-01-01 00:00:00 UTC),
        };
        let window = compute_window(&policy, datetime!(2030-01-01 00:00:00 UTC)).unwrap();
        assert_eq!(window.not_before, datetime!(2023-01-01 00:00:00 UTC));
        assert_eq!(window.not_after, datetime!(2024-01-01 00:00:00 UTC));
    }

    #[test]
    fn inverted_absolute_window_is_a_configuration_error() {
        let policy = ValidityPolicy::Absolute {
            not_before: datetime!(2024-01-01 00:00:00 UTC),
            not_after: datetime!(2023-01-01 00:00:00 UTC),
        };
        let err = compute_window(&policy, datetime!(2023-06-01 00:00:00 UTC)).unwrap_err();
        assert!(matches!(err, CaError::InvalidWindow { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn zero_length_absolute_window_is_rejected() {
        let t = datetime!(2024-01-01 00:00:00 UTC);
        let policy = ValidityPolicy::Absolute {
            not_before: t,
            not_after: t,
        };
        assert!(compute_window(&policy, t).is_err());
    }

    #[test]
    fn relative_to_expiry_is_capped_by_anchor() {
        let t = datetime!(2024-01-01 00:00:00 UTC);
        let anchor = datetime!(2024-06-01 00:00:00 UTC);
        let policy = ValidityPolicy::RelativeToExpiry {
            duration: Duration::days(365),
            anchor,
        };
        let window = compute_window(&policy, t).unwrap();
        assert_eq!(window.not_before, t);
        assert_eq!(window.not_after, anchor);

        let short = ValidityPolicy::RelativeToExpiry {
            duration: Duration::days(30),
            anchor,
        };
        let window = compute_window(&short, t).unwrap();
        assert_eq!(window.not_after, t + Duration::days(30));
    }

    #[test]
    fn expired_anchor_is_rejected() {
        let t = datetime!(2024-01-01 00:00:00 UTC);
        let policy = ValidityPolicy::RelativeToExpiry {
            duration: Duration::days(30),
            anchor: t,
        };
        let err = compute_window(&policy, t).unwrap_err();
        assert!(matches!(err, CaError::ExpiredAnchor { .. }));
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        let policy = ValidityPolicy::Relative {
            duration: Duration::ZERO,
        };
        assert_eq!(
            policy.validate().unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn far_future_dates_use_generalized_time() {
        let early = to_x509_time(datetime!(2049-12-31 23:59:59 UTC)).unwrap();
        assert!(matches!(early, Time::UtcTime(_)));
        let late = to_x509_time(datetime!(2050-01-01 00:00:00 UTC)).unwrap();
        assert!(matches!(late, Time::GeneralTime(_)));
        assert_eq!(
            from_x509_time(&late),
            datetime!(2050-01-01 00:00:00 UTC)
        );
    }
}
