//! Revocation state and CRL assembly.
//!
//! [`CrlState`] holds what a CA knows about revoked certificates and the
//! last CRL it issued. [`issue_crl`] turns a state into a signed v2 CRL and
//! returns the successor state; the caller persists that state before
//! treating the CRL as published.

use std::collections::BTreeMap;

use der::asn1::BitString;
use der::{Decode, Encode};
use serde::Deserialize;
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::ext::pkix::CrlReason;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, CrlNumber, ReasonCode, ToAndFromX509Extension, uint_to_u64,
};
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::digest::DigestAlgorithm;
use crate::error::{CaError, Result};
use crate::issuer::Issuer;
use crate::key::PublicKey;
use crate::serial::{CounterId, SerialAllocator};
use crate::tbs_certificate::minimal_be_bytes;
use crate::validity::{self, Validity, ValidityPolicy};

/// RFC 5280 CRLReason values a CA may record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    #[default]
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
}

impl From<RevocationReason> for CrlReason {
    fn from(reason: RevocationReason) -> Self {
        match reason {
            RevocationReason::Unspecified => CrlReason::Unspecified,
            RevocationReason::KeyCompromise => CrlReason::KeyCompromise,
            RevocationReason::CaCompromise => CrlReason::CaCompromise,
            RevocationReason::AffiliationChanged => CrlReason::AffiliationChanged,
            RevocationReason::Superseded => CrlReason::Superseded,
            RevocationReason::CessationOfOperation => CrlReason::CessationOfOperation,
            RevocationReason::CertificateHold => CrlReason::CertificateHold,
            RevocationReason::RemoveFromCrl => CrlReason::RemoveFromCRL,
        }
    }
}

impl TryFrom<CrlReason> for RevocationReason {
    type Error = CaError;

    fn try_from(reason: CrlReason) -> Result<Self> {
        Ok(match reason {
            CrlReason::Unspecified => RevocationReason::Unspecified,
            CrlReason::KeyCompromise => RevocationReason::KeyCompromise,
            CrlReason::CaCompromise => RevocationReason::CaCompromise,
            CrlReason::AffiliationChanged => RevocationReason::AffiliationChanged,
            CrlReason::Superseded => RevocationReason::Superseded,
            CrlReason::CessationOfOperation => RevocationReason::CessationOfOperation,
            CrlReason::CertificateHold => RevocationReason::CertificateHold,
            CrlReason::RemoveFromCRL => RevocationReason::RemoveFromCrl,
            other => {
                return Err(CaError::DecodingError(format!(
                    "unsupported CRL reason {other:?}"
                )));
            }
        })
    }
}

/// One revoked certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationRecord {
    pub serial: u64,
    pub revoked_at: OffsetDateTime,
    pub reason: RevocationReason,
}

/// Answer to "is this serial revoked?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    Good,
    Revoked {
        revoked_at: OffsetDateTime,
        reason: RevocationReason,
    },
}

/// Revocation records plus the number and time of the last CRL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrlState {
    /// Number of the last issued CRL; 0 before the first.
    pub crl_number: u64,
    pub last_issued: Option<OffsetDateTime>,
    records: BTreeMap<u64, RevocationRecord>,
}

impl CrlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a revocation.
    ///
    /// A serial already on the list can only change while it is on hold:
    /// a new reason replaces the hold, and `RemoveFromCrl` releases it.
    pub fn revoke(
        &mut self,
        serial: u64,
        reason: RevocationReason,
        revoked_at: OffsetDateTime,
    ) -> Result<()> {
        let on_hold = match self.records.get(&serial) {
            Some(existing) => existing.reason == RevocationReason::CertificateHold,
            None => false,
        };

        if reason == RevocationReason::RemoveFromCrl {
            if !on_hold {
                return Err(CaError::PolicyViolation(format!(
                    "serial {serial} is not on hold and cannot be removed from the CRL"
                )));
            }
            self.records.remove(&serial);
            tracing::info!(serial, "released certificate from hold");
            return Ok(());
        }

        if self.records.contains_key(&serial) && !on_hold {
            return Err(CaError::PolicyViolation(format!(
                "serial {serial} is already revoked"
            )));
        }

        self.records.insert(
            serial,
            RevocationRecord {
                serial,
                revoked_at: revoked_at.to_offset(time::UtcOffset::UTC),
                reason,
            },
        );
        tracing::info!(serial, ?reason, "revoked certificate");
        Ok(())
    }

    pub fn status(&self, serial: u64) -> RevocationStatus {
        match self.records.get(&serial) {
            Some(record) => RevocationStatus::Revoked {
                revoked_at: record.revoked_at,
                reason: record.reason,
            },
            None => RevocationStatus::Good,
        }
    }

    /// Records in ascending serial order.
    pub fn records(&self) -> impl Iterator<Item = &RevocationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// How CRLs are dated and signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrlPolicy {
    pub validity: ValidityPolicy,
    pub digest: DigestAlgorithm,
}

impl CrlPolicy {
    pub fn new(validity: ValidityPolicy, digest: DigestAlgorithm) -> Result<Self> {
        if digest == DigestAlgorithm::Sha1 {
            return Err(CaError::Configuration(
                "sha1 is not accepted for CRL signatures".to_string(),
            ));
        }
        validity.validate()?;
        Ok(Self { validity, digest })
    }
}

/// A signed certificate revocation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCrl {
    pub inner: CertificateList,
}

impl SignedCrl {
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String> {
        let pem = pem::Pem::new("X509 CRL", self.to_der()?);
        Ok(pem::encode_config(
            &pem,
            pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
        ))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateList::from_der(der)?,
        })
    }

    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let parsed = pem::parse(pem_str)?;
        if parsed.tag() != "X509 CRL" {
            return Err(CaError::DecodingError(format!(
                "expected an X509 CRL PEM block, found {:?}",
                parsed.tag()
            )));
        }
        Self::from_der(parsed.contents())
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_cert_list.issuer)
    }

    /// The cRLNumber extension, if present.
    pub fn crl_number(&self) -> Result<Option<u64>> {
        Ok(self
            .crl_extensions()
            .into_iter()
            .find(|ext| ext.oid == CrlNumber::OID)
            .map(|ext| ext.to_extension::<CrlNumber>())
            .transpose()?
            .map(|number| number.0))
    }

    pub fn crl_extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_cert_list
            .crl_extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from_x509_extension)
            .collect()
    }

    /// Revoked entries in CRL order.
    pub fn entries(&self) -> Result<Vec<RevocationRecord>> {
        self.inner
            .tbs_cert_list
            .revoked_certificates
            .iter()
            .flatten()
            .map(|entry| {
                let reason = entry
                    .crl_entry_extensions
                    .iter()
                    .flatten()
                    .find(|ext| ext.extn_id == ReasonCode::OID)
                    .map(|ext| ReasonCode::from_x509_extension_value(ext.extn_value.as_bytes()))
                    .transpose()?
                    .map(|code| RevocationReason::try_from(code.0))
                    .transpose()?
                    .unwrap_or_default();
                Ok(RevocationRecord {
                    serial: uint_to_u64(entry.serial_number.as_bytes())?,
                    revoked_at: validity::from_x509_time(&entry.revocation_date),
                    reason,
                })
            })
            .collect()
    }

    pub fn this_update(&self) -> OffsetDateTime {
        validity::from_x509_time(&self.inner.tbs_cert_list.this_update)
    }

    pub fn next_update(&self) -> Option<OffsetDateTime> {
        self.inner
            .tbs_cert_list
            .next_update
            .as_ref()
            .map(validity::from_x509_time)
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)
    }

    pub fn verify_signature(&self, issuer_public_key: &PublicKey) -> Result<()> {
        let tbs = self.inner.tbs_cert_list.to_der()?;
        issuer_public_key.verify(
            &tbs,
            self.inner.signature.raw_bytes(),
            self.signature_algorithm()?,
        )
    }
}

fn revoked_cert(record: &RevocationRecord) -> Result<RevokedCert> {
    let extensions = match record.reason {
        RevocationReason::Unspecified => None,
        reason => Some(vec![
            ExtensionParam::from_extension(ReasonCode(reason.into()), false)?
                .to_x509_extension()?,
        ]),
    };
    Ok(RevokedCert {
        serial_number: SerialNumber::new(&minimal_be_bytes(record.serial))?,
        revocation_date: validity::to_x509_time(record.revoked_at)?,
        crl_entry_extensions: extensions,
    })
}

/// Assembles and signs the next CRL for `state`.
///
/// Nothing in `state` changes; on success the returned state carries the
/// new CRL number and issue time.
pub fn issue_crl(
    state: &CrlState,
    policy: &CrlPolicy,
    issuer: &dyn Issuer,
    allocator: &SerialAllocator,
    reference_time: OffsetDateTime,
) -> Result<(SignedCrl, CrlState)> {
    let window: Validity = validity::compute_window(&policy.validity, reference_time)?;
    let signature_algorithm = issuer.signing_key().signature_algorithm(policy.digest)?;

    // The state may come from storage that is ahead of the allocator.
    allocator.advance_past(CounterId::CrlNumber, state.crl_number)?;
    let crl_number = allocator.next_crl_number()?;
    if crl_number <= state.crl_number {
        return Err(CaError::CounterExhaustion(format!(
            "CRL number {crl_number} does not advance past {}",
            state.crl_number
        )));
    }

    let revoked = state
        .records()
        .map(revoked_cert)
        .collect::<Result<Vec<_>>>()?;

    let crl_extensions = vec![
        ExtensionParam::from_extension(
            AuthorityKeyIdentifier {
                key_identifier: issuer.issuer_public_key().key_identifier()?,
            },
            false,
        )?
        .to_x509_extension()?,
        ExtensionParam::from_extension(CrlNumber(crl_number), false)?.to_x509_extension()?,
    ];

    let tbs_cert_list = TbsCertList {
        version: Version::V2,
        signature: signature_algorithm.into(),
        issuer: issuer.issuer_name().as_x509_name()?,
        this_update: validity::to_x509_time(window.not_before)?,
        next_update: Some(validity::to_x509_time(window.not_after)?),
        revoked_certificates: if revoked.is_empty() {
            None
        } else {
            Some(revoked)
        },
        crl_extensions: Some(crl_extensions),
    };

    let signature = issuer
        .signing_key()
        .sign(&tbs_cert_list.to_der()?, policy.digest)?;

    let crl = SignedCrl {
        inner: CertificateList {
            tbs_cert_list,
            signature_algorithm: signature_algorithm.into(),
            signature: BitString::from_bytes(&signature)?,
        },
    };

    let mut next_state = state.clone();
    next_state.crl_number = crl_number;
    next_state.last_issued = Some(window.not_before);

    tracing::info!(
        crl_number,
        entries = state.len(),
        next_update = %window.not_after,
        "issued CRL"
    );
    Ok((crl, next_state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use time::macros::datetime;

    #[test]
    fn duplicate_revocation_is_a_policy_violation() {
        let mut state = CrlState::new();
        let t = datetime!(2024-05-01 00:00:00 UTC);
        state.revoke(7, RevocationReason::KeyCompromise, t).unwrap();
        let err = state
            .revoke(7, RevocationReason::Superseded, t)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
        assert_eq!(
            state.status(7),
            RevocationStatus::Revoked {
                revoked_at: t,
                reason: RevocationReason::KeyCompromise
            }
        );
    }

    #[test]
    fn held_certificates_can_be_revoked_or_released() {
        let mut state = CrlState::new();
        let t = datetime!(2024-05-01 00:00:00 UTC);
        state.revoke(3, RevocationReason::CertificateHold, t).unwrap();
        state.revoke(3, RevocationReason::KeyCompromise, t).unwrap();
        assert!(matches!(
            state.status(3),
            RevocationStatus::Revoked {
                reason: RevocationReason::KeyCompromise,
                ..
            }
        ));

        state.revoke(4, RevocationReason::CertificateHold, t).unwrap();
        state.revoke(4, RevocationReason::RemoveFromCrl, t).unwrap();
        assert_eq!(state.status(4), RevocationStatus::Good);
    }

    #[test]
    fn remove_from_crl_requires_a_hold() {
        let mut state = CrlState::new();
        let t = datetime!(2024-05-01 00:00:00 UTC);
        assert_eq!(
            state
                .revoke(9, RevocationReason::RemoveFromCrl, t)
                .unwrap_err()
                .kind(),
            ErrorKind::PolicyViolation
        );
        state.revoke(9, RevocationReason::Superseded, t).unwrap();
        assert!(state.revoke(9, RevocationReason::RemoveFromCrl, t).is_err());
    }

    #[test]
    fn records_iterate_in_serial_order() {
        let mut state = CrlState::new();
        let t = datetime!(2024-05-01 00:00:00 UTC);
        for serial in [17, 4, 11] {
            state.revoke(serial, RevocationReason::Superseded, t).unwrap();
        }
        let serials: Vec<u64> = state.records().map(|r| r.serial).collect();
        assert_eq!(serials, vec![4, 11, 17]);
    }

    #[test]
    fn reasons_map_to_rfc5280_codes() {
        assert_eq!(
            CrlReason::from(RevocationReason::RemoveFromCrl) as u32,
            8
        );
        assert_eq!(
            RevocationReason::try_from(CrlReason::CertificateHold).unwrap(),
            RevocationReason::CertificateHold
        );
    }

    #[test]
    fn crl_policy_rejects_sha1() {
        let validity = ValidityPolicy::Relative {
            duration: time::Duration::days(1),
        };
        assert!(CrlPolicy::new(validity, DigestAlgorithm::Sha1).is_err());
        assert!(CrlPolicy::new(validity, DigestAlgorithm::Sha256).is_ok());
    }
}
