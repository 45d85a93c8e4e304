//! OCSP responses (RFC 6960) built from a CA's revocation state.
//!
//! The CA answers for its own certificates: responses are signed with the
//! CA key and name the responder by key hash. Getting requests in and
//! responses out over HTTP is left to the caller.
//!
//! Only the structures a responder needs are modelled. Signed requests
//! decode, but their signatures are not checked.

use const_oid::ObjectIdentifier;
use const_oid::db::rfc6960::{ID_PKIX_OCSP_BASIC, ID_PKIX_OCSP_NONCE};
use der::asn1::{Any, AnyRef, BitString, GeneralizedTime, Null, OctetString};
use der::{Choice, Decode, Encode, Enumerated, Sequence};
use time::OffsetDateTime;
use x509_cert::Certificate;
use x509_cert::Version;
use x509_cert::ext::pkix::CrlReason;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::{Extension, Extensions};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::uint_to_u64;
use crate::crl::{CrlState, RevocationReason, RevocationStatus};
use crate::digest::DigestAlgorithm;
use crate::error::{CaError, Result};
use crate::issuer::Issuer;
use crate::key::PublicKey;
use crate::tbs_certificate::minimal_be_bytes;
use crate::validity::{self, Validity, ValidityPolicy};

/// ```text
/// CertID ::= SEQUENCE {
///     hashAlgorithm       AlgorithmIdentifier,
///     issuerNameHash      OCTET STRING,
///     issuerKeyHash       OCTET STRING,
///     serialNumber        CertificateSerialNumber }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertId {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub issuer_name_hash: OctetString,
    pub issuer_key_hash: OctetString,
    pub serial_number: SerialNumber,
}

/// ```text
/// Request ::= SEQUENCE {
///     reqCert                     CertID,
///     singleRequestExtensions [0] EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Request {
    pub req_cert: CertId,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub single_request_extensions: Option<Extensions>,
}

/// ```text
/// TBSRequest ::= SEQUENCE {
///     version             [0] EXPLICIT Version DEFAULT v1,
///     requestorName       [1] EXPLICIT GeneralName OPTIONAL,
///     requestList             SEQUENCE OF Request,
///     requestExtensions   [2] EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TbsRequest {
    #[asn1(context_specific = "0", default = "Default::default")]
    pub version: Version,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub requestor_name: Option<GeneralName>,
    pub request_list: Vec<Request>,
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", optional = "true")]
    pub request_extensions: Option<Extensions>,
}

/// ```text
/// OCSPRequest ::= SEQUENCE {
///     tbsRequest              TBSRequest,
///     optionalSignature   [0] EXPLICIT Signature OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct OcspRequest {
    pub tbs_request: TbsRequest,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub optional_signature: Option<Any>,
}

/// `OCSPResponseStatus`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Enumerated)]
#[repr(u32)]
pub enum OcspResponseStatus {
    Successful = 0,
    MalformedRequest = 1,
    InternalError = 2,
    TryLater = 3,
    SigRequired = 5,
    Unauthorized = 6,
}

/// ```text
/// ResponseBytes ::= SEQUENCE {
///     responseType   OBJECT IDENTIFIER,
///     response       OCTET STRING }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ResponseBytes {
    pub response_type: ObjectIdentifier,
    pub response: OctetString,
}

/// ```text
/// OCSPResponse ::= SEQUENCE {
///     responseStatus         OCSPResponseStatus,
///     responseBytes      [0] EXPLICIT ResponseBytes OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct OcspResponse {
    pub response_status: OcspResponseStatus,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub response_bytes: Option<ResponseBytes>,
}

/// ```text
/// ResponderID ::= CHOICE {
///     byName   [1] Name,
///     byKey    [2] KeyHash }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum ResponderId {
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", constructed = "true")]
    ByName(Name),
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", constructed = "true")]
    ByKey(OctetString),
}

/// ```text
/// RevokedInfo ::= SEQUENCE {
///     revocationTime              GeneralizedTime,
///     revocationReason    [0]     EXPLICIT CRLReason OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct RevokedInfo {
    pub revocation_time: GeneralizedTime,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub revocation_reason: Option<CrlReason>,
}

/// ```text
/// CertStatus ::= CHOICE {
///     good        [0]     IMPLICIT NULL,
///     revoked     [1]     IMPLICIT RevokedInfo,
///     unknown     [2]     IMPLICIT UnknownInfo }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Choice)]
pub enum CertStatus {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT")]
    Good(Null),
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", constructed = "true")]
    Revoked(RevokedInfo),
    #[asn1(context_specific = "2", tag_mode = "IMPLICIT")]
    Unknown(Null),
}

/// ```text
/// SingleResponse ::= SEQUENCE {
///     certID                       CertID,
///     certStatus                   CertStatus,
///     thisUpdate                   GeneralizedTime,
///     nextUpdate         [0]       EXPLICIT GeneralizedTime OPTIONAL,
///     singleExtensions   [1]       EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SingleResponse {
    pub cert_id: CertId,
    pub cert_status: CertStatus,
    pub this_update: GeneralizedTime,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub next_update: Option<GeneralizedTime>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub single_extensions: Option<Extensions>,
}

/// ```text
/// ResponseData ::= SEQUENCE {
///     version              [0] EXPLICIT Version DEFAULT v1,
///     responderID              ResponderID,
///     producedAt               GeneralizedTime,
///     responses                SEQUENCE OF SingleResponse,
///     responseExtensions   [1] EXPLICIT Extensions OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ResponseData {
    #[asn1(context_specific = "0", default = "Default::default")]
    pub version: Version,
    pub responder_id: ResponderId,
    pub produced_at: GeneralizedTime,
    pub responses: Vec<SingleResponse>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub response_extensions: Option<Extensions>,
}

/// ```text
/// BasicOCSPResponse ::= SEQUENCE {
///     tbsResponseData      ResponseData,
///     signatureAlgorithm   AlgorithmIdentifier,
///     signature            BIT STRING,
///     certs            [0] EXPLICIT SEQUENCE OF Certificate OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct BasicOcspResponse {
    pub tbs_response_data: ResponseData,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub signature: BitString,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub certs: Option<Vec<Certificate>>,
}

/// What the responder says about one certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcspStatus {
    Good,
    Revoked {
        revoked_at: OffsetDateTime,
        reason: RevocationReason,
    },
    /// The CertID names another issuer or an unsupported hash.
    Unknown,
}

impl From<RevocationStatus> for OcspStatus {
    fn from(status: RevocationStatus) -> Self {
        match status {
            RevocationStatus::Good => OcspStatus::Good,
            RevocationStatus::Revoked { revoked_at, reason } => {
                OcspStatus::Revoked { revoked_at, reason }
            }
        }
    }
}

/// How OCSP responses are dated and signed. The validity window gives
/// thisUpdate and nextUpdate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcspPolicy {
    pub validity: ValidityPolicy,
    pub digest: DigestAlgorithm,
}

impl OcspPolicy {
    pub fn new(validity: ValidityPolicy, digest: DigestAlgorithm) -> Result<Self> {
        if digest == DigestAlgorithm::Sha1 {
            return Err(CaError::Configuration(
                "sha1 is not accepted for OCSP signatures".to_string(),
            ));
        }
        validity.validate()?;
        Ok(Self { validity, digest })
    }
}

fn generalized_time(t: OffsetDateTime) -> Result<GeneralizedTime> {
    let secs = u64::try_from(t.unix_timestamp())
        .map_err(|_| CaError::EncodingError(format!("{t} cannot be a GeneralizedTime")))?;
    Ok(GeneralizedTime::from_unix_duration(
        std::time::Duration::from_secs(secs),
    )?)
}

fn from_generalized_time(t: &GeneralizedTime) -> OffsetDateTime {
    OffsetDateTime::from(t.to_system_time())
}

/// Name and key hashes identifying `issuer` in a CertID.
fn issuer_hashes(issuer: &dyn Issuer, digest: DigestAlgorithm) -> Result<(Vec<u8>, Vec<u8>)> {
    let name = issuer.issuer_name_der()?;
    let spki = issuer.issuer_public_key().to_spki()?;
    Ok((
        digest.digest(&name),
        digest.digest(spki.subject_public_key.raw_bytes()),
    ))
}

fn nonce_of(extensions: Option<&Extensions>) -> Option<&Extension> {
    extensions
        .into_iter()
        .flatten()
        .find(|ext| ext.extn_id == ID_PKIX_OCSP_NONCE)
}

impl CertId {
    /// Identifies `serial` as issued by `issuer`, hashing with `digest`.
    pub fn new(issuer: &dyn Issuer, serial: u64, digest: DigestAlgorithm) -> Result<Self> {
        let (name_hash, key_hash) = issuer_hashes(issuer, digest)?;
        Ok(Self {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: digest.oid(),
                parameters: Some(Any::from(AnyRef::NULL)),
            },
            issuer_name_hash: OctetString::new(name_hash)?,
            issuer_key_hash: OctetString::new(key_hash)?,
            serial_number: SerialNumber::new(&minimal_be_bytes(serial))?,
        })
    }

    pub fn serial(&self) -> Result<u64> {
        uint_to_u64(self.serial_number.as_bytes())
    }

    /// Whether this ID names a certificate issued by `issuer`.
    fn is_issued_by(&self, issuer: &dyn Issuer) -> Result<bool> {
        let Some(digest) = DigestAlgorithm::from_oid(&self.hash_algorithm.oid) else {
            return Ok(false);
        };
        let (name_hash, key_hash) = issuer_hashes(issuer, digest)?;
        Ok(self.issuer_name_hash.as_bytes() == name_hash.as_slice()
            && self.issuer_key_hash.as_bytes() == key_hash.as_slice())
    }
}

impl OcspRequest {
    /// An unsigned request for `serials` issued by `issuer`.
    pub fn for_serials(
        issuer: &dyn Issuer,
        serials: &[u64],
        digest: DigestAlgorithm,
        nonce: Option<&[u8]>,
    ) -> Result<Self> {
        let request_list = serials
            .iter()
            .map(|serial| {
                Ok(Request {
                    req_cert: CertId::new(issuer, *serial, digest)?,
                    single_request_extensions: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let request_extensions = nonce
            .map(|nonce| -> Result<Extensions> {
                Ok(vec![Extension {
                    extn_id: ID_PKIX_OCSP_NONCE,
                    critical: false,
                    extn_value: OctetString::new(OctetString::new(nonce)?.to_der()?)?,
                }])
            })
            .transpose()?;
        Ok(Self {
            tbs_request: TbsRequest {
                version: Version::V1,
                requestor_name: None,
                request_list,
                request_extensions,
            },
            optional_signature: None,
        })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(<Self as Decode>::from_der(der)?)
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(Encode::to_der(self)?)
    }

    /// The raw nonce extension value, if the request carries one.
    pub fn nonce(&self) -> Option<&[u8]> {
        nonce_of(self.tbs_request.request_extensions.as_ref()).map(|ext| ext.extn_value.as_bytes())
    }
}

impl OcspResponse {
    /// A response carrying only an error status.
    pub fn unsuccessful(status: OcspResponseStatus) -> Self {
        Self {
            response_status: status,
            response_bytes: None,
        }
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(<Self as Decode>::from_der(der)?)
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(Encode::to_der(self)?)
    }

    /// The embedded basic response of a successful answer.
    pub fn basic(&self) -> Result<BasicOcspResponse> {
        let bytes = match (&self.response_status, &self.response_bytes) {
            (OcspResponseStatus::Successful, Some(bytes)) => bytes,
            (status, _) => {
                return Err(CaError::DecodingError(format!(
                    "OCSP response status {status:?} carries no basic response"
                )));
            }
        };
        if bytes.response_type != ID_PKIX_OCSP_BASIC {
            return Err(CaError::DecodingError(format!(
                "unsupported OCSP response type {}",
                bytes.response_type
            )));
        }
        Ok(BasicOcspResponse::from_der(bytes.response.as_bytes())?)
    }
}

impl BasicOcspResponse {
    pub fn verify_signature(&self, responder_key: &PublicKey) -> Result<()> {
        let tbs = self.tbs_response_data.to_der()?;
        responder_key.verify(
            &tbs,
            self.signature.raw_bytes(),
            SignatureAlgorithm::try_from(&self.signature_algorithm)?,
        )
    }

    /// Serial and status of every single response, in response order.
    pub fn statuses(&self) -> Result<Vec<(u64, OcspStatus)>> {
        self.tbs_response_data
            .responses
            .iter()
            .map(|single| {
                let status = match &single.cert_status {
                    CertStatus::Good(_) => OcspStatus::Good,
                    CertStatus::Unknown(_) => OcspStatus::Unknown,
                    CertStatus::Revoked(info) => OcspStatus::Revoked {
                        revoked_at: from_generalized_time(&info.revocation_time),
                        reason: info
                            .revocation_reason
                            .map(RevocationReason::try_from)
                            .transpose()?
                            .unwrap_or_default(),
                    },
                };
                Ok((single.cert_id.serial()?, status))
            })
            .collect()
    }

    pub fn nonce(&self) -> Option<&[u8]> {
        nonce_of(self.tbs_response_data.response_extensions.as_ref())
            .map(|ext| ext.extn_value.as_bytes())
    }
}

fn single_response(cert_id: CertId, status: OcspStatus, window: &Validity) -> Result<SingleResponse> {
    let cert_status = match status {
        OcspStatus::Good => CertStatus::Good(Null),
        OcspStatus::Unknown => CertStatus::Unknown(Null),
        OcspStatus::Revoked { revoked_at, reason } => CertStatus::Revoked(RevokedInfo {
            revocation_time: generalized_time(revoked_at)?,
            revocation_reason: match reason {
                RevocationReason::Unspecified => None,
                reason => Some(reason.into()),
            },
        }),
    };
    Ok(SingleResponse {
        cert_id,
        cert_status,
        this_update: generalized_time(window.not_before)?,
        next_update: Some(generalized_time(window.not_after)?),
        single_extensions: None,
    })
}

/// Answers `request` from `state`, signing as `issuer`.
///
/// Certificates of other issuers, or IDs hashed with an unsupported digest,
/// are reported `unknown`. A request without any IDs gets a
/// `malformedRequest` response. A nonce in the request is echoed back.
pub fn respond(
    request: &OcspRequest,
    state: &CrlState,
    policy: &OcspPolicy,
    issuer: &dyn Issuer,
    reference_time: OffsetDateTime,
) -> Result<OcspResponse> {
    let requests = &request.tbs_request.request_list;
    if requests.is_empty() {
        tracing::warn!("OCSP request without certificate IDs");
        return Ok(OcspResponse::unsuccessful(
            OcspResponseStatus::MalformedRequest,
        ));
    }

    let window = validity::compute_window(&policy.validity, reference_time)?;
    let signature_algorithm = issuer.signing_key().signature_algorithm(policy.digest)?;

    let responses = requests
        .iter()
        .map(|req| {
            let cert_id = &req.req_cert;
            let status = if cert_id.is_issued_by(issuer)? {
                match cert_id.serial() {
                    Ok(serial) => state.status(serial).into(),
                    Err(_) => OcspStatus::Unknown,
                }
            } else {
                OcspStatus::Unknown
            };
            single_response(cert_id.clone(), status, &window)
        })
        .collect::<Result<Vec<_>>>()?;

    let tbs_response_data = ResponseData {
        version: Version::V1,
        responder_id: ResponderId::ByKey(OctetString::new(
            issuer.issuer_public_key().key_identifier()?,
        )?),
        produced_at: generalized_time(reference_time)?,
        responses,
        response_extensions: nonce_of(request.tbs_request.request_extensions.as_ref())
            .map(|nonce| vec![nonce.clone()]),
    };

    let signature = issuer
        .signing_key()
        .sign(&tbs_response_data.to_der()?, policy.digest)?;
    let basic = BasicOcspResponse {
        tbs_response_data,
        signature_algorithm: signature_algorithm.into(),
        signature: BitString::from_bytes(&signature)?,
        certs: None,
    };

    tracing::info!(
        responses = requests.len(),
        next_update = %window.not_after,
        "signed OCSP response"
    );
    Ok(OcspResponse {
        response_status: OcspResponseStatus::Successful,
        response_bytes: Some(ResponseBytes {
            response_type: ID_PKIX_OCSP_BASIC,
            response: OctetString::new(basic.to_der()?)?,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn unsuccessful_responses_carry_no_body() {
        let response = OcspResponse::unsuccessful(OcspResponseStatus::TryLater);
        let der = response.to_der().unwrap();
        // SEQUENCE { ENUMERATED 3 }
        assert_eq!(der, vec![0x30, 0x03, 0x0a, 0x01, 0x03]);
        let decoded = OcspResponse::from_der(&der).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.basic().unwrap_err().kind(), ErrorKind::Encoding);
    }

    #[test]
    fn good_status_is_an_implicit_null() {
        let der = CertStatus::Good(Null).to_der().unwrap();
        assert_eq!(der, vec![0x80, 0x00]);
        let unknown = CertStatus::from_der(&[0x82, 0x00]).unwrap();
        assert_eq!(unknown, CertStatus::Unknown(Null));
    }

    #[test]
    fn ocsp_policy_rejects_sha1() {
        let validity = ValidityPolicy::Relative {
            duration: time::Duration::hours(12),
        };
        assert!(OcspPolicy::new(validity, DigestAlgorithm::Sha1).is_err());
        assert!(OcspPolicy::new(validity, DigestAlgorithm::Sha256).is_ok());
    }

    #[test]
    fn revocation_status_maps_to_ocsp_status() {
        assert_eq!(OcspStatus::from(RevocationStatus::Good), OcspStatus::Good);
        let at = time::macros::datetime!(2024-01-02 03:04:05 UTC);
        assert_eq!(
            OcspStatus::from(RevocationStatus::Revoked {
                revoked_at: at,
                reason: RevocationReason::KeyCompromise
            }),
            OcspStatus::Revoked {
                revoked_at: at,
                reason: RevocationReason::KeyCompromise
            }
        );
    }
}
