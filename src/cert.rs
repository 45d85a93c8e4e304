pub mod builder;
pub mod extensions;
pub mod params;

use const_oid::ObjectIdentifier;
use const_oid::db::{rfc5912, rfc8410};
use der::asn1::{Any, AnyRef};
use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::{BasicConstraints, ToAndFromX509Extension};
use params::{DistinguishedName, ExtensionParam};
use x509_cert::certificate::CertificateInner;
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::digest::DigestAlgorithm;
use crate::error::{CaError, Result};
use crate::key::PublicKey;
use crate::validity::Validity;

const SHA_1_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const ECDSA_WITH_SHA_1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");

/// Represents the supported signature algorithms for certificates and CRLs.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with the given digest.
    RsaPkcs1v15(DigestAlgorithm),
    /// ECDSA with the given digest; the curve comes from the key.
    Ecdsa(DigestAlgorithm),
    /// Pure Ed25519. The digest is fixed by the algorithm.
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::RsaPkcs1v15(digest) => match digest {
                DigestAlgorithm::Sha1 => SHA_1_WITH_RSA_ENCRYPTION,
                DigestAlgorithm::Sha256 => rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                DigestAlgorithm::Sha384 => rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
                DigestAlgorithm::Sha512 => rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
            },
            SignatureAlgorithm::Ecdsa(digest) => match digest {
                DigestAlgorithm::Sha1 => ECDSA_WITH_SHA_1,
                DigestAlgorithm::Sha256 => rfc5912::ECDSA_WITH_SHA_256,
                DigestAlgorithm::Sha384 => rfc5912::ECDSA_WITH_SHA_384,
                DigestAlgorithm::Sha512 => rfc5912::ECDSA_WITH_SHA_512,
            },
            SignatureAlgorithm::Ed25519 => rfc8410::ID_ED_25519,
        }
    }

    /// The digest named by the algorithm, `None` for Ed25519.
    pub fn digest(&self) -> Option<DigestAlgorithm> {
        match self {
            SignatureAlgorithm::RsaPkcs1v15(digest) | SignatureAlgorithm::Ecdsa(digest) => {
                Some(*digest)
            }
            SignatureAlgorithm::Ed25519 => None,
        }
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA identifiers carry an explicit NULL parameter (RFC 4055); ECDSA and
    /// Ed25519 identifiers carry none.
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::RsaPkcs1v15(_) => Some(Any::from(AnyRef::NULL)),
            SignatureAlgorithm::Ecdsa(_) | SignatureAlgorithm::Ed25519 => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

impl TryFrom<&AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = CaError;

    fn try_from(value: &AlgorithmIdentifierOwned) -> Result<Self> {
        Ok(match value.oid {
            SHA_1_WITH_RSA_ENCRYPTION => SignatureAlgorithm::RsaPkcs1v15(DigestAlgorithm::Sha1),
            rfc5912::SHA_256_WITH_RSA_ENCRYPTION => {
                SignatureAlgorithm::RsaPkcs1v15(DigestAlgorithm::Sha256)
            }
            rfc5912::SHA_384_WITH_RSA_ENCRYPTION => {
                SignatureAlgorithm::RsaPkcs1v15(DigestAlgorithm::Sha384)
            }
            rfc5912::SHA_512_WITH_RSA_ENCRYPTION => {
                SignatureAlgorithm::RsaPkcs1v15(DigestAlgorithm::Sha512)
            }
            ECDSA_WITH_SHA_1 => SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha1),
            rfc5912::ECDSA_WITH_SHA_256 => SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha256),
            rfc5912::ECDSA_WITH_SHA_384 => SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha384),
            rfc5912::ECDSA_WITH_SHA_512 => SignatureAlgorithm::Ecdsa(DigestAlgorithm::Sha512),
            rfc8410::ID_ED_25519 => SignatureAlgorithm::Ed25519,
            other => {
                return Err(CaError::DecodingError(format!(
                    "Unsupported signature algorithm {other}"
                )));
            }
        })
    }
}

/// Represents a signed X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM
/// formats and typed accessors over the decoded fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl SignedCertificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_pem(pem)?,
        })
    }

    /// The serial number as an unsigned integer.
    pub fn serial(&self) -> Result<u64> {
        extensions::uint_to_u64(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.subject)
    }

    pub fn issuer(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.tbs_certificate.issuer)
    }

    pub fn validity(&self) -> Validity {
        Validity::from_x509_validity(&self.inner.tbs_certificate.validity)
    }

    /// All extensions in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from_x509_extension)
            .collect()
    }

    pub fn extension(&self, oid: &ObjectIdentifier) -> Option<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == *oid)
            .map(ExtensionParam::from_x509_extension)
    }

    /// Decodes the extension of type `E`, if present.
    pub fn extension_value<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extension(&E::OID)
            .map(|ext| ext.to_extension())
            .transpose()
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::try_from(&self.inner.signature_algorithm)
    }

    pub fn digest_algorithm(&self) -> Result<Option<DigestAlgorithm>> {
        Ok(self.signature_algorithm()?.digest())
    }

    pub fn signature(&self) -> &[u8] {
        self.inner.signature.raw_bytes()
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Checks the certificate signature against `issuer_public_key`.
    pub fn verify_signature(&self, issuer_public_key: &PublicKey) -> Result<()> {
        if self.inner.signature_algorithm != self.inner.tbs_certificate.signature {
            return Err(CaError::DecodingError(
                "outer and inner signature algorithms differ".to_string(),
            ));
        }
        let tbs = self.inner.tbs_certificate.to_der()?;
        issuer_public_key.verify(&tbs, self.signature(), self.signature_algorithm()?)
    }

    /// Whether basicConstraints marks this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        matches!(
            self.extension_value::<BasicConstraints>(),
            Ok(Some(BasicConstraints { is_ca: true, .. }))
        )
    }
}
