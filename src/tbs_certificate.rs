use bon::Builder;
use der::Encode;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::uint_to_u64;
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::error::{CaError, Result};
use crate::key::PublicKey;
use crate::validity::Validity;

/// Subject-side contents of a certificate. The issuer supplies its name and
/// signature algorithm when turning this into a [`TbsCertificate`].
#[derive(Clone, Debug, Builder)]
pub struct CertificateContents {
    pub serial_number: u64,
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub validity: Validity,
    #[builder(default)]
    pub extensions: Vec<ExtensionParam>,
}

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - The unique identifier for the certificate.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
#[derive(Clone, Debug)]
pub struct TbsCertificate {
    pub serial_number: u64,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: DistinguishedName,
    pub validity: Validity,
    pub subject: DistinguishedName,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

/// Big-endian bytes of `value` without leading zero octets.
pub(crate) fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

impl TbsCertificate {
    pub fn new(
        contents: CertificateContents,
        issuer: DistinguishedName,
        signature_algorithm: SignatureAlgorithm,
    ) -> Self {
        Self {
            serial_number: contents.serial_number,
            signature_algorithm,
            issuer,
            validity: contents.validity,
            subject: contents.subject,
            subject_public_key: contents.subject_public_key,
            extensions: contents.extensions,
        }
    }

    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    ///
    /// Fields are emitted in RFC 5280 order; the version is always v3.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        if self.serial_number == 0 {
            return Err(CaError::InvalidInput(
                "certificate serial number must be positive".to_string(),
            ));
        }

        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509_extension)
            .collect::<Result<Vec<_>>>()?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number: SerialNumber::new(&minimal_be_bytes(self.serial_number))?,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.as_x509_name()?,
            validity: self.validity.to_x509_validity()?,
            subject: self.subject.as_x509_name()?,
            subject_public_key_info: self.subject_public_key.to_spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        Ok(Self {
            serial_number: uint_to_u64(inner.serial_number.as_bytes())?,
            signature_algorithm: SignatureAlgorithm::try_from(&inner.signature)?,
            issuer: DistinguishedName::from_x509_name(&inner.issuer)?,
            validity: Validity::from_x509_validity(&inner.validity),
            subject: DistinguishedName::from_x509_name(&inner.subject)?,
            subject_public_key: PublicKey::from_x509spki(&inner.subject_public_key_info)?,
            extensions: inner
                .extensions
                .iter()
                .flatten()
                .map(ExtensionParam::from_x509_extension)
                .collect(),
        })
    }

    /// Encodes the `TbsCertificate` into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_tbs_certificate_inner()?.to_der()?)
    }
}
