use std::sync::Arc;

use der::Encode;
use der::asn1::BitString;
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;

use crate::authority;
use crate::cert::SignedCertificate;
use crate::cert::params::DistinguishedName;
use crate::digest::DigestAlgorithm;
use crate::error::{CaError, Result};
use crate::key::{PublicKey, SigningBackend};
use crate::profile::SigningProfile;
use crate::serial::SerialAllocator;
use crate::tbs_certificate::{CertificateContents, TbsCertificate};

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> &DistinguishedName;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &dyn SigningBackend;

    /// Returns the public key used for authorityKeyIdentifier.
    fn issuer_public_key(&self) -> PublicKey {
        self.signing_key().public_key()
    }

    /// DER encoding of the issuer name, as hashed into OCSP CertIDs.
    fn issuer_name_der(&self) -> Result<Vec<u8>> {
        Ok(self.issuer_name().as_x509_name()?.to_der()?)
    }

    /// Signs `contents` as a v3 certificate with `digest`.
    ///
    /// The TBS structure is encoded once, the encoding is signed, and the
    /// same structure is embedded in the certificate.
    fn issue(
        &self,
        contents: CertificateContents,
        digest: DigestAlgorithm,
    ) -> Result<SignedCertificate> {
        let signature_algorithm = self.signing_key().signature_algorithm(digest)?;
        let tbs_cert = TbsCertificate::new(
            contents,
            self.issuer_name().clone(),
            signature_algorithm,
        );
        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self
            .signing_key()
            .sign(&tbs_cert_inner.to_der()?, digest)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algorithm.into(),
            signature: BitString::from_bytes(&signature)?,
        };

        Ok(SignedCertificate { inner: cert_inner })
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: &'a DistinguishedName,
    key: &'a dyn SigningBackend,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> &DistinguishedName {
        self.name
    }

    fn signing_key(&self) -> &dyn SigningBackend {
        self.key
    }
}

/// A CA certificate paired with the key that signs on its behalf.
#[derive(Clone)]
pub struct CaIdentity {
    certificate: SignedCertificate,
    name: DistinguishedName,
    key: Arc<dyn SigningBackend + Send + Sync>,
    /// Serial of the CA certificate when it shares our issuer namespace.
    self_issued_serial: Option<u64>,
}

impl std::fmt::Debug for CaIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaIdentity")
            .field("name", &self.name.to_string())
            .finish_non_exhaustive()
    }
}

impl CaIdentity {
    /// Pairs an existing CA certificate with its key.
    ///
    /// Fails with a configuration error if the key does not match the
    /// certificate's subject public key.
    pub fn new(
        certificate: SignedCertificate,
        key: Arc<dyn SigningBackend + Send + Sync>,
    ) -> Result<Self> {
        if certificate.public_key()? != key.public_key() {
            return Err(CaError::Configuration(
                "CA key does not match the CA certificate".to_string(),
            ));
        }
        let name = certificate.subject()?;
        // Serials wider than 64 bits can never collide with allocated ones.
        let self_issued_serial = if certificate.issuer()? == name {
            certificate.serial().ok()
        } else {
            None
        };
        Ok(Self {
            certificate,
            name,
            key,
            self_issued_serial,
        })
    }

    /// Issues a self-signed root certificate for `key` under `profile`.
    ///
    /// `subject` is taken as given; the profile's subject policy does not
    /// apply to the CA's own name. The serial comes from `allocator`, which
    /// should be the one the CA goes on to sign with.
    pub fn self_signed(
        key: Arc<dyn SigningBackend + Send + Sync>,
        subject: DistinguishedName,
        profile: &SigningProfile,
        allocator: &SerialAllocator,
        reference_time: OffsetDateTime,
    ) -> Result<Self> {
        let issuer = SelfIssuer {
            name: &subject,
            key: key.as_ref(),
        };
        let (certificate, serial) = authority::assemble(
            &issuer,
            profile,
            subject.clone(),
            key.public_key(),
            &[],
            || allocator.next_serial(),
            reference_time,
        )?;
        tracing::info!(subject = %subject, serial, "issued self-signed CA certificate");
        Ok(Self {
            certificate,
            name: subject,
            key,
            self_issued_serial: Some(serial),
        })
    }

    pub fn certificate(&self) -> &SignedCertificate {
        &self.certificate
    }

    /// Serial of the CA certificate if it is self-issued, and so drawn from
    /// the same serial space as the certificates this CA signs.
    pub fn self_issued_serial(&self) -> Option<u64> {
        self.self_issued_serial
    }

    /// Expiry of the CA certificate.
    pub fn not_after(&self) -> OffsetDateTime {
        self.certificate.validity().not_after
    }
}

impl Issuer for CaIdentity {
    fn issuer_name(&self) -> &DistinguishedName {
        // The name of the issuer is the subject of the certificate
        &self.name
    }

    fn signing_key(&self) -> &dyn SigningBackend {
        self.key.as_ref()
    }

    fn issuer_name_der(&self) -> Result<Vec<u8>> {
        // Leaves carry the certificate's subject bytes, not a re-encoding.
        Ok(self.certificate.inner.tbs_certificate.subject.to_der()?)
    }
}
