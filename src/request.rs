//! Certificate requests, from raw public keys or PKCS#10 CSRs.
//!
//! Everything in a request is requester-controlled. The signing engine
//! decides what of it survives into a certificate.

use bon::Builder;
use const_oid::AssociatedOid;
use der::asn1::{Any, BitString, SetOfVec};
use der::{Decode, DecodePem, Encode, EncodePem};
use x509_cert::attr::Attribute;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};

use crate::cert::SignatureAlgorithm;
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::digest::DigestAlgorithm;
use crate::error::{CaError, Result};
use crate::key::{PublicKey, SigningBackend};

/// What a requester asks the CA to sign.
#[derive(Debug, Clone, Builder)]
pub struct CertificateRequest {
    pub public_key: PublicKey,
    #[builder(default)]
    pub requested_extensions: Vec<ExtensionParam>,
    pub requested_subject: Option<DistinguishedName>,
}

impl CertificateRequest {
    /// A request carrying only a public key.
    pub fn from_public_key(public_key: PublicKey) -> Self {
        Self {
            public_key,
            requested_extensions: Vec::new(),
            requested_subject: None,
        }
    }

    /// Parses and verifies a DER-encoded CSR.
    pub fn from_csr_der(der: &[u8]) -> Result<Self> {
        Csr::from_der(der)?.to_request()
    }

    /// Parses and verifies a PEM-encoded CSR.
    pub fn from_csr_pem(pem: &str) -> Result<Self> {
        Csr::from_pem(pem)?.to_request()
    }
}

/// A PKCS#10 certification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Csr {
    pub inner: CertReq,
}

impl Csr {
    /// Builds and self-signs a CSR for `key`.
    ///
    /// Non-empty `extensions` are carried in an extensionRequest attribute.
    pub fn generate(
        key: &dyn SigningBackend,
        subject: &DistinguishedName,
        extensions: &[ExtensionParam],
        digest: DigestAlgorithm,
    ) -> Result<Self> {
        let mut attributes = SetOfVec::new();
        if !extensions.is_empty() {
            let requested = ExtensionReq(
                extensions
                    .iter()
                    .map(ExtensionParam::to_x509_extension)
                    .collect::<Result<Vec<_>>>()?,
            );
            let mut values = SetOfVec::new();
            values.insert(Any::from_der(&requested.to_der()?)?)?;
            attributes.insert(Attribute {
                oid: ExtensionReq::OID,
                values,
            })?;
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.as_x509_name()?,
            public_key: key.public_key().to_spki()?,
            attributes,
        };

        let algorithm = key.signature_algorithm(digest)?;
        let signature = key.sign(&info.to_der()?, digest)?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: algorithm.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.inner.to_der()?)
    }

    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_der(der)?,
        })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self {
            inner: CertReq::from_pem(pem)?,
        })
    }

    pub fn subject(&self) -> Result<DistinguishedName> {
        DistinguishedName::from_x509_name(&self.inner.info.subject)
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.info.public_key)
    }

    /// Extensions from every extensionRequest attribute, in order.
    pub fn requested_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != ExtensionReq::OID {
                continue;
            }
            for value in attribute.values.iter() {
                let requested = ExtensionReq::from_der(&value.to_der()?)?;
                extensions.extend(requested.0.iter().map(ExtensionParam::from_x509_extension));
            }
        }
        Ok(extensions)
    }

    /// Checks the self-signature against the embedded public key.
    pub fn verify(&self) -> Result<()> {
        let algorithm = SignatureAlgorithm::try_from(&self.inner.algorithm)?;
        self.public_key()?.verify(
            &self.inner.info.to_der()?,
            self.inner.signature.raw_bytes(),
            algorithm,
        )
    }

    /// Verifies the CSR and turns it into a [`CertificateRequest`].
    ///
    /// An empty subject becomes `None`.
    pub fn to_request(&self) -> Result<CertificateRequest> {
        self.verify()?;
        let subject = self.subject()?;
        Ok(CertificateRequest {
            public_key: self.public_key()?,
            requested_extensions: self.requested_extensions()?,
            requested_subject: (!subject.is_empty()).then_some(subject),
        })
    }
}
