#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use certkit_ca::authority::CertificateAuthority;
use certkit_ca::cert::builder::ExtensionSpec;
use certkit_ca::cert::extensions::{
    BasicConstraints, ExtendedKeyUsageOption, KeyUsage, KeyUsages, SubjectAltName,
    ToAndFromX509Extension,
};
use certkit_ca::cert::params::{DistinguishedName, ExtensionParam};
use certkit_ca::crl::CrlPolicy;
use certkit_ca::digest::DigestAlgorithm;
use certkit_ca::issuer::CaIdentity;
use certkit_ca::key::{KeyPair, SigningBackend};
use certkit_ca::ocsp::OcspPolicy;
use certkit_ca::oid::OidRegistry;
use certkit_ca::profile::{SigningProfile, SubjectPolicy};
use certkit_ca::request::CertificateRequest;
use certkit_ca::serial::SerialAllocator;
use certkit_ca::validity::ValidityPolicy;
use time::{Duration, OffsetDateTime};

pub fn ca_subject() -> DistinguishedName {
    DistinguishedName::builder()
        .country("US")
        .organization("Example Corp")
        .common_name("myca.local")
        .build()
}

pub fn generate_ca(
    key: KeyPair,
    allocator: &SerialAllocator,
    reference_time: OffsetDateTime,
) -> CaIdentity {
    let profile = SigningProfile::builder()
        .name("root")
        .validity(ValidityPolicy::Relative {
            duration: Duration::days(3650),
        })
        .subject_policy(SubjectPolicy::UseRequested)
        .basic_constraints(BasicConstraints {
            is_ca: true,
            max_path_length: None,
        })
        .key_usage(KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign))
        .build()
        .unwrap();
    let key: Arc<dyn SigningBackend + Send + Sync> = Arc::new(key);
    CaIdentity::self_signed(key, ca_subject(), &profile, allocator, reference_time).unwrap()
}

/// Reject policy with a fixed subject and no basicConstraints.
pub fn server_tls_profile() -> SigningProfile {
    SigningProfile::builder()
        .name("server-tls")
        .validity(ValidityPolicy::Relative {
            duration: Duration::days(365),
        })
        .subject_policy(SubjectPolicy::Reject)
        .subject(
            DistinguishedName::builder()
                .organization("Example Corp")
                .common_name("server.myca.local")
                .build(),
        )
        .key_usage(KeyUsage(KeyUsages::DigitalSignature.into()))
        .extended_key_usage(vec![ExtendedKeyUsageOption::ServerAuth])
        .build()
        .unwrap()
}

/// Uses the requested subject and copies a requested subjectAltName.
pub fn web_profile() -> SigningProfile {
    SigningProfile::builder()
        .name("web")
        .validity(ValidityPolicy::Relative {
            duration: Duration::days(90),
        })
        .subject_policy(SubjectPolicy::UseRequested)
        .basic_constraints(BasicConstraints::default())
        .extended_key_usage(vec![
            ExtendedKeyUsageOption::ServerAuth,
            ExtendedKeyUsageOption::ClientAuth,
        ])
        .extensions(vec![ExtensionSpec::copy_if_present(
            SubjectAltName::OID,
            false,
            None,
        )])
        .build()
        .unwrap()
}

pub fn crl_policy() -> CrlPolicy {
    CrlPolicy::new(
        ValidityPolicy::Relative {
            duration: Duration::days(7),
        },
        DigestAlgorithm::Sha256,
    )
    .unwrap()
}

pub fn ocsp_policy() -> OcspPolicy {
    OcspPolicy::new(
        ValidityPolicy::Relative {
            duration: Duration::hours(12),
        },
        DigestAlgorithm::Sha256,
    )
    .unwrap()
}

pub fn build_ca(reference_time: OffsetDateTime, allocator: SerialAllocator) -> CertificateAuthority {
    build_ca_with_key(KeyPair::generate_ecdsa_p256(), reference_time, allocator)
}

pub fn build_ca_with_key(
    key: KeyPair,
    reference_time: OffsetDateTime,
    allocator: SerialAllocator,
) -> CertificateAuthority {
    let identity = generate_ca(key, &allocator, reference_time);
    let profiles = HashMap::from([
        ("server-tls".to_string(), server_tls_profile()),
        ("web".to_string(), web_profile()),
    ]);
    CertificateAuthority::new(identity, profiles, OidRegistry::with_defaults(), allocator)
        .with_crl_policy(crl_policy())
        .with_ocsp_policy(ocsp_policy())
}

pub fn request_for(
    key: &KeyPair,
    subject: Option<DistinguishedName>,
    extensions: Vec<ExtensionParam>,
) -> CertificateRequest {
    CertificateRequest::builder()
        .public_key(key.public_key())
        .maybe_requested_subject(subject)
        .requested_extensions(extensions)
        .build()
}
