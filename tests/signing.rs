mod util;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use certkit_ca::cert::SignedCertificate;
use certkit_ca::cert::extensions::{
    AltName, AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption,
    SubjectAltName, SubjectKeyIdentifier, ToAndFromX509Extension,
};
use certkit_ca::cert::params::{DistinguishedName, ExtensionParam};
use certkit_ca::digest::DigestAlgorithm;
use certkit_ca::error::{CaError, ErrorKind};
use certkit_ca::key::KeyPair;
use certkit_ca::profile::{SigningProfile, SubjectPolicy};
use certkit_ca::request::{CertificateRequest, Csr};
use certkit_ca::serial::{MemoryCounterStore, SerialAllocator};
use certkit_ca::validity::{self, ValidityPolicy};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const NOW: OffsetDateTime = datetime!(2024-03-01 09:30:00 UTC);

fn ca_basic_constraints() -> ExtensionParam {
    ExtensionParam::from_extension(
        BasicConstraints {
            is_ca: true,
            max_path_length: None,
        },
        true,
    )
    .unwrap()
}

#[test]
fn requested_ca_flag_is_not_smuggled_through() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p256();
    let request = util::request_for(&key, None, vec![ca_basic_constraints()]);

    let cert = ca.sign(&request, "server-tls", NOW).unwrap();

    assert!(!cert.is_ca());
    assert!(cert.extension(&BasicConstraints::OID).is_none());
    assert_eq!(cert.validity().not_before, NOW);
    assert_eq!(cert.validity().not_after, NOW + Duration::days(365));
    assert_eq!(cert.digest_algorithm().unwrap(), Some(DigestAlgorithm::Sha256));
}

#[test]
fn profile_basic_constraints_win_over_requested() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let key = KeyPair::generate_ed25519();
    let subject = DistinguishedName::builder().common_name("www.example.com").build();
    let request = util::request_for(&key, Some(subject), vec![ca_basic_constraints()]);

    let cert = ca.sign(&request, "web", NOW).unwrap();
    let bc = cert.extension_value::<BasicConstraints>().unwrap().unwrap();
    assert!(!bc.is_ca);
    assert!(!cert.is_ca());
}

#[test]
fn inverted_absolute_window_emits_nothing() {
    let policy = ValidityPolicy::Absolute {
        not_before: datetime!(2024-01-01 00:00:00 UTC),
        not_after: datetime!(2023-01-01 00:00:00 UTC),
    };
    let err = validity::compute_window(&policy, NOW).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let profile = SigningProfile::builder()
        .name("broken")
        .validity(ValidityPolicy::Absolute {
            not_before: datetime!(2024-01-01 00:00:00 UTC),
            not_after: datetime!(2023-01-01 00:00:00 UTC),
        })
        .subject_policy(SubjectPolicy::UseRequested)
        .build();
    assert_eq!(profile.unwrap_err().kind(), ErrorKind::Configuration);
}

#[test]
fn concurrent_signing_yields_distinct_increasing_serials() {
    let ca = Arc::new(util::build_ca(
        NOW,
        SerialAllocator::new(MemoryCounterStore::starting_at(1000, 1)),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ca = Arc::clone(&ca);
            thread::spawn(move || {
                let key = KeyPair::generate_ecdsa_p256();
                let subject = DistinguishedName::builder()
                    .common_name(format!("host{i}.example.com"))
                    .build();
                let request = util::request_for(&key, Some(subject), vec![]);
                ca.sign(&request, "web", NOW).unwrap().serial().unwrap()
            })
        })
        .collect();

    let serials: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let distinct: HashSet<_> = serials.iter().copied().collect();
    assert_eq!(distinct.len(), serials.len());
    assert!(serials.iter().all(|s| *s > 1000));
    assert!(!distinct.contains(&ca.certificate().serial().unwrap()));
}

#[test]
fn leaf_serial_never_repeats_the_ca_serial() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let ca_serial = ca.certificate().serial().unwrap();
    assert_eq!(ca.identity().self_issued_serial(), Some(ca_serial));

    let key = KeyPair::generate_ecdsa_p256();
    let leaf = ca
        .sign(&CertificateRequest::from_public_key(key.public_key()), "server-tls", NOW)
        .unwrap();
    assert_ne!(leaf.serial().unwrap(), ca_serial);
    assert_eq!(leaf.issuer().unwrap(), ca.certificate().subject().unwrap());
}

#[test]
fn p521_ca_signs_with_the_default_digest() {
    let ca = util::build_ca_with_key(
        KeyPair::generate_ecdsa_p521(),
        NOW,
        SerialAllocator::in_memory(),
    );
    let ca_key = ca.certificate().public_key().unwrap();
    ca.certificate().verify_signature(&ca_key).unwrap();

    let key = KeyPair::generate_ecdsa_p256();
    let leaf = ca
        .sign(&CertificateRequest::from_public_key(key.public_key()), "server-tls", NOW)
        .unwrap();
    assert_eq!(leaf.digest_algorithm().unwrap(), Some(DigestAlgorithm::Sha256));
    leaf.verify_signature(&ca_key).unwrap();
    assert_eq!(leaf.serial().unwrap(), 2);

    // the CRL path signs with the same digest
    let crl = ca.issue_crl(NOW).unwrap();
    crl.verify_signature(&ca_key).unwrap();
}

#[test]
fn reject_policy_refuses_requested_subject() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p256();
    let subject = DistinguishedName::builder().common_name("evil.example.com").build();
    let request = util::request_for(&key, Some(subject), vec![]);

    let err = ca.sign(&request, "server-tls", NOW).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyViolation);
}

#[test]
fn reject_policy_without_requested_subject_uses_profile_subject() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p256();
    let cert = ca
        .sign(&CertificateRequest::from_public_key(key.public_key()), "server-tls", NOW)
        .unwrap();
    assert_eq!(
        cert.subject().unwrap().common_name(),
        Some("server.myca.local")
    );
}

#[test]
fn unknown_profile_is_reported() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p256();
    let err = ca
        .sign(&CertificateRequest::from_public_key(key.public_key()), "nope", NOW)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownProfile);
}

#[test]
fn issued_certificate_verifies_and_round_trips() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p384();
    let subject = DistinguishedName::builder()
        .organization("Example Corp")
        .common_name("api.example.com")
        .build();
    let cert = ca
        .sign(&util::request_for(&key, Some(subject.clone()), vec![]), "web", NOW)
        .unwrap();

    let ca_key = ca.certificate().public_key().unwrap();
    cert.verify_signature(&ca_key).unwrap();
    ca.certificate().verify_signature(&ca_key).unwrap();

    let other = KeyPair::generate_ecdsa_p256().public_key();
    assert!(cert.verify_signature(&other).is_err());

    let from_der = SignedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
    let from_pem = SignedCertificate::from_pem(&cert.to_pem().unwrap()).unwrap();
    assert_eq!(from_der.to_der().unwrap(), cert.to_der().unwrap());
    assert_eq!(from_pem.to_der().unwrap(), cert.to_der().unwrap());

    assert_eq!(cert.subject().unwrap(), subject);
    assert_eq!(cert.issuer().unwrap(), util::ca_subject());
    assert_eq!(cert.public_key().unwrap(), key.public_key());
}

#[test]
fn extensions_follow_profile_order_and_key_identifiers_link_up() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p256();
    let san = ExtensionParam::from_extension(
        SubjectAltName {
            names: vec![AltName::Dns("www.example.com".to_string())],
        },
        true,
    )
    .unwrap();
    let request = util::request_for(
        &key,
        Some(DistinguishedName::builder().common_name("www.example.com").build()),
        vec![san],
    );
    let cert = ca.sign(&request, "web", NOW).unwrap();

    let oids: Vec<_> = cert.extensions().iter().map(|ext| ext.oid).collect();
    assert_eq!(
        oids,
        vec![
            BasicConstraints::OID,
            ExtendedKeyUsage::OID,
            SubjectAltName::OID,
            SubjectKeyIdentifier::OID,
            AuthorityKeyIdentifier::OID,
        ]
    );

    // copy-if-present forces the profile criticality
    assert!(!cert.extension(&SubjectAltName::OID).unwrap().critical);
    let eku = cert.extension_value::<ExtendedKeyUsage>().unwrap().unwrap();
    assert_eq!(
        eku.usage,
        vec![
            ExtendedKeyUsageOption::ServerAuth,
            ExtendedKeyUsageOption::ClientAuth
        ]
    );

    let ski = cert.extension_value::<SubjectKeyIdentifier>().unwrap().unwrap();
    assert_eq!(ski.0, key.public_key().key_identifier().unwrap());

    let aki = cert.extension_value::<AuthorityKeyIdentifier>().unwrap().unwrap();
    let ca_ski = ca
        .certificate()
        .extension_value::<SubjectKeyIdentifier>()
        .unwrap()
        .unwrap();
    assert_eq!(aki.key_identifier, ca_ski.0);
}

#[test]
fn csr_flows_through_signing() {
    let ca = util::build_ca(NOW, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p256();
    let san = ExtensionParam::from_extension(
        SubjectAltName {
            names: vec![
                AltName::Dns("mail.example.com".to_string()),
                AltName::Ip("192.0.2.10".parse().unwrap()),
            ],
        },
        false,
    )
    .unwrap();
    let csr = Csr::generate(
        &key,
        &DistinguishedName::builder().common_name("mail.example.com").build(),
        &[san.clone(), ca_basic_constraints()],
        DigestAlgorithm::Sha256,
    )
    .unwrap();

    let request = CertificateRequest::from_csr_pem(&csr.to_pem().unwrap()).unwrap();
    assert_eq!(request.requested_extensions.len(), 2);

    let cert = ca.sign(&request, "web", NOW).unwrap();
    assert_eq!(cert.extension(&SubjectAltName::OID).unwrap().value, san.value);
    assert!(!cert.is_ca());
    assert_eq!(
        cert.subject().unwrap().common_name(),
        Some("mail.example.com")
    );
}

#[test]
fn relative_to_expiry_is_capped_by_the_ca() {
    let allocator = SerialAllocator::in_memory();
    let identity = util::generate_ca(KeyPair::generate_ecdsa_p256(), &allocator, NOW);
    let profile = SigningProfile::builder()
        .name("sub")
        .validity(ValidityPolicy::RelativeToExpiry {
            duration: Duration::days(36500),
            anchor: identity.not_after(),
        })
        .subject_policy(SubjectPolicy::UseRequested)
        .build()
        .unwrap();
    let ca = certkit_ca::authority::CertificateAuthority::new(
        identity,
        std::collections::HashMap::from([("sub".to_string(), profile)]),
        certkit_ca::oid::OidRegistry::with_defaults(),
        allocator,
    );

    let key = KeyPair::generate_ed25519();
    let request = util::request_for(
        &key,
        Some(DistinguishedName::builder().common_name("sub").build()),
        vec![],
    );
    let cert = ca.sign(&request, "sub", NOW).unwrap();
    assert_eq!(cert.validity().not_after, ca.identity().not_after());

    let late = ca.identity().not_after() + Duration::seconds(1);
    let err = ca.sign(&request, "sub", late).unwrap_err();
    assert!(matches!(err, CaError::ExpiredAnchor { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
