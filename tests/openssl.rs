mod util;

use certkit_ca::cert::extensions::{AltName, SubjectAltName};
use certkit_ca::cert::params::{DistinguishedName, ExtensionParam};
use certkit_ca::crl::RevocationReason;
use certkit_ca::digest::DigestAlgorithm;
use certkit_ca::key::KeyPair;
use certkit_ca::ocsp::OcspRequest as CaOcspRequest;
use certkit_ca::request::{CertificateRequest, Csr};
use certkit_ca::serial::{MemoryCounterStore, SerialAllocator};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::ocsp::{
    OcspCertId, OcspCertStatus, OcspFlag, OcspRequest, OcspResponse, OcspResponseStatus,
    OcspRevokedStatus,
};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509, X509Crl, X509Req, X509StoreContext};
use time::OffsetDateTime;

fn common_name(name: &openssl::x509::X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap()
        .to_string()
}

#[test]
fn test_openssl_crate_validate_cert() {
    let now = OffsetDateTime::now_utc();
    let ca = util::build_ca(now, SerialAllocator::new(MemoryCounterStore::starting_at(7, 1)));

    let server_key = KeyPair::generate_ecdsa_p256();
    let san = ExtensionParam::from_extension(
        SubjectAltName {
            names: vec![AltName::Dns("server.myca.local".to_string())],
        },
        false,
    )
    .unwrap();
    let request = util::request_for(
        &server_key,
        Some(
            DistinguishedName::builder()
                .common_name("server.myca.local")
                .build(),
        ),
        vec![san],
    );
    let server_cert = ca.sign(&request, "web", now).unwrap();

    let x509 = X509::from_pem(server_cert.to_pem().unwrap().as_bytes()).expect("Failed to parse PEM");
    assert_eq!(common_name(x509.subject_name()), "server.myca.local");
    assert_eq!(common_name(x509.issuer_name()), "myca.local");
    assert_eq!(x509.version(), 2, "X509 version should be 3 (0-based index)");

    let serial = x509.serial_number().to_bn().unwrap().to_dec_str().unwrap();
    // 7 went to the CA certificate
    assert_eq!(serial.to_string(), "8");
    assert_eq!(
        x509.signature_algorithm().object().nid(),
        Nid::ECDSA_WITH_SHA256
    );

    let names = x509.subject_alt_names().unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names.get(0).unwrap().dnsname(), Some("server.myca.local"));

    let ca_x509 = X509::from_der(&ca.certificate().to_der().unwrap()).unwrap();
    assert_eq!(
        x509.authority_key_id().unwrap().as_slice(),
        ca_x509.subject_key_id().unwrap().as_slice()
    );
    assert!(x509.verify(&ca_x509.public_key().unwrap()).unwrap());
}

#[test]
fn test_openssl_verifies_chain() {
    let now = OffsetDateTime::now_utc();
    let ca = util::build_ca(now, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p384();
    let cert = ca
        .sign(&CertificateRequest::from_public_key(key.public_key()), "server-tls", now)
        .unwrap();

    let ca_x509 = X509::from_der(&ca.certificate().to_der().unwrap()).unwrap();
    let leaf = X509::from_der(&cert.to_der().unwrap()).unwrap();

    let mut builder = X509StoreBuilder::new().unwrap();
    builder.add_cert(ca_x509).unwrap();
    let store = builder.build();

    let chain = Stack::new().unwrap();
    let mut context = X509StoreContext::new().unwrap();
    let verified = context
        .init(&store, &leaf, &chain, |c| c.verify_cert())
        .unwrap();
    assert!(verified, "chain verification failed");
}

fn verify_chain(ca: &X509, leaf: &X509) -> bool {
    let mut builder = X509StoreBuilder::new().unwrap();
    builder.add_cert(ca.clone()).unwrap();
    let store = builder.build();
    let chain = Stack::new().unwrap();
    let mut context = X509StoreContext::new().unwrap();
    context
        .init(&store, leaf, &chain, |c| c.verify_cert())
        .unwrap()
}

#[test]
fn test_openssl_verifies_p521_chain() {
    let now = OffsetDateTime::now_utc();
    let ca = util::build_ca_with_key(KeyPair::generate_ecdsa_p521(), now, SerialAllocator::in_memory());
    let key = KeyPair::generate_ecdsa_p256();
    let cert = ca
        .sign(&CertificateRequest::from_public_key(key.public_key()), "server-tls", now)
        .unwrap();

    let ca_x509 = X509::from_der(&ca.certificate().to_der().unwrap()).unwrap();
    let leaf = X509::from_der(&cert.to_der().unwrap()).unwrap();
    assert_eq!(
        leaf.signature_algorithm().object().nid(),
        Nid::ECDSA_WITH_SHA256
    );
    assert!(verify_chain(&ca_x509, &leaf), "P-521 chain verification failed");
}

#[test]
fn test_openssl_accepts_rsa_signatures() {
    let now = OffsetDateTime::now_utc();
    let allocator = SerialAllocator::in_memory();
    let identity = util::generate_ca(KeyPair::generate_rsa(2048).unwrap(), &allocator, now);
    let ca = certkit_ca::authority::CertificateAuthority::new(
        identity,
        std::collections::HashMap::from([("web".to_string(), util::web_profile())]),
        certkit_ca::oid::OidRegistry::with_defaults(),
        allocator,
    );
    let key = KeyPair::generate_ed25519();
    let request = util::request_for(
        &key,
        Some(DistinguishedName::builder().common_name("rsa.example.com").build()),
        vec![],
    );
    let cert = ca.sign(&request, "web", now).unwrap();

    let ca_x509 = X509::from_der(&ca.certificate().to_der().unwrap()).unwrap();
    let leaf = X509::from_der(&cert.to_der().unwrap()).unwrap();
    assert_eq!(
        leaf.signature_algorithm().object().nid(),
        Nid::SHA256WITHRSAENCRYPTION
    );
    assert!(leaf.verify(&ca_x509.public_key().unwrap()).unwrap());
}

#[test]
fn test_openssl_parses_crl() {
    let now = OffsetDateTime::now_utc();
    let ca = util::build_ca(now, SerialAllocator::in_memory());
    ca.revoke(17, RevocationReason::Superseded, now).unwrap();
    ca.revoke(4, RevocationReason::KeyCompromise, now).unwrap();
    let crl = ca.issue_crl(now).unwrap();

    let parsed = X509Crl::from_pem(crl.to_pem().unwrap().as_bytes()).unwrap();
    let ca_x509 = X509::from_der(&ca.certificate().to_der().unwrap()).unwrap();
    assert!(parsed.verify(&ca_x509.public_key().unwrap()).unwrap());
    assert_eq!(common_name(parsed.issuer_name()), "myca.local");

    let serials: Vec<String> = parsed
        .get_revoked()
        .unwrap()
        .iter()
        .map(|entry| {
            entry
                .serial_number()
                .to_bn()
                .unwrap()
                .to_dec_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(serials, vec!["4", "17"]);
}

#[test]
fn test_openssl_verifies_generated_csr() {
    let key = KeyPair::generate_ecdsa_p256();
    let csr = Csr::generate(
        &key,
        &DistinguishedName::builder()
            .organization("Example Corp")
            .common_name("csr.example.com")
            .build(),
        &[],
        DigestAlgorithm::Sha256,
    )
    .unwrap();

    let req = X509Req::from_pem(csr.to_pem().unwrap().as_bytes()).unwrap();
    assert!(req.verify(&req.public_key().unwrap()).unwrap());
    assert_eq!(common_name(req.subject_name()), "csr.example.com");
}

#[test]
fn test_openssl_reads_ocsp_responses() {
    let now = OffsetDateTime::now_utc();
    let ca = util::build_ca(now, SerialAllocator::in_memory());
    let sign = |cn: &str| {
        let key = KeyPair::generate_ecdsa_p256();
        let request = util::request_for(
            &key,
            Some(DistinguishedName::builder().common_name(cn).build()),
            vec![],
        );
        ca.sign(&request, "web", now).unwrap()
    };
    let good = sign("good.example.com");
    let revoked = sign("revoked.example.com");
    ca.revoke(
        revoked.serial().unwrap(),
        RevocationReason::KeyCompromise,
        now,
    )
    .unwrap();

    let ca_x509 = X509::from_der(&ca.certificate().to_der().unwrap()).unwrap();
    let good_x509 = X509::from_der(&good.to_der().unwrap()).unwrap();
    let revoked_x509 = X509::from_der(&revoked.to_der().unwrap()).unwrap();
    let good_id = || OcspCertId::from_cert(MessageDigest::sha1(), &good_x509, &ca_x509).unwrap();
    let revoked_id =
        || OcspCertId::from_cert(MessageDigest::sha1(), &revoked_x509, &ca_x509).unwrap();

    let mut request = OcspRequest::new().unwrap();
    request.add_id(good_id()).unwrap();
    request.add_id(revoked_id()).unwrap();
    let request = CaOcspRequest::from_der(&request.to_der().unwrap()).unwrap();

    let response = ca.respond_ocsp(&request, now).unwrap();
    let parsed = OcspResponse::from_der(&response.to_der().unwrap()).unwrap();
    assert_eq!(parsed.status(), OcspResponseStatus::SUCCESSFUL);
    let basic = parsed.basic().unwrap();

    let mut certs = Stack::new().unwrap();
    certs.push(ca_x509.clone()).unwrap();
    let mut builder = X509StoreBuilder::new().unwrap();
    builder.add_cert(ca_x509.clone()).unwrap();
    let store = builder.build();
    basic.verify(&certs, &store, OcspFlag::empty()).unwrap();

    let good_status = basic.find_status(&good_id()).unwrap();
    assert_eq!(good_status.status, OcspCertStatus::GOOD);
    good_status.check_validity(300, None).unwrap();

    let revoked_status = basic.find_status(&revoked_id()).unwrap();
    assert_eq!(revoked_status.status, OcspCertStatus::REVOKED);
    assert_eq!(revoked_status.reason, OcspRevokedStatus::KEY_COMPROMISE);
    assert!(revoked_status.revocation_time.is_some());
}
