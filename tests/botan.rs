mod util;

use botan::Certificate as BotanCertificate;

use certkit_ca::cert::params::DistinguishedName;
use certkit_ca::key::KeyPair;
use certkit_ca::serial::SerialAllocator;
use time::OffsetDateTime;

fn check_cert(cert_der: &[u8]) {
    BotanCertificate::load(cert_der).expect("Botan failed to parse certificate");
}

/// Self-signed root for `key` plus one leaf issued by it.
fn root_and_leaf(ca_key: KeyPair, leaf_key: KeyPair) -> (Vec<u8>, Vec<u8>) {
    let now = OffsetDateTime::now_utc();
    let allocator = SerialAllocator::in_memory();
    let identity = util::generate_ca(ca_key, &allocator, now);
    let ca = certkit_ca::authority::CertificateAuthority::new(
        identity,
        std::collections::HashMap::from([("web".to_string(), util::web_profile())]),
        certkit_ca::oid::OidRegistry::with_defaults(),
        allocator,
    );
    let request = util::request_for(
        &leaf_key,
        Some(
            DistinguishedName::builder()
                .organization("Crab widgits SE")
                .common_name("crabs.crabs")
                .build(),
        ),
        vec![],
    );
    let leaf = ca.sign(&request, "web", now).unwrap();
    (
        ca.certificate().to_der().unwrap(),
        leaf.to_der().unwrap(),
    )
}

#[test]
#[ignore]
fn test_botan_ecdsa_p256() {
    let (root, leaf) = root_and_leaf(KeyPair::generate_ecdsa_p256(), KeyPair::generate_ecdsa_p256());
    check_cert(&root);
    check_cert(&leaf);
}

#[test]
#[ignore]
fn test_botan_ed25519() {
    let (root, leaf) = root_and_leaf(KeyPair::generate_ed25519(), KeyPair::generate_ed25519());
    check_cert(&root);
    check_cert(&leaf);
}

#[test]
#[ignore]
fn test_botan_ecdsa_p384() {
    let (root, leaf) = root_and_leaf(KeyPair::generate_ecdsa_p384(), KeyPair::generate_ecdsa_p256());
    check_cert(&root);
    check_cert(&leaf);
}

#[test]
#[ignore]
fn test_botan_ecdsa_p521() {
    let (root, leaf) = root_and_leaf(KeyPair::generate_ecdsa_p521(), KeyPair::generate_ecdsa_p384());
    check_cert(&root);
    check_cert(&leaf);
}

#[test]
#[ignore]
fn test_botan_rsa() {
    let (root, leaf) = root_and_leaf(
        KeyPair::generate_rsa(2048).unwrap(),
        KeyPair::generate_rsa(2048).unwrap(),
    );
    check_cert(&root);
    check_cert(&leaf);
}
