//! # certkit-ca - A Programmable Certificate Authority in Pure Rust
//!
//! certkit-ca turns certificate requests into signed X.509 certificates under
//! configuration-driven signing profiles, and assembles signed CRLs and OCSP
//! responses from revocation records. It is built on the RustCrypto crates; openssl and
//! botan are only used to cross-check output in tests.
//!
//! Requester input (subject names and requested extensions) is never trusted
//! as-is: each profile decides which parts survive and which are replaced by
//! CA-controlled values.
//!
//! ## Supported Key Types
//!
//! - **RSA**: 2048, 3072, and 4096-bit keys (PKCS#1 v1.5 signatures)
//! - **ECDSA**: P-256, P-384, and P-521 curves
//! - **Ed25519**: Edwards curve digital signature algorithm
//!
//! ## Quick Start
//!
//! ### Creating a CA and signing a request
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use certkit_ca::{
//!     authority::CertificateAuthority,
//!     cert::{extensions::BasicConstraints, params::DistinguishedName},
//!     issuer::CaIdentity,
//!     key::KeyPair,
//!     oid::OidRegistry,
//!     profile::{SigningProfile, SubjectPolicy},
//!     request::CertificateRequest,
//!     serial::SerialAllocator,
//!     validity::ValidityPolicy,
//! };
//! use time::{Duration, OffsetDateTime};
//!
//! # fn main() -> Result<(), certkit_ca::error::CaError> {
//! let now = OffsetDateTime::now_utc();
//!
//! let root_profile = SigningProfile::builder()
//!     .name("root")
//!     .validity(ValidityPolicy::Relative { duration: Duration::days(3650) })
//!     .subject_policy(SubjectPolicy::UseRequested)
//!     .basic_constraints(BasicConstraints { is_ca: true, max_path_length: None })
//!     .build()?;
//! let allocator = SerialAllocator::in_memory();
//! let identity = CaIdentity::self_signed(
//!     Arc::new(KeyPair::generate_ecdsa_p256()),
//!     DistinguishedName::builder().common_name("Example Root").build(),
//!     &root_profile,
//!     &allocator,
//!     now,
//! )?;
//!
//! let server = SigningProfile::builder()
//!     .name("server")
//!     .validity(ValidityPolicy::Relative { duration: Duration::days(90) })
//!     .subject_policy(SubjectPolicy::UseRequested)
//!     .build()?;
//!
//! let ca = CertificateAuthority::new(
//!     identity,
//!     HashMap::from([("server".to_string(), server)]),
//!     OidRegistry::with_defaults(),
//!     allocator,
//! );
//!
//! let request = CertificateRequest::builder()
//!     .public_key(KeyPair::generate_ed25519().public_key())
//!     .requested_subject(DistinguishedName::builder().common_name("www.example.com").build())
//!     .build();
//! let certificate = ca.sign(&request, "server", now)?;
//! println!("{}", certificate.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Loading profiles from YAML
//!
//! ```rust,no_run
//! use certkit_ca::{authority::CertificateAuthority, config::CaConfig, issuer::CaIdentity,
//!     serial::SerialAllocator};
//!
//! # fn load(identity: CaIdentity) -> Result<(), certkit_ca::error::CaError> {
//! let config = CaConfig::from_yaml_file("ca.yaml")?;
//! let ca = CertificateAuthority::from_config(&config, identity, SerialAllocator::in_memory())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::Result`]; failures are classified by
//! [`error::ErrorKind`]:
//!
//! ```rust
//! use certkit_ca::{key::KeyPair, error::CaError};
//!
//! match KeyPair::import_from_pkcs8_pem("invalid pem data") {
//!     Ok(_) => println!("Key imported successfully"),
//!     Err(CaError::DecodingError(msg)) => println!("Failed to decode key: {}", msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`oid`]: short name to OID registry
//! - [`validity`]: validity policies and window computation
//! - [`cert`]: certificates, extensions and the extension builder
//! - [`serial`]: serial and CRL number allocation
//! - [`profile`]: signing profiles and subject policy
//! - [`authority`]: the signing engine
//! - [`crl`]: revocation state and CRL assembly
//! - [`ocsp`]: OCSP responses from the revocation state
//! - [`request`]: certificate requests and PKCS#10 CSRs
//! - [`key`]: key generation, import/export and the signing backend
//! - [`config`]: YAML configuration
//! - [`error`]: error types

pub mod authority;
pub mod cert;
pub mod config;
pub mod crl;
pub mod digest;
pub mod error;
pub mod issuer;
pub mod key;
pub mod ocsp;
pub mod oid;
pub mod profile;
pub mod request;
pub mod serial;
pub mod tbs_certificate;
pub mod validity;
