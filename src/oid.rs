//! Short-name registry for object identifiers.
//!
//! The registry maps human-friendly names such as `basicConstraints` or
//! `jurisdictionOfIncorporationCountryName` to dotted-decimal OIDs. It is
//! populated once at start-up (usually via [`OidRegistry::with_defaults`]
//! followed by any custom registrations from configuration) and then shared
//! read-only, typically behind an `Arc`.

use std::collections::HashMap;
use std::sync::OnceLock;

use const_oid::{AssociatedOid, ObjectIdentifier};
use regex::Regex;
use serde::Deserialize;
use x509_cert::ext::pkix;

use crate::error::{CaError, Result};

/// A single `short_name -> dotted OID` mapping, as found in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidMapping {
    pub short_name: String,
    pub oid: String,
}

impl OidMapping {
    pub fn new(short_name: impl Into<String>, oid: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            oid: oid.into(),
        }
    }
}

/// Bidirectional table of OID short names.
#[derive(Debug, Clone, Default)]
pub struct OidRegistry {
    by_name: HashMap<String, ObjectIdentifier>,
    by_oid: HashMap<ObjectIdentifier, String>,
}

fn short_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").expect("static regex"))
}

const DEFAULT_MAPPINGS: &[(&str, ObjectIdentifier)] = &[
    // Distinguished name attributes
    ("CN", const_oid::db::rfc4519::CN),
    ("O", const_oid::db::rfc4519::O),
    ("OU", const_oid::db::rfc4519::OU),
    ("C", const_oid::db::rfc4519::C),
    ("ST", const_oid::db::rfc4519::ST),
    ("L", const_oid::db::rfc4519::L),
    ("serialNumber", const_oid::db::rfc4519::SERIAL_NUMBER),
    ("emailAddress", ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1")),
    // Certificate extensions
    ("basicConstraints", <pkix::BasicConstraints as AssociatedOid>::OID),
    ("keyUsage", <pkix::KeyUsage as AssociatedOid>::OID),
    ("extendedKeyUsage", <pkix::ExtendedKeyUsage as AssociatedOid>::OID),
    ("subjectKeyIdentifier", <pkix::SubjectKeyIdentifier as AssociatedOid>::OID),
    ("authorityKeyIdentifier", <pkix::AuthorityKeyIdentifier as AssociatedOid>::OID),
    ("subjectAltName", <pkix::SubjectAltName as AssociatedOid>::OID),
    ("crlDistributionPoints", <pkix::CrlDistributionPoints as AssociatedOid>::OID),
    ("authorityInfoAccess", <pkix::AuthorityInfoAccessSyntax as AssociatedOid>::OID),
    ("certificatePolicies", <pkix::CertificatePolicies as AssociatedOid>::OID),
    // EV and business attributes
    ("businessCategory", ObjectIdentifier::new_unwrap("2.5.4.15")),
    (
        "jurisdictionOfIncorporationStateOrProvinceName",
        ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.60.2.1.2"),
    ),
    (
        "jurisdictionOfIncorporationCountryName",
        ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.60.2.1.3"),
    ),
];

impl OidRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with the standard attribute and extension
    /// names plus the well-known EV jurisdiction OIDs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, oid) in DEFAULT_MAPPINGS {
            registry.by_name.insert((*name).to_string(), *oid);
            registry.by_oid.entry(*oid).or_insert_with(|| (*name).to_string());
        }
        registry
    }

    /// Registers `short_name` as an alias for `dotted_oid`.
    ///
    /// Registering an identical pair again is a no-op. Mapping an existing
    /// name to a different OID fails with [`CaError::DuplicateName`].
    pub fn register(&mut self, short_name: &str, dotted_oid: &str) -> Result<()> {
        if !short_name_pattern().is_match(short_name) {
            return Err(CaError::Configuration(format!(
                "invalid OID short name {short_name:?}"
            )));
        }
        let oid = ObjectIdentifier::new(dotted_oid).map_err(|e| {
            CaError::Configuration(format!("invalid OID {dotted_oid:?} for {short_name}: {e}"))
        })?;

        match self.by_name.get(short_name) {
            Some(existing) if *existing == oid => Ok(()),
            Some(existing) => Err(CaError::DuplicateName {
                name: short_name.to_string(),
                existing: existing.to_string(),
                requested: oid.to_string(),
            }),
            None => {
                tracing::debug!(short_name, oid = %oid, "registered OID short name");
                self.by_name.insert(short_name.to_string(), oid);
                self.by_oid
                    .entry(oid)
                    .or_insert_with(|| short_name.to_string());
                Ok(())
            }
        }
    }

    /// Registers every mapping in order, stopping at the first failure.
    pub fn batch_register<'a, I>(&mut self, mappings: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a OidMapping>,
    {
        for mapping in mappings {
            self.register(&mapping.short_name, &mapping.oid)?;
        }
        Ok(())
    }

    /// Resolves a short name to its OID.
    pub fn resolve(&self, short_name: &str) -> Result<ObjectIdentifier> {
        self.by_name
            .get(short_name)
            .copied()
            .ok_or_else(|| CaError::UnknownOid(short_name.to_string()))
    }

    /// Resolves either a registered short name or a literal dotted OID.
    pub fn resolve_name_or_oid(&self, name: &str) -> Result<ObjectIdentifier> {
        match self.resolve(name) {
            Ok(oid) => Ok(oid),
            Err(err) => ObjectIdentifier::new(name).map_err(|_| err),
        }
    }

    /// Returns the first short name registered for `oid`.
    pub fn short_name(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.by_oid.get(oid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn registering_the_same_pair_twice_is_idempotent() {
        let mut registry = OidRegistry::new();
        registry.register("testOid", "1.2.3.4.5").unwrap();
        registry.register("testOid", "1.2.3.4.5").unwrap();
        assert_eq!(
            registry.resolve("testOid").unwrap(),
            ObjectIdentifier::new_unwrap("1.2.3.4.5")
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registering_a_name_to_a_different_oid_fails() {
        let mut registry = OidRegistry::new();
        registry.register("testOid", "1.2.3.4.5").unwrap();
        let err = registry.register("testOid", "1.2.3.4.6").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
        assert_eq!(
            registry.resolve("testOid").unwrap(),
            ObjectIdentifier::new_unwrap("1.2.3.4.5")
        );
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let registry = OidRegistry::with_defaults();
        let err = registry.resolve("noSuchThing").unwrap_err();
        assert_eq!(err, CaError::UnknownOid("noSuchThing".to_string()));
    }

    #[test]
    fn defaults_include_jurisdiction_oids() {
        let registry = OidRegistry::with_defaults();
        assert_eq!(
            registry
                .resolve("jurisdictionOfIncorporationCountryName")
                .unwrap()
                .to_string(),
            "1.3.6.1.4.1.311.60.2.1.3"
        );
        assert_eq!(
            registry.short_name(&<pkix::BasicConstraints as AssociatedOid>::OID),
            Some("basicConstraints")
        );
    }

    #[test]
    fn batch_register_accepts_already_seeded_pairs() {
        let mut registry = OidRegistry::with_defaults();
        let mappings = vec![
            OidMapping::new("businessCategory", "2.5.4.15"),
            OidMapping::new("customPolicy", "1.3.6.1.4.1.99999.1"),
        ];
        registry.batch_register(&mappings).unwrap();
        assert!(registry.resolve("customPolicy").is_ok());
    }

    #[test]
    fn rejects_malformed_input() {
        let mut registry = OidRegistry::new();
        assert_eq!(
            registry.register("bad name", "1.2.3").unwrap_err().kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            registry.register("good", "not-an-oid").unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn resolves_literal_dotted_oids() {
        let registry = OidRegistry::with_defaults();
        assert_eq!(
            registry.resolve_name_or_oid("1.2.3.4").unwrap().to_string(),
            "1.2.3.4"
        );
        assert!(registry.resolve_name_or_oid("nope").is_err());
    }
}
