//! Reconciles a profile's extension specs with requester-supplied extensions.
//!
//! The profile is authoritative: every emitted extension is either a value
//! fixed by the profile, a requester value the profile explicitly allows to
//! be copied, or a value derived from key material. Anything else in the
//! request is dropped.

use std::collections::HashSet;

use const_oid::ObjectIdentifier;

use super::extensions::{AuthorityKeyIdentifier, SubjectKeyIdentifier, ToAndFromX509Extension};
use super::params::ExtensionParam;
use crate::error::{CaError, Result};
use crate::key::PublicKey;

/// Extension values derived from key material at signing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedExtension {
    SubjectKeyIdentifier,
    AuthorityKeyIdentifier,
}

/// How the value of one profile extension is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionRule {
    /// DER value fixed in the profile.
    Static(Vec<u8>),
    /// Requester value if present, else `fallback`, else nothing.
    CopyIfPresent { fallback: Option<Vec<u8>> },
    Computed(ComputedExtension),
}

/// One entry of a profile's ordered extension list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSpec {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    pub rule: ExtensionRule,
}

impl ExtensionSpec {
    pub fn fixed(param: ExtensionParam) -> Self {
        Self {
            oid: param.oid,
            critical: param.critical,
            rule: ExtensionRule::Static(param.value),
        }
    }

    pub fn copy_if_present(oid: ObjectIdentifier, critical: bool, fallback: Option<Vec<u8>>) -> Self {
        Self {
            oid,
            critical,
            rule: ExtensionRule::CopyIfPresent { fallback },
        }
    }

    pub fn computed(kind: ComputedExtension) -> Self {
        let oid = match kind {
            ComputedExtension::SubjectKeyIdentifier => SubjectKeyIdentifier::OID,
            ComputedExtension::AuthorityKeyIdentifier => AuthorityKeyIdentifier::OID,
        };
        Self {
            oid,
            critical: false,
            rule: ExtensionRule::Computed(kind),
        }
    }
}

/// Key material available to computed extensions.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub subject_public_key: &'a PublicKey,
    /// `None` omits authorityKeyIdentifier.
    pub issuer_public_key: Option<&'a PublicKey>,
}

/// Fails with [`CaError::ExtensionConflict`] if two specs share an OID.
pub fn validate_specs(specs: &[ExtensionSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.oid) {
            return Err(CaError::ExtensionConflict(spec.oid.to_string()));
        }
    }
    Ok(())
}

/// Produces the final, ordered extension list for one certificate.
///
/// Output order follows `specs`. Requested extensions whose OID has no spec
/// are dropped; for `Static` and `Computed` specs the requested value is
/// ignored.
pub fn build(
    specs: &[ExtensionSpec],
    requested: &[ExtensionParam],
    context: &BuildContext<'_>,
) -> Result<Vec<ExtensionParam>> {
    for ext in requested {
        if !specs.iter().any(|spec| spec.oid == ext.oid) {
            tracing::debug!(oid = %ext.oid, "dropping requested extension not allowed by profile");
        }
    }

    let mut emitted = HashSet::new();
    let mut extensions = Vec::with_capacity(specs.len());

    for spec in specs {
        let value = match &spec.rule {
            ExtensionRule::Static(value) => Some(value.clone()),
            ExtensionRule::CopyIfPresent { fallback } => requested
                .iter()
                .find(|ext| ext.oid == spec.oid)
                .map(|ext| ext.value.clone())
                .or_else(|| fallback.clone()),
            ExtensionRule::Computed(ComputedExtension::SubjectKeyIdentifier) => {
                let key_identifier = context.subject_public_key.key_identifier()?;
                Some(
                    ExtensionParam::from_extension(SubjectKeyIdentifier(key_identifier), false)?
                        .value,
                )
            }
            ExtensionRule::Computed(ComputedExtension::AuthorityKeyIdentifier) => {
                match context.issuer_public_key {
                    Some(issuer_key) => Some(
                        ExtensionParam::from_extension(
                            AuthorityKeyIdentifier {
                                key_identifier: issuer_key.key_identifier()?,
                            },
                            false,
                        )?
                        .value,
                    ),
                    None => None,
                }
            }
        };

        if let Some(value) = value {
            if !emitted.insert(spec.oid) {
                return Err(CaError::ExtensionConflict(spec.oid.to_string()));
            }
            extensions.push(ExtensionParam {
                oid: spec.oid,
                critical: spec.critical,
                value,
            });
        }
    }

    Ok(extensions)
}
