//! Signing profiles: the CA-controlled policy applied to every request.

use bon::bon;
use const_oid::ObjectIdentifier;
use serde::Deserialize;

use crate::cert::builder::{self, ComputedExtension, ExtensionSpec};
use crate::cert::extensions::{
    AuthorityInfoAccess, BasicConstraints, CertificatePolicies, CrlDistributionPoints,
    ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
};
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::digest::DigestAlgorithm;
use crate::error::{CaError, Result};
use crate::validity::ValidityPolicy;

/// What happens to a subject DN supplied by the requester.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectPolicy {
    /// A requested subject fails the request; the profile subject is used.
    #[default]
    Reject,
    /// The profile subject is used and any requested subject is ignored.
    Replace,
    /// The requested subject is used, falling back to the profile subject.
    UseRequested,
    /// Profile attributes override or extend the requested subject.
    Merge,
}

/// Whether a subject attribute must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRequirement {
    Required,
    Optional,
}

/// Allow-list of subject attributes accepted from requesters, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectItemPolicy {
    items: Vec<(ObjectIdentifier, ItemRequirement)>,
}

impl SubjectItemPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, oid: ObjectIdentifier) -> Self {
        self.items.push((oid, ItemRequirement::Required));
        self
    }

    pub fn optional(mut self, oid: ObjectIdentifier) -> Self {
        self.items.push((oid, ItemRequirement::Optional));
        self
    }

    /// Filters and reorders `subject`.
    ///
    /// Attributes not named by the policy are dropped. Repeated attributes
    /// (several OUs, say) keep their relative order.
    pub fn apply(&self, subject: &DistinguishedName) -> Result<DistinguishedName> {
        let mut out = DistinguishedName::default();
        for (oid, requirement) in &self.items {
            let mut found = false;
            for attr in subject.attributes().iter().filter(|attr| attr.oid == *oid) {
                out.push(attr.oid, attr.value.clone());
                found = true;
            }
            if !found && *requirement == ItemRequirement::Required {
                return Err(CaError::PolicyViolation(format!(
                    "required subject attribute {oid} is missing"
                )));
            }
        }
        for attr in subject.attributes() {
            if !self.items.iter().any(|(oid, _)| *oid == attr.oid) {
                tracing::debug!(oid = %attr.oid, "dropping subject attribute not allowed by profile");
            }
        }
        Ok(out)
    }
}

/// A named, validated signing profile.
#[derive(Debug, Clone)]
pub struct SigningProfile {
    name: String,
    digest: DigestAlgorithm,
    validity: ValidityPolicy,
    extensions: Vec<ExtensionSpec>,
    subject_policy: SubjectPolicy,
    subject: Option<DistinguishedName>,
    subject_item_policy: Option<SubjectItemPolicy>,
    is_ca: bool,
}

#[bon]
impl SigningProfile {
    /// Validates the profile and expands its shorthand fields into
    /// extension specs.
    ///
    /// Expanded specs come first, in the order basicConstraints, keyUsage,
    /// extendedKeyUsage, crlDistributionPoints, authorityInfoAccess,
    /// certificatePolicies, followed by `extensions`, then the computed
    /// subjectKeyIdentifier and authorityKeyIdentifier when
    /// `key_identifiers` is set.
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        #[builder(default)] digest: DigestAlgorithm,
        validity: ValidityPolicy,
        #[builder(default)] subject_policy: SubjectPolicy,
        subject: Option<DistinguishedName>,
        subject_item_policy: Option<SubjectItemPolicy>,
        basic_constraints: Option<BasicConstraints>,
        key_usage: Option<KeyUsage>,
        #[builder(default)] extended_key_usage: Vec<ExtendedKeyUsageOption>,
        #[builder(default)] crl_distribution_points: Vec<String>,
        #[builder(default)] ocsp_uris: Vec<String>,
        #[builder(default)] ca_issuers_uris: Vec<String>,
        #[builder(default)] certificate_policies: Vec<ObjectIdentifier>,
        #[builder(default)] extensions: Vec<ExtensionSpec>,
        #[builder(default = true)] key_identifiers: bool,
    ) -> Result<Self> {
        let invalid = |msg: String| CaError::Configuration(format!("profile {name}: {msg}"));

        if digest == DigestAlgorithm::Sha1 {
            return Err(invalid("sha1 is not accepted for signatures".to_string()));
        }
        validity.validate()?;

        if matches!(subject_policy, SubjectPolicy::Reject | SubjectPolicy::Replace)
            && subject.as_ref().is_none_or(DistinguishedName::is_empty)
        {
            return Err(invalid(format!(
                "subject policy {subject_policy:?} needs a fixed subject"
            )));
        }

        let mut specs = Vec::new();
        if let Some(bc) = basic_constraints {
            specs.push(ExtensionSpec::fixed(ExtensionParam::from_extension(bc, true)?));
        }
        if let Some(ku) = key_usage {
            specs.push(ExtensionSpec::fixed(ExtensionParam::from_extension(ku, true)?));
        }
        if !extended_key_usage.is_empty() {
            specs.push(ExtensionSpec::fixed(ExtensionParam::from_extension(
                ExtendedKeyUsage {
                    usage: extended_key_usage,
                },
                false,
            )?));
        }
        if !crl_distribution_points.is_empty() {
            specs.push(ExtensionSpec::fixed(ExtensionParam::from_extension(
                CrlDistributionPoints {
                    uris: crl_distribution_points,
                },
                false,
            )?));
        }
        if !ocsp_uris.is_empty() || !ca_issuers_uris.is_empty() {
            specs.push(ExtensionSpec::fixed(ExtensionParam::from_extension(
                AuthorityInfoAccess {
                    ocsp: ocsp_uris,
                    ca_issuers: ca_issuers_uris,
                },
                false,
            )?));
        }
        if !certificate_policies.is_empty() {
            specs.push(ExtensionSpec::fixed(ExtensionParam::from_extension(
                CertificatePolicies {
                    policies: certificate_policies,
                },
                false,
            )?));
        }
        specs.extend(extensions);
        if key_identifiers {
            specs.push(ExtensionSpec::computed(ComputedExtension::SubjectKeyIdentifier));
            specs.push(ExtensionSpec::computed(ComputedExtension::AuthorityKeyIdentifier));
        }
        builder::validate_specs(&specs)?;

        Ok(Self {
            name,
            digest,
            validity,
            extensions: specs,
            subject_policy,
            subject,
            subject_item_policy,
            is_ca: basic_constraints.is_some_and(|bc| bc.is_ca),
        })
    }
}

impl SigningProfile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digest(&self) -> DigestAlgorithm {
        self.digest
    }

    pub fn validity(&self) -> &ValidityPolicy {
        &self.validity
    }

    pub fn extensions(&self) -> &[ExtensionSpec] {
        &self.extensions
    }

    pub fn subject_policy(&self) -> SubjectPolicy {
        self.subject_policy
    }

    pub fn subject(&self) -> Option<&DistinguishedName> {
        self.subject.as_ref()
    }

    /// Whether the profile issues CA certificates.
    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// Decides the subject of a certificate issued under this profile.
    ///
    /// An empty requested subject counts as no subject.
    pub fn resolve_subject(
        &self,
        requested: Option<&DistinguishedName>,
    ) -> Result<DistinguishedName> {
        let requested = requested.filter(|dn| !dn.is_empty());
        let filtered = |dn: &DistinguishedName| match &self.subject_item_policy {
            Some(policy) => policy.apply(dn),
            None => Ok(dn.clone()),
        };

        let subject = match self.subject_policy {
            SubjectPolicy::Reject => {
                if requested.is_some() {
                    return Err(CaError::PolicyViolation(format!(
                        "profile {} does not accept a requested subject",
                        self.name
                    )));
                }
                self.subject.clone()
            }
            SubjectPolicy::Replace => self.subject.clone(),
            SubjectPolicy::UseRequested => match requested {
                Some(dn) => Some(filtered(dn)?),
                None => self.subject.clone(),
            },
            SubjectPolicy::Merge => {
                let mut merged = match requested {
                    Some(dn) => filtered(dn)?,
                    None => DistinguishedName::default(),
                };
                for attr in self.subject.iter().flat_map(|dn| dn.attributes()) {
                    merged.set(attr.oid, attr.value.clone());
                }
                Some(merged)
            }
        };

        subject.filter(|dn| !dn.is_empty()).ok_or_else(|| {
            CaError::PolicyViolation(format!(
                "profile {} has no subject for this request",
                self.name
            ))
        })
    }
}
