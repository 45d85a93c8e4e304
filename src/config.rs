//! YAML configuration for a CA: custom OIDs, key generation, signing
//! profiles, CRL policy and OCSP policy.
//!
//! Every struct rejects unknown keys, and [`CaConfig::signing_profiles`]
//! validates everything up front so a bad profile fails at start-up rather
//! than on the first signing request.
//!
//! ```yaml
//! custom_oids:
//!   - short_name: internalPolicy
//!     oid: 1.3.6.1.4.1.55555.1
//! profiles:
//!   server:
//!     digest: sha256
//!     validity:
//!       relative: { days: 365 }
//!     subject_policy: use_requested
//!     basic_constraints: { ca: false }
//!     key_usage: [digitalSignature, keyEncipherment]
//!     extended_key_usage: [serverAuth]
//!     extensions:
//!       - oid: subjectAltName
//!         copy_if_present: {}
//! crl:
//!   validity:
//!     relative: { days: 7 }
//! ocsp:
//!   validity:
//!     relative: { hours: 12 }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use der::Decode;
use der::flagset::FlagSet;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};

use crate::cert::builder::{ComputedExtension, ExtensionSpec};
use crate::cert::extensions::{BasicConstraints, ExtendedKeyUsageOption, KeyUsage, KeyUsages};
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::crl::CrlPolicy;
use crate::digest::DigestAlgorithm;
use crate::error::{CaError, Result};
use crate::key::{KeyPair, KeySpec};
use crate::ocsp::OcspPolicy;
use crate::oid::{OidMapping, OidRegistry};
use crate::profile::{ItemRequirement, SigningProfile, SubjectItemPolicy, SubjectPolicy};
use crate::validity::ValidityPolicy;

/// Top-level CA configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaConfig {
    #[serde(default)]
    pub custom_oids: Vec<OidMapping>,
    /// Parameters for generating the CA key; RSA-2048 when absent.
    #[serde(default)]
    pub key: Option<KeySpec>,
    pub profiles: BTreeMap<String, ProfileConfig>,
    #[serde(default)]
    pub crl: Option<CrlConfig>,
    #[serde(default)]
    pub ocsp: Option<OcspConfig>,
}

/// A validity window as written in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum ValidityConfig {
    Relative {
        #[serde(default)]
        days: i64,
        #[serde(default)]
        hours: i64,
        #[serde(default)]
        seconds: i64,
    },
    Absolute {
        #[serde(with = "time::serde::rfc3339")]
        not_before: OffsetDateTime,
        #[serde(with = "time::serde::rfc3339")]
        not_after: OffsetDateTime,
    },
    /// Relative, capped at `anchor`. Without an explicit anchor the issuing
    /// CA certificate's notAfter is used.
    RelativeToExpiry {
        #[serde(default)]
        days: i64,
        #[serde(default)]
        hours: i64,
        #[serde(default)]
        seconds: i64,
        #[serde(default, with = "time::serde::rfc3339::option")]
        anchor: Option<OffsetDateTime>,
    },
}

fn duration_of(days: i64, hours: i64, seconds: i64) -> Result<Duration> {
    Duration::days(days)
        .checked_add(Duration::hours(hours))
        .and_then(|d| d.checked_add(Duration::seconds(seconds)))
        .ok_or_else(|| CaError::Configuration("validity duration overflows".to_string()))
}

impl ValidityConfig {
    /// Resolves the configured window; `issuer_not_after` fills a missing
    /// `relative_to_expiry` anchor.
    pub fn to_policy(&self, issuer_not_after: Option<OffsetDateTime>) -> Result<ValidityPolicy> {
        let policy = match *self {
            ValidityConfig::Relative {
                days,
                hours,
                seconds,
            } => ValidityPolicy::Relative {
                duration: duration_of(days, hours, seconds)?,
            },
            ValidityConfig::Absolute {
                not_before,
                not_after,
            } => ValidityPolicy::Absolute {
                not_before,
                not_after,
            },
            ValidityConfig::RelativeToExpiry {
                days,
                hours,
                seconds,
                anchor,
            } => ValidityPolicy::RelativeToExpiry {
                duration: duration_of(days, hours, seconds)?,
                anchor: anchor.or(issuer_not_after).ok_or_else(|| {
                    CaError::Configuration(
                        "relative_to_expiry needs an anchor or an issuing certificate".to_string(),
                    )
                })?,
            },
        };
        policy.validate()?;
        Ok(policy)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicConstraintsConfig {
    pub ca: bool,
    #[serde(default)]
    pub path_length: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectItemConfig {
    pub name: String,
    pub requirement: ItemRequirement,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyIfPresentConfig {
    /// Base64 DER value used when the requester supplies none.
    #[serde(default)]
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedConfig {
    SubjectKeyIdentifier,
    AuthorityKeyIdentifier,
}

/// One explicit extension spec. Exactly one of `static`,
/// `copy_if_present` and `computed` must be given.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionConfig {
    /// Registered short name or dotted OID.
    pub oid: String,
    #[serde(default)]
    pub critical: bool,
    /// Base64 DER extension value.
    #[serde(default, rename = "static")]
    pub static_value: Option<String>,
    #[serde(default)]
    pub copy_if_present: Option<CopyIfPresentConfig>,
    #[serde(default)]
    pub computed: Option<ComputedConfig>,
}

/// Base64 text holding exactly one DER value.
fn decode_der_value(what: &str, value: &str) -> Result<Vec<u8>> {
    let bytes = B64
        .decode(value.trim())
        .map_err(|e| CaError::Configuration(format!("{what}: invalid base64: {e}")))?;
    der::Any::from_der(&bytes)
        .map_err(|e| CaError::Configuration(format!("{what}: value is not DER: {e}")))?;
    Ok(bytes)
}

impl ExtensionConfig {
    pub fn to_spec(&self, registry: &OidRegistry) -> Result<ExtensionSpec> {
        let oid = registry.resolve_name_or_oid(&self.oid)?;
        match (&self.static_value, &self.copy_if_present, self.computed) {
            (Some(value), None, None) => Ok(ExtensionSpec::fixed(ExtensionParam {
                oid,
                critical: self.critical,
                value: decode_der_value(&self.oid, value)?,
            })),
            (None, Some(copy), None) => Ok(ExtensionSpec::copy_if_present(
                oid,
                self.critical,
                copy.fallback
                    .as_deref()
                    .map(|v| decode_der_value(&self.oid, v))
                    .transpose()?,
            )),
            (None, None, Some(computed)) => {
                let kind = match computed {
                    ComputedConfig::SubjectKeyIdentifier => ComputedExtension::SubjectKeyIdentifier,
                    ComputedConfig::AuthorityKeyIdentifier => {
                        ComputedExtension::AuthorityKeyIdentifier
                    }
                };
                let spec = ExtensionSpec::computed(kind);
                if spec.oid != oid {
                    return Err(CaError::Configuration(format!(
                        "extension {}: computed {computed:?} cannot be emitted under {oid}",
                        self.oid
                    )));
                }
                Ok(spec)
            }
            _ => Err(CaError::Configuration(format!(
                "extension {}: exactly one of static, copy_if_present or computed is required",
                self.oid
            ))),
        }
    }
}

/// A signing profile as written in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    #[serde(default)]
    pub digest: DigestAlgorithm,
    pub validity: ValidityConfig,
    #[serde(default)]
    pub subject_policy: SubjectPolicy,
    /// `[name, value]` pairs in encoding order.
    #[serde(default)]
    pub subject: Option<Vec<(String, String)>>,
    #[serde(default)]
    pub subject_items: Option<Vec<SubjectItemConfig>>,
    #[serde(default)]
    pub basic_constraints: Option<BasicConstraintsConfig>,
    #[serde(default)]
    pub key_usage: Vec<String>,
    #[serde(default)]
    pub extended_key_usage: Vec<String>,
    #[serde(default)]
    pub crl_distribution_points: Vec<String>,
    #[serde(default)]
    pub ocsp_uris: Vec<String>,
    #[serde(default)]
    pub ca_issuers_uris: Vec<String>,
    #[serde(default)]
    pub certificate_policies: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<ExtensionConfig>,
    #[serde(default = "default_true")]
    pub key_identifiers: bool,
}

fn default_true() -> bool {
    true
}

impl ProfileConfig {
    /// Resolves names through `registry` and validates the profile.
    pub fn to_profile(
        &self,
        name: &str,
        registry: &OidRegistry,
        issuer_not_after: Option<OffsetDateTime>,
    ) -> Result<SigningProfile> {
        let context = |err: CaError| match err {
            CaError::Configuration(msg) => {
                CaError::Configuration(format!("profile {name}: {msg}"))
            }
            other => other,
        };

        let subject = self
            .subject
            .as_ref()
            .map(|pairs| DistinguishedName::from_pairs(registry, pairs))
            .transpose()?;

        let subject_item_policy = match &self.subject_items {
            Some(items) => {
                let mut policy = SubjectItemPolicy::new();
                for item in items {
                    let oid = registry.resolve_name_or_oid(&item.name)?;
                    policy = match item.requirement {
                        ItemRequirement::Required => policy.required(oid),
                        ItemRequirement::Optional => policy.optional(oid),
                    };
                }
                Some(policy)
            }
            None => None,
        };

        let key_usage = if self.key_usage.is_empty() {
            None
        } else {
            let mut flags: FlagSet<KeyUsages> = FlagSet::empty();
            for usage in &self.key_usage {
                flags |= KeyUsage::flag_from_name(usage).ok_or_else(|| {
                    context(CaError::Configuration(format!("unknown key usage {usage}")))
                })?;
            }
            Some(KeyUsage(flags))
        };

        let extended_key_usage = self
            .extended_key_usage
            .iter()
            .map(|usage| match ExtendedKeyUsageOption::from_name(usage) {
                Some(option) => Ok(option),
                None => registry
                    .resolve_name_or_oid(usage)
                    .map(ExtendedKeyUsageOption::Other),
            })
            .collect::<Result<Vec<_>>>()?;

        let certificate_policies = self
            .certificate_policies
            .iter()
            .map(|policy| registry.resolve_name_or_oid(policy))
            .collect::<Result<Vec<_>>>()?;

        let extensions = self
            .extensions
            .iter()
            .map(|ext| ext.to_spec(registry))
            .collect::<Result<Vec<_>>>()
            .map_err(context)?;

        SigningProfile::builder()
            .name(name)
            .digest(self.digest)
            .validity(self.validity.to_policy(issuer_not_after).map_err(context)?)
            .subject_policy(self.subject_policy)
            .maybe_subject(subject)
            .maybe_subject_item_policy(subject_item_policy)
            .maybe_basic_constraints(self.basic_constraints.map(|bc| BasicConstraints {
                is_ca: bc.ca,
                max_path_length: bc.path_length,
            }))
            .maybe_key_usage(key_usage)
            .extended_key_usage(extended_key_usage)
            .crl_distribution_points(self.crl_distribution_points.clone())
            .ocsp_uris(self.ocsp_uris.clone())
            .ca_issuers_uris(self.ca_issuers_uris.clone())
            .certificate_policies(certificate_policies)
            .extensions(extensions)
            .key_identifiers(self.key_identifiers)
            .build()
    }
}

/// CRL issuance policy as written in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrlConfig {
    #[serde(default)]
    pub digest: DigestAlgorithm,
    pub validity: ValidityConfig,
}

impl CrlConfig {
    pub fn to_policy(&self, issuer_not_after: Option<OffsetDateTime>) -> Result<CrlPolicy> {
        CrlPolicy::new(self.validity.to_policy(issuer_not_after)?, self.digest)
    }
}

/// OCSP response policy as written in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OcspConfig {
    #[serde(default)]
    pub digest: DigestAlgorithm,
    pub validity: ValidityConfig,
}

impl OcspConfig {
    pub fn to_policy(&self, issuer_not_after: Option<OffsetDateTime>) -> Result<OcspPolicy> {
        OcspPolicy::new(self.validity.to_policy(issuer_not_after)?, self.digest)
    }
}

impl CaConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        if let Some(spec) = &config.key {
            spec.validate()?;
        }
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            CaError::Configuration(format!("reading {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// The default registry plus `custom_oids`.
    pub fn oid_registry(&self) -> Result<OidRegistry> {
        let mut registry = OidRegistry::with_defaults();
        registry.batch_register(&self.custom_oids)?;
        Ok(registry)
    }

    /// Generates a fresh CA key as described by `key`.
    pub fn generate_ca_key(&self) -> Result<KeyPair> {
        let spec = self.key.clone().unwrap_or_default();
        tracing::info!(key_type = ?spec.key_type, bits = ?spec.bit_strength, "generating CA key");
        KeyPair::generate(&spec)
    }

    /// Builds and validates the profile called `name`.
    pub fn signing_profile(
        &self,
        name: &str,
        registry: &OidRegistry,
        issuer_not_after: Option<OffsetDateTime>,
    ) -> Result<SigningProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| CaError::UnknownProfile(name.to_string()))?
            .to_profile(name, registry, issuer_not_after)
    }

    /// Builds and validates every profile.
    pub fn signing_profiles(
        &self,
        registry: &OidRegistry,
        issuer_not_after: Option<OffsetDateTime>,
    ) -> Result<HashMap<String, SigningProfile>> {
        self.profiles
            .iter()
            .map(|(name, profile)| {
                Ok((
                    name.clone(),
                    profile.to_profile(name, registry, issuer_not_after)?,
                ))
            })
            .collect()
    }

    /// The configured CRL policy, if any.
    pub fn crl_policy(&self, issuer_not_after: Option<OffsetDateTime>) -> Result<Option<CrlPolicy>> {
        self.crl
            .as_ref()
            .map(|crl| crl.to_policy(issuer_not_after))
            .transpose()
    }

    /// The configured OCSP policy, if any.
    pub fn ocsp_policy(
        &self,
        issuer_not_after: Option<OffsetDateTime>,
    ) -> Result<Option<OcspPolicy>> {
        self.ocsp
            .as_ref()
            .map(|ocsp| ocsp.to_policy(issuer_not_after))
            .transpose()
    }
}
