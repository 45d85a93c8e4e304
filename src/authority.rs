//! The signing engine.
//!
//! [`CertificateAuthority`] owns a CA identity, its named profiles, the
//! serial allocator and the revocation state. Signing is all-or-nothing:
//! either a complete signed certificate comes back or an error does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use time::OffsetDateTime;

use crate::cert::SignedCertificate;
use crate::cert::builder::{self, BuildContext};
use crate::cert::params::{DistinguishedName, ExtensionParam};
use crate::config::CaConfig;
use crate::crl::{self, CrlPolicy, CrlState, RevocationReason, RevocationStatus, SignedCrl};
use crate::error::{CaError, Result};
use crate::issuer::{CaIdentity, Issuer};
use crate::key::{KeyPair, PublicKey};
use crate::ocsp::{self, OcspPolicy, OcspRequest, OcspResponse};
use crate::oid::OidRegistry;
use crate::profile::SigningProfile;
use crate::request::CertificateRequest;
use crate::serial::SerialAllocator;
use crate::tbs_certificate::CertificateContents;
use crate::validity;

/// Shared assembly path for issued and self-signed certificates.
///
/// Validity, extensions and the signature algorithm are settled before the
/// serial is drawn, so a policy failure never consumes a serial. Returns the
/// certificate with the serial it was given.
pub(crate) fn assemble(
    issuer: &dyn Issuer,
    profile: &SigningProfile,
    subject: DistinguishedName,
    subject_public_key: PublicKey,
    requested_extensions: &[ExtensionParam],
    serial: impl FnOnce() -> Result<u64>,
    reference_time: OffsetDateTime,
) -> Result<(SignedCertificate, u64)> {
    let window = validity::compute_window(profile.validity(), reference_time)?;

    let issuer_public_key = issuer.issuer_public_key();
    let context = BuildContext {
        subject_public_key: &subject_public_key,
        issuer_public_key: Some(&issuer_public_key),
    };
    let extensions = builder::build(profile.extensions(), requested_extensions, &context)?;
    issuer.signing_key().signature_algorithm(profile.digest())?;

    let serial_number = serial()?;
    let contents = CertificateContents {
        serial_number,
        subject,
        subject_public_key,
        validity: window,
        extensions,
    };
    let certificate = issuer.issue(contents, profile.digest())?;
    Ok((certificate, serial_number))
}

/// A certificate authority bound to one identity and a set of profiles.
#[derive(Debug)]
pub struct CertificateAuthority {
    identity: CaIdentity,
    profiles: Arc<HashMap<String, SigningProfile>>,
    registry: Arc<OidRegistry>,
    allocator: SerialAllocator,
    crl_policy: Option<CrlPolicy>,
    ocsp_policy: Option<OcspPolicy>,
    crl_state: Mutex<CrlState>,
}

impl CertificateAuthority {
    pub fn new(
        identity: CaIdentity,
        profiles: HashMap<String, SigningProfile>,
        registry: OidRegistry,
        allocator: SerialAllocator,
    ) -> Self {
        Self {
            identity,
            profiles: Arc::new(profiles),
            registry: Arc::new(registry),
            allocator,
            crl_policy: None,
            ocsp_policy: None,
            crl_state: Mutex::new(CrlState::new()),
        }
    }

    /// Builds the registry, profiles and CRL policy from `config`.
    ///
    /// Relative-to-expiry windows without an explicit anchor are anchored on
    /// the expiry of `identity`'s certificate.
    pub fn from_config(
        config: &CaConfig,
        identity: CaIdentity,
        allocator: SerialAllocator,
    ) -> Result<Self> {
        let registry = config.oid_registry()?;
        let not_after = Some(identity.not_after());
        let profiles = config.signing_profiles(&registry, not_after)?;
        let crl_policy = config.crl_policy(not_after)?;
        let ocsp_policy = config.ocsp_policy(not_after)?;

        tracing::info!(
            issuer = %identity.issuer_name(),
            profiles = profiles.len(),
            crl = crl_policy.is_some(),
            ocsp = ocsp_policy.is_some(),
            "loaded CA configuration"
        );

        let mut ca = Self::new(identity, profiles, registry, allocator);
        ca.crl_policy = crl_policy;
        ca.ocsp_policy = ocsp_policy;
        Ok(ca)
    }

    /// Starts a new CA from `config` alone: generates the key described by
    /// its `key` section, self-signs a root under the profile `root_profile`
    /// and loads the rest of the configuration. The key is handed back so it
    /// can be stored.
    pub fn bootstrap(
        config: &CaConfig,
        subject: DistinguishedName,
        root_profile: &str,
        allocator: SerialAllocator,
        reference_time: OffsetDateTime,
    ) -> Result<(Self, KeyPair)> {
        let registry = config.oid_registry()?;
        let profile = config.signing_profile(root_profile, &registry, None)?;
        let key = config.generate_ca_key()?;
        let identity = CaIdentity::self_signed(
            Arc::new(key.clone()),
            subject,
            &profile,
            &allocator,
            reference_time,
        )?;
        Ok((Self::from_config(config, identity, allocator)?, key))
    }

    pub fn with_crl_policy(mut self, policy: CrlPolicy) -> Self {
        self.crl_policy = Some(policy);
        self
    }

    pub fn with_ocsp_policy(mut self, policy: OcspPolicy) -> Self {
        self.ocsp_policy = Some(policy);
        self
    }

    /// Restores previously persisted revocation state.
    pub fn with_crl_state(self, state: CrlState) -> Self {
        Self {
            crl_state: Mutex::new(state),
            ..self
        }
    }

    pub fn identity(&self) -> &CaIdentity {
        &self.identity
    }

    pub fn certificate(&self) -> &SignedCertificate {
        self.identity.certificate()
    }

    pub fn registry(&self) -> &OidRegistry {
        &self.registry
    }

    pub fn profile(&self, name: &str) -> Result<&SigningProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| CaError::UnknownProfile(name.to_string()))
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Signs `request` under the profile called `profile_name`.
    pub fn sign(
        &self,
        request: &CertificateRequest,
        profile_name: &str,
        reference_time: OffsetDateTime,
    ) -> Result<SignedCertificate> {
        let profile = self.profile(profile_name)?;
        let subject = profile.resolve_subject(request.requested_subject.as_ref())?;
        let subject_name = subject.to_string();

        let (certificate, serial) = assemble(
            &self.identity,
            profile,
            subject,
            request.public_key.clone(),
            &request.requested_extensions,
            || self.next_serial(),
            reference_time,
        )?;

        tracing::info!(
            profile = profile_name,
            serial,
            subject = %subject_name,
            "issued certificate"
        );
        Ok(certificate)
    }

    /// Next serial from the allocator, stepping over the CA certificate's
    /// own serial when the two share an issuer.
    fn next_serial(&self) -> Result<u64> {
        let serial = self.allocator.next_serial()?;
        if Some(serial) == self.identity.self_issued_serial() {
            tracing::debug!(serial, "skipping the CA certificate's serial");
            return self.allocator.next_serial();
        }
        Ok(serial)
    }

    /// Records a revocation for the next CRL.
    pub fn revoke(
        &self,
        serial: u64,
        reason: RevocationReason,
        revoked_at: OffsetDateTime,
    ) -> Result<()> {
        self.lock_state()?.revoke(serial, reason, revoked_at)?;
        tracing::info!(serial, ?reason, "recorded revocation");
        Ok(())
    }

    pub fn status(&self, serial: u64) -> Result<RevocationStatus> {
        Ok(self.lock_state()?.status(serial))
    }

    /// A copy of the current revocation state, for persistence.
    pub fn crl_state(&self) -> Result<CrlState> {
        Ok(self.lock_state()?.clone())
    }

    /// Issues the next CRL. The stored state only advances on success.
    pub fn issue_crl(&self, reference_time: OffsetDateTime) -> Result<SignedCrl> {
        let policy = self.crl_policy.as_ref().ok_or_else(|| {
            CaError::Configuration("no CRL policy is configured".to_string())
        })?;

        let mut state = self.lock_state()?;
        let (signed, next_state) =
            crl::issue_crl(&state, policy, &self.identity, &self.allocator, reference_time)?;
        *state = next_state;
        Ok(signed)
    }

    /// Answers an OCSP request from the current revocation state.
    pub fn respond_ocsp(
        &self,
        request: &OcspRequest,
        reference_time: OffsetDateTime,
    ) -> Result<OcspResponse> {
        let policy = self.ocsp_policy.as_ref().ok_or_else(|| {
            CaError::Configuration("no OCSP policy is configured".to_string())
        })?;
        let state = self.lock_state()?;
        ocsp::respond(request, &state, policy, &self.identity, reference_time)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, CrlState>> {
        self.crl_state
            .lock()
            .map_err(|_| CaError::Configuration("CRL state lock is poisoned".to_string()))
    }
}
