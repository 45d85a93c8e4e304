//! Key pairs, public keys and the signing backend used by the CA.
//!
//! [`KeyPair`] is the concrete cryptographic collaborator: it generates keys,
//! loads and stores them as (optionally encrypted) PKCS#8, and signs
//! to-be-signed structures through the [`SigningBackend`] trait. Everything
//! else in the crate only ever sees `dyn SigningBackend`.

use bon::Builder;
use der::{Decode, Encode};
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use ed25519_dalek::VerifyingKey as Ed25519VerifyingKey;
use ed25519_dalek::{Signer as _, Verifier as _};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use p521::ecdsa::{SigningKey as P521SigningKey, VerifyingKey as P521VerifyingKey};
use pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding, ObjectIdentifier};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::signature::{SignatureEncoding, Signer as _, Verifier as _};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Deserialize;
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::cert::SignatureAlgorithm;
use crate::digest::DigestAlgorithm;
use crate::error::{CaError, Result};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");
const ID_ED25519: ObjectIdentifier = const_oid::db::rfc8410::ID_ED_25519;

const P521_FIELD_BYTES: usize = 66;

const DEFAULT_RSA_BITS: usize = 2048;
const MIN_RSA_BITS: usize = 512;
const MAX_RSA_BITS: usize = 8192;

/// The cryptographic operations the signing and CRL engines delegate.
pub trait SigningBackend {
    /// Public half of the signing key.
    fn public_key(&self) -> PublicKey;

    /// Signature algorithm produced when signing with `digest`.
    fn signature_algorithm(&self, digest: DigestAlgorithm) -> Result<SignatureAlgorithm>;

    /// Signs DER-encoded to-be-signed bytes.
    fn sign(&self, tbs: &[u8], digest: DigestAlgorithm) -> Result<Vec<u8>>;
}

/// Supported key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    #[default]
    Rsa,
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
    Ed25519,
}

/// Options for generating a new key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeySpec {
    #[builder(default)]
    #[serde(default, rename = "type")]
    pub key_type: KeyType,
    /// RSA modulus size. Only valid for RSA keys; defaults to 2048.
    #[serde(default)]
    pub bit_strength: Option<usize>,
}

impl KeySpec {
    /// Rejects option combinations that make no sense for the key type.
    pub fn validate(&self) -> Result<()> {
        match (self.key_type, self.bit_strength) {
            (KeyType::Rsa, Some(bits)) if !(MIN_RSA_BITS..=MAX_RSA_BITS).contains(&bits) => {
                Err(CaError::Configuration(format!(
                    "RSA bit strength {bits} outside {MIN_RSA_BITS}..={MAX_RSA_BITS}"
                )))
            }
            (KeyType::Rsa, _) | (_, None) => Ok(()),
            (other, Some(_)) => Err(CaError::Configuration(format!(
                "bit_strength is only valid for RSA keys, not {other:?}"
            ))),
        }
    }
}

/// Supported key types for certificate operations.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    EcdsaP521 {
        signing_key: P521SigningKey,
        verifying_key: P521VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_type", &self.key_type())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generates a key according to `spec`.
    pub fn generate(spec: &KeySpec) -> Result<Self> {
        spec.validate()?;
        match spec.key_type {
            KeyType::Rsa => Self::generate_rsa(spec.bit_strength.unwrap_or(DEFAULT_RSA_BITS)),
            KeyType::EcdsaP256 => Ok(Self::generate_ecdsa_p256()),
            KeyType::EcdsaP384 => Ok(Self::generate_ecdsa_p384()),
            KeyType::EcdsaP521 => Ok(Self::generate_ecdsa_p521()),
            KeyType::Ed25519 => Ok(Self::generate_ed25519()),
        }
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)?;
        Ok(Self::from_rsa(private))
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let signing_key = P256SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let signing_key = P384SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = *signing_key.verifying_key();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-521 key pair.
    pub fn generate_ecdsa_p521() -> Self {
        let signing_key = P521SigningKey::random(&mut rand_core::OsRng);
        let verifying_key = P521VerifyingKey::from(&signing_key);
        KeyPair::EcdsaP521 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let signing_key = Ed25519SigningKey::generate(&mut rand_core::OsRng);
        KeyPair::Ed25519 { signing_key }
    }

    fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            KeyPair::Rsa { .. } => KeyType::Rsa,
            KeyPair::EcdsaP256 { .. } => KeyType::EcdsaP256,
            KeyPair::EcdsaP384 { .. } => KeyType::EcdsaP384,
            KeyPair::EcdsaP521 { .. } => KeyType::EcdsaP521,
            KeyPair::Ed25519 { .. } => KeyType::Ed25519,
        }
    }

    /// Key size in bits (modulus size for RSA, field size for EC keys).
    pub fn bit_strength(&self) -> usize {
        match self {
            KeyPair::Rsa { public, .. } => public.size() * 8,
            KeyPair::EcdsaP256 { .. } | KeyPair::Ed25519 { .. } => 256,
            KeyPair::EcdsaP384 { .. } => 384,
            KeyPair::EcdsaP521 { .. } => 521,
        }
    }

    /// Loads an unencrypted PKCS#8 private key from DER, falling back to
    /// PKCS#1 for RSA keys.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        match pkcs8::PrivateKeyInfo::try_from(der) {
            Ok(info) => Self::from_private_key_info(der, &info),
            Err(_) => Ok(Self::from_rsa(RsaPrivateKey::from_pkcs1_der(der)?)),
        }
    }

    /// Loads a PEM private key. `password` is required for
    /// `ENCRYPTED PRIVATE KEY` documents and ignored otherwise.
    pub fn from_pem(pem_str: &str, password: Option<&str>) -> Result<Self> {
        let parsed = pem::parse(pem_str)?;
        match parsed.tag() {
            "PRIVATE KEY" => Self::from_der(parsed.contents()),
            "RSA PRIVATE KEY" => Ok(Self::from_rsa(RsaPrivateKey::from_pkcs1_der(
                parsed.contents(),
            )?)),
            "ENCRYPTED PRIVATE KEY" => {
                let password = password.ok_or_else(|| {
                    CaError::InvalidInput("encrypted private key requires a password".to_string())
                })?;
                Self::from_encrypted_der(parsed.contents(), password)
            }
            other => Err(CaError::DecodingError(format!(
                "unsupported PEM label {other:?}"
            ))),
        }
    }

    /// Loads an unencrypted PKCS#8 PEM private key.
    pub fn import_from_pkcs8_pem(pem_str: &str) -> Result<Self> {
        Self::from_pem(pem_str, None)
    }

    /// Decrypts and loads a PKCS#8 `EncryptedPrivateKeyInfo`.
    pub fn from_encrypted_der(der: &[u8], password: &str) -> Result<Self> {
        let encrypted = pkcs8::EncryptedPrivateKeyInfo::try_from(der)?;
        let document = encrypted.decrypt(password.as_bytes())?;
        Self::from_der(document.as_bytes())
    }

    fn from_private_key_info(der: &[u8], info: &pkcs8::PrivateKeyInfo<'_>) -> Result<Self> {
        match info.algorithm.oid {
            RSA_ENCRYPTION => Ok(Self::from_rsa(
                <RsaPrivateKey as DecodePrivateKey>::from_pkcs8_der(der)?,
            )),
            ID_EC_PUBLIC_KEY => match info.algorithm.parameters_oid()? {
                SECP256R1 => {
                    let secret = p256::SecretKey::from_pkcs8_der(der)?;
                    let signing_key = P256SigningKey::from(&secret);
                    let verifying_key = *signing_key.verifying_key();
                    Ok(KeyPair::EcdsaP256 {
                        signing_key,
                        verifying_key,
                    })
                }
                SECP384R1 => {
                    let secret = p384::SecretKey::from_pkcs8_der(der)?;
                    let signing_key = P384SigningKey::from(&secret);
                    let verifying_key = *signing_key.verifying_key();
                    Ok(KeyPair::EcdsaP384 {
                        signing_key,
                        verifying_key,
                    })
                }
                SECP521R1 => {
                    let secret = p521::SecretKey::from_pkcs8_der(der)?;
                    let signing_key = P521SigningKey::from_bytes(&secret.to_bytes())
                        .map_err(|e| CaError::DecodingError(e.to_string()))?;
                    let verifying_key = P521VerifyingKey::from(&signing_key);
                    Ok(KeyPair::EcdsaP521 {
                        signing_key,
                        verifying_key,
                    })
                }
                curve => Err(CaError::DecodingError(format!(
                    "unsupported elliptic curve {curve}"
                ))),
            },
            ID_ED25519 => Ok(KeyPair::Ed25519 {
                signing_key: Ed25519SigningKey::from_pkcs8_der(der)?,
            }),
            other => Err(CaError::DecodingError(format!(
                "unsupported private key algorithm {other}"
            ))),
        }
    }

    /// Encodes the private key as unencrypted PKCS#8 DER.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der()?,
            KeyPair::EcdsaP256 { signing_key, .. } => signing_key.to_pkcs8_der()?,
            KeyPair::EcdsaP384 { signing_key, .. } => signing_key.to_pkcs8_der()?,
            KeyPair::EcdsaP521 { signing_key, .. } => {
                p521::SecretKey::from_bytes(&signing_key.to_bytes())
                    .map_err(|e| CaError::EncodingError(e.to_string()))?
                    .to_pkcs8_der()?
            }
            KeyPair::Ed25519 { signing_key } => signing_key.to_pkcs8_der()?,
        };
        Ok(document.as_bytes().to_vec())
    }

    /// Encodes the private key as unencrypted PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        let der = self.to_pkcs8_der()?;
        let pem = pem::Pem::new("PRIVATE KEY", der);
        Ok(pem::encode_config(
            &pem,
            pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
        ))
    }

    /// Encodes the private key as password-encrypted PKCS#8 PEM
    /// (PBES2 with scrypt and AES-256-CBC).
    pub fn to_encrypted_pkcs8_pem(&self, password: &str) -> Result<String> {
        let der = self.to_pkcs8_der()?;
        let info = pkcs8::PrivateKeyInfo::try_from(der.as_slice())?;
        let encrypted = info.encrypt(rand_core::OsRng, password.as_bytes())?;
        let pem = encrypted
            .to_pem("ENCRYPTED PRIVATE KEY", LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        Ok(pem.as_str().to_owned())
    }

    /// Returns the public half of this key pair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    /// Returns the SubjectPublicKeyInfo of this key pair.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        self.public_key().to_spki()
    }
}

/// DER encoding of an ECDSA signature, as X.509 carries it.
trait EcdsaDer {
    fn der_bytes(&self) -> Vec<u8>;
}

impl EcdsaDer for p256::ecdsa::Signature {
    fn der_bytes(&self) -> Vec<u8> {
        self.to_der().as_bytes().to_vec()
    }
}

impl EcdsaDer for p384::ecdsa::Signature {
    fn der_bytes(&self) -> Vec<u8> {
        self.to_der().as_bytes().to_vec()
    }
}

impl EcdsaDer for p521::ecdsa::Signature {
    fn der_bytes(&self) -> Vec<u8> {
        self.to_der().as_bytes().to_vec()
    }
}

/// Left-pads a digest shorter than the curve field so it reads as the same
/// integer. ecdsa refuses prehashes under half the field size, which rules
/// out SHA-256 on P-521 otherwise.
fn widen_prehash(prehash: Vec<u8>, field_bytes: usize) -> Vec<u8> {
    if prehash.len() >= field_bytes {
        return prehash;
    }
    let mut widened = vec![0u8; field_bytes - prehash.len()];
    widened.extend_from_slice(&prehash);
    widened
}

fn ecdsa_prehash<S, Sig>(
    signer: &S,
    tbs: &[u8],
    digest: DigestAlgorithm,
    field_bytes: usize,
) -> Result<Vec<u8>>
where
    S: PrehashSigner<Sig>,
    Sig: EcdsaDer,
{
    let prehash = widen_prehash(digest.digest(tbs), field_bytes);
    let signature = signer
        .sign_prehash(&prehash)
        .map_err(|e| CaError::CryptoDelegation(format!("ECDSA signing with {digest}: {e}")))?;
    Ok(signature.der_bytes())
}

impl SigningBackend for KeyPair {
    fn public_key(&self) -> PublicKey {
        PublicKey::from_key_pair(self)
    }

    fn signature_algorithm(&self, digest: DigestAlgorithm) -> Result<SignatureAlgorithm> {
        if digest == DigestAlgorithm::Sha1 {
            return Err(CaError::CryptoDelegation(
                "SHA-1 is not accepted for signatures".to_string(),
            ));
        }
        Ok(match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::RsaPkcs1v15(digest),
            KeyPair::EcdsaP256 { .. } | KeyPair::EcdsaP384 { .. } | KeyPair::EcdsaP521 { .. } => {
                SignatureAlgorithm::Ecdsa(digest)
            }
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        })
    }

    fn sign(&self, tbs: &[u8], digest: DigestAlgorithm) -> Result<Vec<u8>> {
        // Validates the digest choice before any key material is touched.
        self.signature_algorithm(digest)?;
        match self {
            KeyPair::Rsa { private, .. } => {
                let key = (**private).clone();
                let signature = match digest {
                    DigestAlgorithm::Sha384 => rsa::pkcs1v15::SigningKey::<Sha384>::new(key)
                        .try_sign(tbs)
                        .map(|s| s.to_vec()),
                    DigestAlgorithm::Sha512 => rsa::pkcs1v15::SigningKey::<Sha512>::new(key)
                        .try_sign(tbs)
                        .map(|s| s.to_vec()),
                    _ => rsa::pkcs1v15::SigningKey::<Sha256>::new(key)
                        .try_sign(tbs)
                        .map(|s| s.to_vec()),
                };
                signature.map_err(|e| CaError::CryptoDelegation(format!("RSA signing: {e}")))
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                ecdsa_prehash::<_, p256::ecdsa::Signature>(signing_key, tbs, digest, 32)
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                ecdsa_prehash::<_, p384::ecdsa::Signature>(signing_key, tbs, digest, 48)
            }
            KeyPair::EcdsaP521 { signing_key, .. } => {
                ecdsa_prehash::<_, p521::ecdsa::Signature>(
                    signing_key,
                    tbs,
                    digest,
                    P521_FIELD_BYTES,
                )
            }
            KeyPair::Ed25519 { signing_key } => {
                let signature: ed25519_dalek::Signature = signing_key.sign(tbs);
                Ok(signature.to_bytes().to_vec())
            }
        }
    }
}

/// A subject public key, as carried in a certificate or CSR.
#[derive(Clone)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    EcdsaP521(P521VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey")
            .field(&self.algorithm_name())
            .finish()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_spki_der(), other.to_spki_der()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl PublicKey {
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::EcdsaP521 { verifying_key, .. } => {
                PublicKey::EcdsaP521(verifying_key.clone())
            }
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// Encodes the key as a SubjectPublicKeyInfo.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            PublicKey::EcdsaP256(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::EcdsaP384(verifying_key) => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            PublicKey::EcdsaP521(verifying_key) => {
                // p521's verifying key has no SPKI encoder; go through the
                // generic elliptic-curve public key.
                let point = verifying_key.to_encoded_point(false);
                let public = p521::PublicKey::from_sec1_bytes(point.as_bytes())
                    .map_err(|e| CaError::EncodingError(e.to_string()))?;
                SubjectPublicKeyInfoOwned::from_key(public)?
            }
            PublicKey::Ed25519(verifying_key) => SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: ID_ED25519,
                    parameters: None,
                },
                subject_public_key: der::asn1::BitString::from_bytes(verifying_key.as_bytes())?,
            },
        };
        Ok(spki)
    }

    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        Ok(self.to_spki()?.to_der()?)
    }

    /// Decodes a SubjectPublicKeyInfo into a supported key type.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let key_bytes = spki.subject_public_key.raw_bytes();
        match spki.algorithm.oid {
            RSA_ENCRYPTION => {
                let public = RsaPublicKey::from_pkcs1_der(key_bytes)?;
                Ok(PublicKey::Rsa(public))
            }
            ID_EC_PUBLIC_KEY => {
                let curve: ObjectIdentifier = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .ok_or_else(|| {
                        CaError::DecodingError("EC public key without curve parameters".to_string())
                    })?
                    .decode_as()?;
                let invalid = |e: ecdsa::Error| CaError::DecodingError(e.to_string());
                match curve {
                    SECP256R1 => Ok(PublicKey::EcdsaP256(
                        P256VerifyingKey::from_sec1_bytes(key_bytes).map_err(invalid)?,
                    )),
                    SECP384R1 => Ok(PublicKey::EcdsaP384(
                        P384VerifyingKey::from_sec1_bytes(key_bytes).map_err(invalid)?,
                    )),
                    SECP521R1 => Ok(PublicKey::EcdsaP521(
                        P521VerifyingKey::from_sec1_bytes(key_bytes).map_err(invalid)?,
                    )),
                    other => Err(CaError::DecodingError(format!(
                        "unsupported elliptic curve {other}"
                    ))),
                }
            }
            ID_ED25519 => {
                let bytes: [u8; 32] = key_bytes.try_into().map_err(|_| {
                    CaError::DecodingError("Ed25519 public key must be 32 bytes".to_string())
                })?;
                let key = Ed25519VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| CaError::DecodingError(e.to_string()))?;
                Ok(PublicKey::Ed25519(key))
            }
            other => Err(CaError::DecodingError(format!(
                "unsupported public key algorithm {other}"
            ))),
        }
    }

    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        Self::from_x509spki(&SubjectPublicKeyInfoOwned::from_der(der)?)
    }

    /// SHA-1 over the subjectPublicKey BIT STRING contents
    /// (RFC 5280 4.2.1.2, method 1).
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let spki = self.to_spki()?;
        Ok(DigestAlgorithm::Sha1.digest(spki.subject_public_key.raw_bytes()))
    }

    /// Verifies `signature` over `message` under `algorithm`.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<()> {
        let failed = |e: rsa::signature::Error| CaError::CryptoDelegation(e.to_string());
        match (self, algorithm) {
            (PublicKey::Rsa(public), SignatureAlgorithm::RsaPkcs1v15(digest)) => {
                let signature = rsa::pkcs1v15::Signature::try_from(signature).map_err(failed)?;
                let key = public.clone();
                match digest {
                    DigestAlgorithm::Sha256 => rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key)
                        .verify(message, &signature),
                    DigestAlgorithm::Sha384 => rsa::pkcs1v15::VerifyingKey::<Sha384>::new(key)
                        .verify(message, &signature),
                    DigestAlgorithm::Sha512 => rsa::pkcs1v15::VerifyingKey::<Sha512>::new(key)
                        .verify(message, &signature),
                    DigestAlgorithm::Sha1 => {
                        return Err(CaError::CryptoDelegation(
                            "SHA-1 signatures are not accepted".to_string(),
                        ));
                    }
                }
                .map_err(failed)
            }
            (PublicKey::EcdsaP256(key), SignatureAlgorithm::Ecdsa(digest)) => {
                let signature = p256::ecdsa::Signature::from_der(signature).map_err(failed)?;
                key.verify_prehash(&digest.digest(message), &signature)
                    .map_err(failed)
            }
            (PublicKey::EcdsaP384(key), SignatureAlgorithm::Ecdsa(digest)) => {
                let signature = p384::ecdsa::Signature::from_der(signature).map_err(failed)?;
                key.verify_prehash(&digest.digest(message), &signature)
                    .map_err(failed)
            }
            (PublicKey::EcdsaP521(key), SignatureAlgorithm::Ecdsa(digest)) => {
                let signature = p521::ecdsa::Signature::from_der(signature).map_err(failed)?;
                key.verify_prehash(
                    &widen_prehash(digest.digest(message), P521_FIELD_BYTES),
                    &signature,
                )
                .map_err(failed)
            }
            (PublicKey::Ed25519(key), SignatureAlgorithm::Ed25519) => {
                let signature = ed25519_dalek::Signature::from_slice(signature).map_err(failed)?;
                key.verify(message, &signature).map_err(failed)
            }
            (key, algorithm) => Err(CaError::CryptoDelegation(format!(
                "signature algorithm {algorithm:?} does not match {} key",
                key.algorithm_name()
            ))),
        }
    }

    fn algorithm_name(&self) -> &'static str {
        match self {
            PublicKey::Rsa(_) => "RSA",
            PublicKey::EcdsaP256(_) => "P-256",
            PublicKey::EcdsaP384(_) => "P-384",
            PublicKey::EcdsaP521(_) => "P-521",
            PublicKey::Ed25519(_) => "Ed25519",
        }
    }
}
