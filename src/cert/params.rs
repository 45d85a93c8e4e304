use std::fmt;

use bon::bon;
use const_oid::ObjectIdentifier;
use const_oid::db::rfc4519;
use der::{Tag, Tagged};
use der::asn1::{Any, OctetString, PrintableStringRef, SetOfVec};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::Extension;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CaError, Result};
use crate::oid::OidRegistry;

const EMAIL_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// One `type=value` pair of a distinguished name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameAttribute {
    pub oid: ObjectIdentifier,
    pub value: String,
}

/// Distinguished name of a certificate subject or issuer.
///
/// Attributes are kept in encoding order, one attribute per RDN.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    attributes: Vec<NameAttribute>,
}

#[bon]
impl DistinguishedName {
    /// Builds a name from the common attributes, encoded in the order
    /// C, ST, L, O, OU, CN.
    ///
    /// # Example
    /// ```
    /// use certkit_ca::cert::params::DistinguishedName;
    /// let dn = DistinguishedName::builder()
    ///     .common_name("example.com")
    ///     .organization("Example Org")
    ///     .build();
    /// assert_eq!(dn.common_name(), Some("example.com"));
    /// ```
    #[builder]
    pub fn new(
        #[builder(into)] common_name: Option<String>,
        #[builder(into)] country: Option<String>,
        #[builder(into)] state: Option<String>,
        #[builder(into)] locality: Option<String>,
        #[builder(into)] organization: Option<String>,
        #[builder(into)] organization_unit: Option<String>,
    ) -> Self {
        let mut dn = Self::default();
        for (oid, value) in [
            (rfc4519::C, country),
            (rfc4519::ST, state),
            (rfc4519::L, locality),
            (rfc4519::O, organization),
            (rfc4519::OU, organization_unit),
            (rfc4519::CN, common_name),
        ] {
            if let Some(value) = value {
                dn.attributes.push(NameAttribute { oid, value });
            }
        }
        dn
    }
}

impl DistinguishedName {
    /// Creates a name from `(short name or dotted OID, value)` pairs.
    pub fn from_pairs<K, V>(registry: &OidRegistry, pairs: &[(K, V)]) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let attributes = pairs
            .iter()
            .map(|(name, value)| {
                Ok(NameAttribute {
                    oid: registry.resolve_name_or_oid(name.as_ref())?,
                    value: value.as_ref().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { attributes })
    }

    /// Appends an attribute, keeping any existing one with the same OID.
    pub fn push(&mut self, oid: ObjectIdentifier, value: impl Into<String>) {
        self.attributes.push(NameAttribute {
            oid,
            value: value.into(),
        });
    }

    /// Replaces the first attribute with the same OID, or appends one.
    pub fn set(&mut self, oid: ObjectIdentifier, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|attr| attr.oid == oid) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(NameAttribute { oid, value }),
        }
    }

    pub fn get(&self, oid: &ObjectIdentifier) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.oid == *oid)
            .map(|attr| attr.value.as_str())
    }

    pub fn common_name(&self) -> Option<&str> {
        self.get(&rfc4519::CN)
    }

    pub fn attributes(&self) -> &[NameAttribute] {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// `C` is encoded as PrintableString and `emailAddress` as IA5String
    /// per RFC 5280; everything else is UTF8String.
    pub fn as_x509_name(&self) -> Result<x509_cert::name::DistinguishedName> {
        let rdns = self
            .attributes
            .iter()
            .map(|attr| {
                let tag = match attr.oid {
                    rfc4519::C if PrintableStringRef::new(&attr.value).is_ok() => {
                        Tag::PrintableString
                    }
                    EMAIL_ADDRESS if attr.value.is_ascii() => Tag::Ia5String,
                    _ => Tag::Utf8String,
                };
                let mut set = SetOfVec::new();
                set.insert(AttributeTypeAndValue {
                    oid: attr.oid,
                    value: Any::new(tag, attr.value.as_bytes().to_vec())?,
                })?;
                Ok(RelativeDistinguishedName::from(set))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Multi-valued RDNs are flattened in encoding order.
    pub fn from_x509_name(x509dn: &x509_cert::name::DistinguishedName) -> Result<Self> {
        let mut attributes = Vec::new();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                let value = match attr.value.tag() {
                    Tag::Utf8String
                    | Tag::PrintableString
                    | Tag::Ia5String
                    | Tag::TeletexString => std::str::from_utf8(attr.value.value())
                        .map_err(|e| CaError::DecodingError(e.to_string()))?
                        .to_string(),
                    other => {
                        return Err(CaError::DecodingError(format!(
                            "unsupported string type {other} for attribute {}",
                            attr.oid
                        )));
                    }
                };
                attributes.push(NameAttribute {
                    oid: attr.oid,
                    value,
                });
            }
        }
        Ok(Self { attributes })
    }
}

fn well_known_label(oid: &ObjectIdentifier) -> Option<&'static str> {
    Some(match *oid {
        rfc4519::CN => "CN",
        rfc4519::O => "O",
        rfc4519::OU => "OU",
        rfc4519::C => "C",
        rfc4519::ST => "ST",
        rfc4519::L => "L",
        EMAIL_ADDRESS => "emailAddress",
        _ => return None,
    })
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match well_known_label(&attr.oid) {
                Some(label) => write!(f, "{label}={}", attr.value)?,
                None => write!(f, "{}={}", attr.oid, attr.value)?,
            }
        }
        Ok(())
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: E, critical: bool) -> Result<Self> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        if self.oid != E::OID {
            return Err(CaError::DecodingError(format!(
                "extension {} is not {}",
                self.oid,
                E::OID
            )));
        }
        E::from_x509_extension_value(&self.value)
    }

    pub fn to_x509_extension(&self) -> Result<Extension> {
        Ok(Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())?,
        })
    }

    pub fn from_x509_extension(extension: &Extension) -> Self {
        Self {
            oid: extension.extn_id,
            critical: extension.critical,
            value: extension.extn_value.as_bytes().to_vec(),
        }
    }
}
