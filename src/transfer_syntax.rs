use std::collections::HashMap;
use std::fmt;

use dicom_dictionary_std::uids;

use crate::cursor::Endianness;

/// Encoding policy of a stream after its file meta group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSyntax {
    pub uid: String,
    pub name: String,
    pub endianness: Endianness,
    /// Whether element headers carry a value representation code.
    pub explicit: bool,
    /// Whether pixel data is compressed or otherwise encoded.
    pub encoded: bool,
}

impl TransferSyntax {
    pub fn new(
        uid: impl Into<String>,
        name: impl Into<String>,
        endianness: Endianness,
        explicit: bool,
        encoded: bool,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            endianness,
            explicit,
            encoded,
        }
    }

    /// Stand-in for an identifier the registry does not know.
    ///
    /// Assumes explicit little endian with encoded pixel data, so only
    /// decoders that understand the identifier will touch the pixels.
    pub fn unknown(uid: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            name: uid.clone(),
            uid,
            endianness: Endianness::Little,
            explicit: true,
            encoded: true,
        }
    }

    pub fn implicit_vr_little_endian() -> Self {
        Self::new(
            uids::IMPLICIT_VR_LITTLE_ENDIAN,
            "Implicit VR Little Endian",
            Endianness::Little,
            false,
            false,
        )
    }

    pub fn explicit_vr_little_endian() -> Self {
        Self::new(
            uids::EXPLICIT_VR_LITTLE_ENDIAN,
            "Explicit VR Little Endian",
            Endianness::Little,
            true,
            false,
        )
    }

    /// Retired from the standard but still found in archives.
    #[allow(deprecated)]
    pub fn explicit_vr_big_endian() -> Self {
        Self::new(
            uids::EXPLICIT_VR_BIG_ENDIAN,
            "Explicit VR Big Endian",
            Endianness::Big,
            true,
            false,
        )
    }

    pub fn is_big_endian(&self) -> bool {
        self.endianness == Endianness::Big
    }
}

impl fmt::Display for TransferSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uid)
    }
}

/// Strips the padding an even-length UI value may carry.
fn normalize_uid(uid: &str) -> &str {
    uid.trim_matches(|c: char| c == '\0' || c.is_whitespace())
}

/// The set of transfer syntaxes the decoder recognises, keyed by UID.
#[derive(Debug, Clone)]
pub struct TransferSyntaxRegistry {
    syntaxes: HashMap<String, TransferSyntax>,
}

impl Default for TransferSyntaxRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(TransferSyntax::implicit_vr_little_endian());
        registry.register(TransferSyntax::explicit_vr_little_endian());
        registry.register(TransferSyntax::explicit_vr_big_endian());
        registry.register(TransferSyntax::new(
            "1.2.840.10008.1.2.1.98",
            "Encapsulated Uncompressed Explicit VR Little Endian",
            Endianness::Little,
            true,
            false,
        ));
        registry.register(TransferSyntax::new(
            uids::RLE_LOSSLESS,
            "RLE Lossless",
            Endianness::Little,
            true,
            true,
        ));

        for (uid, name) in [
            ("1.2.840.10008.1.2.4.50", "JPEG Baseline (Process 1)"),
            ("1.2.840.10008.1.2.4.51", "JPEG Extended (Process 2 & 4)"),
            ("1.2.840.10008.1.2.4.57", "JPEG Lossless, Non-Hierarchical (Process 14)"),
            ("1.2.840.10008.1.2.4.70", "JPEG Lossless, First-Order Prediction"),
            ("1.2.840.10008.1.2.4.80", "JPEG-LS Lossless"),
            ("1.2.840.10008.1.2.4.81", "JPEG-LS Lossy (Near-Lossless)"),
            ("1.2.840.10008.1.2.4.90", "JPEG 2000 (Lossless Only)"),
            ("1.2.840.10008.1.2.4.91", "JPEG 2000"),
            ("1.2.840.10008.1.2.4.100", "MPEG2 Main Profile @ Main Level"),
        ] {
            registry.register(TransferSyntax::new(uid, name, Endianness::Little, true, true));
        }
        registry
    }
}

impl TransferSyntaxRegistry {
    /// A registry without any syntaxes.
    pub fn empty() -> Self {
        Self {
            syntaxes: HashMap::new(),
        }
    }

    /// Adds a syntax, replacing any previous entry with the same UID.
    pub fn register(&mut self, syntax: TransferSyntax) {
        self.syntaxes
            .insert(normalize_uid(&syntax.uid).to_owned(), syntax);
    }

    pub fn get(&self, uid: &str) -> Option<&TransferSyntax> {
        self.syntaxes.get(normalize_uid(uid))
    }

    /// Looks up `uid`, falling back to [`TransferSyntax::unknown`].
    pub fn resolve(&self, uid: &str) -> TransferSyntax {
        match self.get(uid) {
            Some(syntax) => syntax.clone(),
            None => {
                tracing::warn!(uid = normalize_uid(uid), "unknown transfer syntax");
                TransferSyntax::unknown(normalize_uid(uid))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.syntaxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syntaxes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferSyntax> {
        self.syntaxes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_syntaxes() {
        let registry = TransferSyntaxRegistry::default();
        let implicit = registry.get("1.2.840.10008.1.2").unwrap();
        assert!(!implicit.explicit);
        assert!(!implicit.encoded);
        assert_eq!(implicit.endianness, Endianness::Little);

        let big = registry.get("1.2.840.10008.1.2.2\0").unwrap();
        assert!(big.is_big_endian());
        assert!(big.explicit);
        assert_eq!(TransferSyntax::explicit_vr_big_endian().uid, big.uid);

        assert!(registry.get("1.2.840.10008.1.2.4.50").unwrap().encoded);
        assert!(registry.get("1.2.840.10008.1.2.4.90 ").unwrap().encoded);
    }

    #[test]
    fn unknown_falls_back_to_encoded_explicit_little_endian() {
        let registry = TransferSyntaxRegistry::default();
        assert!(registry.get("1.2.3.4").is_none());
        let syntax = registry.resolve("1.2.3.4\0");
        assert_eq!(syntax.uid, "1.2.3.4");
        assert_eq!(syntax.endianness, Endianness::Little);
        assert!(syntax.explicit);
        assert!(syntax.encoded);
    }

    #[test]
    fn registry_is_extensible() {
        let mut registry = TransferSyntaxRegistry::empty();
        assert!(registry.is_empty());
        registry.register(TransferSyntax::new(
            "1.2.3.4",
            "Private raw",
            Endianness::Big,
            false,
            false,
        ));
        let syntax = registry.resolve("1.2.3.4");
        assert_eq!(syntax.name, "Private raw");
        assert!(!syntax.encoded);
        assert_eq!(registry.len(), 1);
    }
}
