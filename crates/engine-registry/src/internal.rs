//! The `__internal` property bookkeeping convention (spec §4.3.1).
//!
//! Provider resources carry engine bookkeeping inside a reserved
//! `__internal` object key, kept separate from the user-facing config that
//! is actually forwarded to the plugin.

use engine_core::{PropertyMap, PropertyValue};

const INTERNAL_KEY: &str = "__internal";
const NAME_KEY: &str = "name";
const DOWNLOAD_URL_KEY: &str = "pluginDownloadURL";
const CHECKSUMS_KEY: &str = "pluginChecksums";
const PARAMETERIZATION_KEY: &str = "parameterization";
const VERSION_KEY: &str = "version";
const TOP_LEVEL_VERSION_KEY: &str = "version";

/// Read-only view over a provider resource's `__internal` bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct InternalConfig {
    /// Package name override for a parameterized provider.
    pub name: Option<String>,
    /// Override download URL for plugin acquisition.
    pub download_url: Option<String>,
    /// Expected checksums, keyed by platform.
    pub checksums: Option<PropertyMap>,
    /// Opaque parameterization payload, base64-decoded.
    pub parameterization: Option<Vec<u8>>,
    /// Parameterized package version, mirrored under `__internal`.
    pub parameterized_version: Option<String>,
}

impl InternalConfig {
    /// Reads the `__internal` object out of `props`, defaulting every field
    /// when the key is absent.
    pub fn read(props: &PropertyMap) -> Self {
        let Some(PropertyValue::Object(internal)) = props.get(INTERNAL_KEY) else {
            return InternalConfig::default();
        };
        InternalConfig {
            name: string_field(internal, NAME_KEY),
            download_url: string_field(internal, DOWNLOAD_URL_KEY),
            checksums: match internal.get(CHECKSUMS_KEY) {
                Some(PropertyValue::Object(map)) => Some(map.clone()),
                _ => None,
            },
            parameterization: string_field(internal, PARAMETERIZATION_KEY)
                .and_then(|encoded| decode_base64(&encoded)),
            parameterized_version: string_field(internal, VERSION_KEY),
        }
    }
}

fn string_field(map: &PropertyMap, key: &str) -> Option<String> {
    match map.get(key) {
        Some(PropertyValue::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(encoded).ok()
}

/// The package version, read from the top-level `version` property (never
/// the `__internal` one, which only applies to parameterized packages).
pub fn package_version(props: &PropertyMap) -> Option<&str> {
    match props.get(TOP_LEVEL_VERSION_KEY) {
        Some(PropertyValue::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Returns a copy of `props` with the `__internal` key removed, suitable for
/// forwarding to a plugin's `CheckConfig`/`Configure`.
pub fn strip_internal(props: &PropertyMap) -> PropertyMap {
    let mut out = props.clone();
    out.remove(INTERNAL_KEY);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_internal_defaults_to_empty() {
        let props = PropertyMap::new();
        let internal = InternalConfig::read(&props);
        assert!(internal.name.is_none());
        assert!(internal.checksums.is_none());
    }

    #[test]
    fn reads_parameterization_and_strips_it_from_forwarded_props() {
        use base64::Engine;
        let mut inner = PropertyMap::new();
        inner.insert(
            PARAMETERIZATION_KEY.to_string(),
            PropertyValue::String(base64::engine::general_purpose::STANDARD.encode(b"payload")),
        );
        inner.insert(NAME_KEY.to_string(), PropertyValue::String("acme".into()));
        let mut props = PropertyMap::new();
        props.insert(INTERNAL_KEY.to_string(), PropertyValue::Object(inner));
        props.insert("region".to_string(), PropertyValue::String("us-east".into()));

        let internal = InternalConfig::read(&props);
        assert_eq!(internal.parameterization.as_deref(), Some(&b"payload"[..]));
        assert_eq!(internal.name.as_deref(), Some("acme"));

        let forwarded = strip_internal(&props);
        assert!(!forwarded.contains_key(INTERNAL_KEY));
        assert!(forwarded.contains_key("region"));
    }
}
