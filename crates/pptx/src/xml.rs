//! Small helpers shared by the quick-xml event loops.

use deck_core::Error;
use quick_xml::events::BytesStart;

/// Office document relationships namespace (the `r:` prefix).
pub const NS_OFFICE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Strict OOXML spelling of [`NS_OFFICE_RELATIONSHIPS`].
pub const NS_OFFICE_RELATIONSHIPS_STRICT: &str =
    "http://purl.oclc.org/ooxml/officeDocument/relationships";

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// The prefix of a qualified name, if it has one.
pub(crate) fn prefix(name: &[u8]) -> Option<&[u8]> {
    name.iter().position(|&b| b == b':').map(|pos| &name[..pos])
}

/// Join an optional prefix and a local name into a qualified name.
pub(crate) fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}:{}", p, local),
        _ => local.to_string(),
    }
}

/// Value of the attribute whose full key is exactly `key`.
pub(crate) fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, Error> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error("bad attribute", err))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|err| xml_error("bad attribute value", err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Value of a prefixed `*:id` attribute, i.e. an `r:id` relationship reference
/// regardless of which prefix the document bound to the relationships namespace.
pub(crate) fn relationship_ref(e: &BytesStart<'_>) -> Result<Option<String>, Error> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| xml_error("bad attribute", err))?;
        let key = attr.key.as_ref();
        if prefix(key).is_some() && local_name(key) == b"id" {
            let value = attr
                .unescape_value()
                .map_err(|err| xml_error("bad attribute value", err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Build an [`Error::XmlError`] with some context.
pub(crate) fn xml_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::XmlError(format!("{}: {}", context, err))
}
