//! Small wrapper over `quick-xml` shared by the XML-based handlers.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, BytesText, Event};

use crate::FormatError;

/// Pull reader over an in-memory document that tags its errors with the
/// handler name.
pub(crate) struct XmlEvents<'a> {
    reader: Reader<&'a [u8]>,
    format: &'static str,
}

impl<'a> XmlEvents<'a> {
    pub(crate) fn new(format: &'static str, bytes: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);
        Self { reader, format }
    }

    pub(crate) fn next(&mut self) -> Result<Event<'a>, FormatError> {
        self.reader.read_event().map_err(|source| self.error(source))
    }

    pub(crate) fn text(&self, text: &BytesText<'_>) -> Result<String, FormatError> {
        text.unescape()
            .map(|value| value.trim().to_owned())
            .map_err(|source| self.error(source))
    }

    pub(crate) fn attribute(
        &self,
        element: &BytesStart<'_>,
        key: &[u8],
    ) -> Result<Option<String>, FormatError> {
        for attribute in element.attributes() {
            let attribute = attribute.map_err(|source| self.error(source.into()))?;
            if attribute.key.local_name().as_ref() == key {
                let value = attribute
                    .unescape_value()
                    .map_err(|source| self.error(source))?;
                return Ok(Some(value.into_owned()));
            }
        }
        Ok(None)
    }

    fn error(&self, source: quick_xml::Error) -> FormatError {
        FormatError::Xml {
            format: self.format,
            position: u64::try_from(self.reader.buffer_position()).unwrap_or(u64::MAX),
            source,
        }
    }
}

/// Local (namespace-free) name of an element.
pub(crate) fn local_name(element: &BytesStart<'_>) -> Vec<u8> {
    element.local_name().as_ref().to_vec()
}
