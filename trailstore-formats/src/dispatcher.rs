//! Extension to handler mapping.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use trailstore_core::normalise_extension;

use crate::photo::PHOTO_EXTENSIONS;
use crate::video::VIDEO_EXTENSIONS;
use crate::{Fit, FormatHandler, GeoJsonZone, Gpx, Kml, Kmz, Photo, Video};

/// Registry of format handlers keyed by extension.
#[derive(Clone, Default)]
pub struct FormatDispatcher {
    handlers: HashMap<String, Arc<dyn FormatHandler>>,
}

impl fmt::Debug for FormatDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<_> = self.handlers.keys().collect();
        extensions.sort();
        f.debug_struct("FormatDispatcher")
            .field("extensions", &extensions)
            .finish()
    }
}

impl FormatDispatcher {
    /// A dispatcher without any handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with every built-in handler registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(".gpx", Arc::new(Gpx));
        dispatcher.register(".fit", Arc::new(Fit));
        dispatcher.register(".kml", Arc::new(Kml));
        dispatcher.register(".kmz", Arc::new(Kmz));
        dispatcher.register(".geojson", Arc::new(GeoJsonZone));
        let photo: Arc<dyn FormatHandler> = Arc::new(Photo);
        for extension in PHOTO_EXTENSIONS {
            dispatcher.register(extension, Arc::clone(&photo));
        }
        let video: Arc<dyn FormatHandler> = Arc::new(Video);
        for extension in VIDEO_EXTENSIONS {
            dispatcher.register(extension, Arc::clone(&video));
        }
        dispatcher
    }

    /// Map `extension` to `handler`, returning the handler it replaces.
    ///
    /// Extensions that cannot be normalised are ignored.
    pub fn register(
        &mut self,
        extension: &str,
        handler: Arc<dyn FormatHandler>,
    ) -> Option<Arc<dyn FormatHandler>> {
        let Some(extension) = normalise_extension(extension) else {
            debug!("ignoring handler registration for invalid extension `{extension}`");
            return None;
        };
        self.handlers.insert(extension, handler)
    }

    /// Handler for `extension`, in any case and with or without its dot.
    #[must_use]
    pub fn handler_for(&self, extension: &str) -> Option<&dyn FormatHandler> {
        normalise_extension(extension)
            .and_then(|ext| self.handlers.get(&ext))
            .map(|handler| &**handler)
    }

    /// Registered extensions, sorted.
    #[must_use]
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FormatError, Parsed, Source};
    use rstest::rstest;
    use trailstore_core::ContentKind;

    struct Tcx;

    impl FormatHandler for Tcx {
        fn name(&self) -> &'static str {
            "tcx"
        }

        fn kind(&self) -> ContentKind {
            ContentKind::Track
        }

        fn parse(&self, _source: &Source<'_>) -> Result<Parsed, FormatError> {
            Ok(Parsed::empty())
        }
    }

    #[rstest]
    #[case(".gpx", "gpx")]
    #[case(".FIT", "fit")]
    #[case("KML", "kml")]
    #[case(".kmz", "kmz")]
    #[case(".GeoJSON", "zone")]
    #[case(".jpeg", "photo")]
    #[case(".heic", "photo")]
    #[case(".MOV", "video")]
    fn defaults_cover_the_built_in_formats(#[case] extension: &str, #[case] expected: &str) {
        let dispatcher = FormatDispatcher::with_defaults();
        let handler = dispatcher.handler_for(extension).expect("registered");
        assert_eq!(handler.name(), expected);
    }

    #[rstest]
    fn unknown_extensions_have_no_handler() {
        let dispatcher = FormatDispatcher::with_defaults();
        assert!(dispatcher.handler_for(".tcx").is_none());
        assert!(dispatcher.handler_for("").is_none());
    }

    #[rstest]
    fn new_formats_are_added_by_registration() {
        let mut dispatcher = FormatDispatcher::with_defaults();
        assert!(dispatcher.register(".TCX", Arc::new(Tcx)).is_none());
        let handler = dispatcher.handler_for("tcx").expect("registered");
        assert_eq!(handler.name(), "tcx");
        assert!(dispatcher.extensions().contains(&".tcx"));
    }
}
