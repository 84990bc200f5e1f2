//! Object naming for fetched images

/// Delimiter separating the source prefix from the image name in webhook URLs
pub const NAME_DELIMITER: &str = "=/";

/// Content type label attached to every stored image
///
/// The extension is not inspected, so the subtype is always left empty.
pub const IMAGE_CONTENT_TYPE: &str = "image/";

/// Storage object name and content type derived from a source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFilename {
    /// Object name inside the bucket
    pub name: String,
    /// Content type label stored with the object
    pub content_type: &'static str,
}

/// Derives the storage object name for an image URL
///
/// The name is whatever follows the last `=/` in the URL. URLs without the
/// delimiter are used verbatim.
#[must_use]
pub fn derive_filename(url: &str) -> DerivedFilename {
    let name = url.rsplit(NAME_DELIMITER).next().unwrap_or(url);

    DerivedFilename {
        name: name.to_string(),
        content_type: IMAGE_CONTENT_TYPE,
    }
}
