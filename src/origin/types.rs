//! Origin metadata document and image locator selection.

use serde::Deserialize;

/// Image URLs offered for one card (or one face of it).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageUris {
    pub normal: Option<String>,
    pub small: Option<String>,
    pub png: Option<String>,
}

impl ImageUris {
    /// Preferred locator: `normal`, then `small`, then `png`.
    pub fn best(&self) -> Option<&str> {
        [&self.normal, &self.small, &self.png]
            .into_iter()
            .filter_map(|uri| uri.as_deref())
            .find(|uri| !uri.trim().is_empty())
    }
}

/// One face of a multi-faced card.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFace {
    #[serde(default)]
    pub image_uris: Option<ImageUris>,
}

/// Metadata returned by the origin for a card id.
///
/// Unknown fields are ignored; only the image locators matter here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardDocument {
    #[serde(default)]
    pub image_uris: Option<ImageUris>,

    #[serde(default)]
    pub card_faces: Option<Vec<CardFace>>,
}

impl CardDocument {
    /// Image locator for this card.
    ///
    /// Multi-faced cards often carry no top-level `image_uris`; the front
    /// face is used then.
    pub fn image_locator(&self) -> Option<&str> {
        if let Some(uri) = self.image_uris.as_ref().and_then(ImageUris::best) {
            return Some(uri);
        }
        self.card_faces
            .as_deref()
            .and_then(|faces| faces.first())
            .and_then(|face| face.image_uris.as_ref())
            .and_then(ImageUris::best)
    }
}
