//! Media readiness and media-list identity helpers.

/// `HTMLMediaElement.HAVE_NOTHING`.
pub const HAVE_NOTHING: u16 = 0;
/// `HTMLMediaElement.HAVE_CURRENT_DATA`.
pub const HAVE_CURRENT_DATA: u16 = 2;
/// `HTMLMediaElement.HAVE_ENOUGH_DATA`.
pub const HAVE_ENOUGH_DATA: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Single source of truth for whether a media reference may be uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaReadyState {
    #[default]
    NotStarted,
    Loading,
    Ready,
    Failed,
}

impl MediaReadyState {
    pub fn is_ready(self) -> bool {
        self == MediaReadyState::Ready
    }

    /// Readiness of an `<img>` from its `complete` flag and natural size.
    ///
    /// A complete image with no pixels is a broken image.
    pub fn of_image(complete: bool, natural_width: u32, natural_height: u32) -> Self {
        match (complete, natural_width > 0 && natural_height > 0) {
            (true, true) => MediaReadyState::Ready,
            (true, false) => MediaReadyState::Failed,
            (false, _) => MediaReadyState::Loading,
        }
    }

    /// Readiness of a `<video>` from its `readyState` and intrinsic size.
    pub fn of_video(ready_state: u16, video_width: u32, video_height: u32) -> Self {
        if ready_state == HAVE_NOTHING {
            MediaReadyState::NotStarted
        } else if ready_state >= HAVE_ENOUGH_DATA && video_width > 0 && video_height > 0 {
            MediaReadyState::Ready
        } else {
            MediaReadyState::Loading
        }
    }
}

/// Last path segment of a URL, lower-cased, without query or fragment.
pub fn file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_lowercase()
}

/// Two URLs name the same file when they are equal or share a file name.
pub fn same_media(a: &str, b: &str) -> bool {
    a == b || file_name(a) == file_name(b)
}

/// First entry of `media` that is a genuinely different file from `source`.
pub fn distinct_target<'a, S: AsRef<str>>(source: &str, media: &'a [S]) -> Option<&'a str> {
    media
        .iter()
        .map(AsRef::as_ref)
        .find(|url| !same_media(source, url))
}

/// Index of the entry in `media` that shows the gallery thumbnail `source`.
///
/// Matches on URL, file name, or on the thumbnail's base name (file name up
/// to its first `.`) appearing in the media URL.
pub fn thumbnail_index<S: AsRef<str>>(source: &str, media: &[S]) -> Option<usize> {
    let name = file_name(source);
    let base = name.split('.').next().unwrap_or_default();
    media.iter().position(|entry| {
        let url = entry.as_ref();
        same_media(source, url) || (!base.is_empty() && url.to_lowercase().contains(base))
    })
}

/// `media` reordered so the thumbnail entry, if present, comes first.
pub fn order_with_thumbnail_first<S: AsRef<str> + Clone>(source: &str, media: &[S]) -> Vec<S> {
    let mut ordered = media.to_vec();
    if let Some(index) = thumbnail_index(source, media) {
        let thumbnail = ordered.remove(index);
        ordered.insert(0, thumbnail);
    }
    ordered
}
