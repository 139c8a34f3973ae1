//! Release-listing payload and asset selection.

use serde::Deserialize;

/// Latest-release response: a version tag plus downloadable assets.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseListing {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// First asset whose name contains `pattern` and ends with `suffix`.
pub fn select_asset<'a>(
    listing: &'a ReleaseListing,
    pattern: &str,
    suffix: &str,
) -> Option<&'a ReleaseAsset> {
    listing
        .assets
        .iter()
        .find(|asset| asset.name.contains(pattern) && asset.name.ends_with(suffix))
}
