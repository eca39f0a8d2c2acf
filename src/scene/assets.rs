use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use bevy::prelude::*;
use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AssetKind {
    Sprite,
    Audio,
}

impl AssetKind {
    fn dir(self) -> &'static str {
        match self {
            Self::Sprite => "graphics/base-images/",
            Self::Audio => "audio/",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Sprite => &["png", "jpg"],
            Self::Audio => &["wav", "ogg"],
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sprite => f.write_str("sprite"),
            Self::Audio => f.write_str("audio"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("empty {0} name")]
    EmptyName(AssetKind),
    #[error("{kind} '{name}' not found")]
    NotFound { kind: AssetKind, name: String },
}

/// Path of a resolved asset, relative to the assets root (what `AssetServer::load` takes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRef(pub String);

impl AssetRef {
    pub fn path(&self) -> &str {
        &self.0
    }
}

/// Resolves sprite and audio names to asset paths, either against a
/// directory on disk or against a fixed manifest of relative paths.
#[derive(Resource, Clone, Debug)]
pub struct AssetCatalog {
    root: PathBuf,
    manifest: Option<HashSet<String>>,
}

impl AssetCatalog {
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest: None,
        }
    }

    pub fn from_manifest<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: PathBuf::new(),
            manifest: Some(paths.into_iter().map(Into::into).collect()),
        }
    }

    fn contains(&self, relative: &str) -> bool {
        match &self.manifest {
            Some(manifest) => manifest.contains(relative),
            None => self.root.join(relative).is_file(),
        }
    }

    pub fn resolve(&self, kind: AssetKind, name: &str) -> Result<AssetRef, AssetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AssetError::EmptyName(kind));
        }
        let exact = format!("{}{}", kind.dir(), name);
        if self.contains(&exact) {
            return Ok(AssetRef(exact));
        }
        kind.extensions()
            .iter()
            .map(|ext| format!("{exact}.{ext}"))
            .find(|candidate| self.contains(candidate))
            .map(AssetRef)
            .ok_or_else(|| AssetError::NotFound {
                kind,
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_with_and_without_extension() {
        let catalog = AssetCatalog::from_manifest([
            "graphics/base-images/ball.png",
            "audio/chimes.wav",
            "audio/ding.ogg",
        ]);
        assert_eq!(
            catalog.resolve(AssetKind::Sprite, "ball"),
            Ok(AssetRef("graphics/base-images/ball.png".to_string()))
        );
        assert_eq!(
            catalog.resolve(AssetKind::Audio, "chimes.wav"),
            Ok(AssetRef("audio/chimes.wav".to_string()))
        );
        assert_eq!(
            catalog.resolve(AssetKind::Audio, "ding"),
            Ok(AssetRef("audio/ding.ogg".to_string()))
        );
    }

    #[test]
    fn missing_and_empty_names_are_errors() {
        let catalog = AssetCatalog::from_manifest(Vec::<String>::new());
        assert_eq!(
            catalog.resolve(AssetKind::Sprite, "ghost"),
            Err(AssetError::NotFound {
                kind: AssetKind::Sprite,
                name: "ghost".to_string()
            })
        );
        assert_eq!(
            catalog.resolve(AssetKind::Audio, "  "),
            Err(AssetError::EmptyName(AssetKind::Audio))
        );
    }

    #[test]
    fn directory_catalog_misses_nonexistent_root() {
        let catalog = AssetCatalog::from_dir("/nonexistent/stagehand-assets");
        assert!(catalog.resolve(AssetKind::Sprite, "ball").is_err());
    }
}
