use std::path::Path;

/// associating a extension with a enum
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum FileType {
    Npz,
    Json,
    Unknown,
}
impl FileType {
    pub fn value(&self) -> &'static [&'static str] {
        match self {
            Self::Npz => &["npz"],
            Self::Json => &["json"],
            Self::Unknown => &[""],
        }
    }
    pub fn find_match(ext: &str) -> Self {
        Self::iter()
            .find(|filetype| filetype.value().contains(&(ext.to_lowercase()).as_str()))
            .unwrap_or(FileType::Unknown)
    }
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(FileType::Unknown, Self::find_match)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(FileType::find_match("NPZ"), FileType::Npz);
        assert_eq!(FileType::from_path(Path::new("a/b/clip.json")), FileType::Json);
        assert_eq!(FileType::from_path(Path::new("a/b/clip")), FileType::Unknown);
        assert_eq!(FileType::from_path(Path::new("a/b/clip.glb")), FileType::Unknown);
    }
}
