//! Scene name lookup

use std::collections::HashMap;

/// Resolves a human scene name to the 16-bit code the light expects
pub trait SceneCatalog: Send + Sync {
    fn lookup(&self, name: &str) -> Option<u16>;
}

/// Scene catalog backed by an in-memory table
#[derive(Debug, Clone, Default)]
pub struct SceneTable {
    scenes: HashMap<String, u16>,
}

impl SceneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a scene
    pub fn insert(&mut self, name: impl Into<String>, code: u16) {
        self.scenes.insert(name.into(), code);
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl From<HashMap<String, u16>> for SceneTable {
    fn from(scenes: HashMap<String, u16>) -> Self {
        Self { scenes }
    }
}

impl<S: Into<String>> FromIterator<(S, u16)> for SceneTable {
    fn from_iter<I: IntoIterator<Item = (S, u16)>>(iter: I) -> Self {
        Self {
            scenes: iter.into_iter().map(|(name, code)| (name.into(), code)).collect(),
        }
    }
}

impl SceneCatalog for SceneTable {
    fn lookup(&self, name: &str) -> Option<u16> {
        self.scenes.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let mut table = SceneTable::new();
        assert!(table.is_empty());

        table.insert("Sunrise", 0x0041);
        assert_eq!(table.lookup("Sunrise"), Some(0x0041));
        assert_eq!(table.lookup("sunrise"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_collect() {
        let table: SceneTable = [("Aurora", 0x0bb1), ("Forest", 0x0012)].into_iter().collect();
        assert_eq!(table.lookup("Aurora"), Some(0x0bb1));
        assert_eq!(table.lookup("Ocean"), None);
    }
}
