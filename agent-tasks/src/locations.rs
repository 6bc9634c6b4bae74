//! Named location bookmarks (extension type, §3).

use crate::persist::{read_json_or_default, write_json_atomic, PersistLock};
use agent_core::error::PersistenceError;
use agent_core::position::BlockPosition;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPoint {
    pub name: String,
    pub info: String,
    pub position: BlockPosition,
}

#[derive(Default, Serialize, Deserialize)]
struct LocationData {
    points: Vec<LocationPoint>,
}

pub struct LocationPoints {
    data: LocationData,
    path: PathBuf,
    lock: PersistLock,
}

impl LocationPoints {
    pub fn new(path: PathBuf) -> Self {
        Self {
            data: LocationData::default(),
            path,
            lock: PersistLock::new(),
        }
    }

    pub async fn load(path: PathBuf) -> Result<Self, PersistenceError> {
        let data: LocationData = read_json_or_default(&path).await?;
        Ok(Self {
            data,
            path,
            lock: PersistLock::new(),
        })
    }

    pub fn points(&self) -> &[LocationPoint] {
        &self.data.points
    }

    pub fn get(&self, name: &str) -> Option<&LocationPoint> {
        self.data.points.iter().find(|p| p.name == name)
    }

    /// Inserts a point, de-conflicting a duplicate `name` by appending
    /// `-1`, `-2`, … until a free name is found.
    pub async fn add(&mut self, name: impl Into<String>, info: impl Into<String>, position: BlockPosition) -> Result<String, PersistenceError> {
        let base_name = name.into();
        let mut final_name = base_name.clone();
        let mut suffix = 1;
        while self.data.points.iter().any(|p| p.name == final_name) {
            final_name = format!("{base_name}-{suffix}");
            suffix += 1;
        }
        self.data.points.push(LocationPoint {
            name: final_name.clone(),
            info: info.into(),
            position,
        });
        self.persist().await?;
        Ok(final_name)
    }

    async fn persist(&self) -> Result<(), PersistenceError> {
        write_json_atomic(&self.path, &self.data, &self.lock).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "agent-tasks-locations-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[tokio::test]
    async fn duplicate_names_are_suffixed() {
        let mut points = LocationPoints::new(unique_path());
        let first = points.add("base", "home", BlockPosition::new(0, 64, 0)).await.unwrap();
        let second = points.add("base", "second home", BlockPosition::new(10, 64, 0)).await.unwrap();
        let third = points.add("base", "third home", BlockPosition::new(20, 64, 0)).await.unwrap();
        assert_eq!(first, "base");
        assert_eq!(second, "base-1");
        assert_eq!(third, "base-2");
    }
}
