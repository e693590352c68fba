use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

use inkreel_core::InkreelResult;

use crate::asset::PositionedAsset;
use crate::scene::{Scene, SceneId};
use crate::speech::SpeechEstimator;

/// A whiteboard project: scenes plus the assets each scene exclusively owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub scenes: Vec<Scene>,
    /// Assets keyed by owning scene, in draw order.
    #[serde(default)]
    pub assets: HashMap<SceneId, Vec<PositionedAsset>>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            scenes: Vec::new(),
            assets: HashMap::new(),
        }
    }

    pub fn load_from_file(path: &Path) -> InkreelResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save_to_file(&self, path: &Path) -> InkreelResult<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn add_scene(&mut self, scene: Scene) {
        self.scenes.push(scene);
    }

    /// Append an asset to a scene's draw list.
    pub fn add_asset(&mut self, scene: &SceneId, asset: PositionedAsset) {
        self.assets.entry(scene.clone()).or_default().push(asset);
    }

    /// Remove a scene together with every asset it owns.
    pub fn remove_scene(&mut self, id: &SceneId) -> Option<Scene> {
        let idx = self.scenes.iter().position(|s| &s.id == id)?;
        self.assets.remove(id);
        Some(self.scenes.remove(idx))
    }

    pub fn get_scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id.0 == id)
    }

    pub fn assets_for(&self, scene: &SceneId) -> &[PositionedAsset] {
        self.assets.get(scene).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.scenes.iter().map(|s| s.duration_ms).sum()
    }

    /// Snapshot of the project in render order.
    pub fn storyboard(&self) -> Storyboard {
        let mut scenes = self.scenes.clone();
        scenes.sort_by_key(|s| s.order_index);
        let assets = scenes
            .iter()
            .map(|s| (s.id.clone(), self.assets_for(&s.id).to_vec()))
            .collect();
        Storyboard { scenes, assets }
    }

    /// Stretch scenes whose narration would outlast them. Returns how many
    /// scenes were lengthened.
    pub fn fit_narration(&mut self, estimator: &dyn SpeechEstimator) -> usize {
        let mut changed = 0;
        for scene in &mut self.scenes {
            let needed = estimator.estimate_ms(scene.narration_text(), scene.speech_rate);
            if needed > scene.duration_ms {
                tracing::debug!(
                    "scene '{}' stretched from {}ms to {}ms for narration",
                    scene.id,
                    scene.duration_ms,
                    needed
                );
                scene.duration_ms = needed;
                changed += 1;
            }
        }
        changed
    }
}

/// Scenes sorted by order index, each with its ordered asset list. This is
/// the read-only input of rendering and export.
#[derive(Debug, Clone, Default)]
pub struct Storyboard {
    pub scenes: Vec<Scene>,
    pub assets: HashMap<SceneId, Vec<PositionedAsset>>,
}

impl Storyboard {
    pub fn assets_for(&self, scene: &SceneId) -> &[PositionedAsset] {
        self.assets.get(scene).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.scenes.iter().map(|s| s.duration_ms).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetSource;
    use crate::speech::WordRateEstimator;

    fn sample() -> Project {
        let mut p = Project::new("demo");
        p.add_scene(Scene::new("b", 20, 1_000));
        p.add_scene(Scene::new("a", 10, 2_000));
        p.add_asset(
            &SceneId::new("a"),
            PositionedAsset::new("x", AssetSource::Builtin("pen".into())),
        );
        p
    }

    #[test]
    fn test_storyboard_sorted_by_order_index() {
        let board = sample().storyboard();
        let ids: Vec<_> = board.scenes.iter().map(|s| s.id.0.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(board.assets_for(&SceneId::new("a")).len(), 1);
        assert!(board.assets_for(&SceneId::new("b")).is_empty());
        assert_eq!(board.total_duration_ms(), 3_000);
    }

    #[test]
    fn test_remove_scene_cascades_assets() {
        let mut p = sample();
        let removed = p.remove_scene(&SceneId::new("a")).unwrap();
        assert_eq!(removed.id.0, "a");
        assert!(p.assets.get(&SceneId::new("a")).is_none());
        assert!(p.remove_scene(&SceneId::new("missing")).is_none());
    }

    #[test]
    fn test_json_round_trip_keeps_asset_map() {
        let p = sample();
        let json = serde_json::to_string(&p).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back.assets_for(&SceneId::new("a")).len(), 1);
        assert_eq!(back.scenes.len(), 2);
    }

    #[test]
    fn test_fit_narration_only_lengthens() {
        let mut p = Project::new("talky");
        p.add_scene(Scene::new("long", 0, 60_000).with_text("short"));
        p.add_scene(
            Scene::new("short", 1, 500).with_subtitle("one two three four five six seven eight"),
        );
        let changed = p.fit_narration(&WordRateEstimator::default());
        assert_eq!(changed, 1);
        assert_eq!(p.scenes[0].duration_ms, 60_000);
        assert!(p.scenes[1].duration_ms > 500);
    }
}
