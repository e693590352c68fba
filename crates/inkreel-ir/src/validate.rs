use std::collections::HashSet;

use inkreel_core::InkreelError;

use crate::project::{Project, Storyboard};
use crate::scene::MIN_SCENE_DURATION_MS;

/// Validate a project for structural correctness.
pub fn validate_project(project: &Project) -> Result<(), Vec<InkreelError>> {
    let mut errors = match validate_storyboard(&project.storyboard()) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    // Assets must belong to a scene that exists.
    let scene_ids: HashSet<_> = project.scenes.iter().map(|s| &s.id).collect();
    let mut orphans: Vec<_> = project
        .assets
        .iter()
        .filter(|(scene, assets)| !assets.is_empty() && !scene_ids.contains(scene))
        .map(|(scene, _)| scene)
        .collect();
    orphans.sort();
    for scene in orphans {
        errors.push(InkreelError::validation(format!(
            "assets reference unknown scene '{}'",
            scene
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the render input: scene list, durations, and asset parameters.
pub fn validate_storyboard(board: &Storyboard) -> Result<(), Vec<InkreelError>> {
    let mut errors = Vec::new();

    if board.scenes.is_empty() {
        errors.push(InkreelError::validation(
            "project must have at least one scene",
        ));
    }

    let mut scene_ids = HashSet::new();
    let mut order_keys = HashSet::new();
    for scene in &board.scenes {
        if !scene_ids.insert(&scene.id) {
            errors.push(InkreelError::validation(format!(
                "duplicate scene id: {}",
                scene.id
            )));
        }
        if !order_keys.insert(scene.order_index) {
            errors.push(InkreelError::validation(format!(
                "scene '{}' reuses order index {}",
                scene.id, scene.order_index
            )));
        }
        if scene.duration_ms < MIN_SCENE_DURATION_MS {
            errors.push(InkreelError::validation(format!(
                "scene '{}' lasts {}ms; minimum is {}ms",
                scene.id, scene.duration_ms, MIN_SCENE_DURATION_MS
            )));
        }
        if !(scene.speech_rate.is_finite() && scene.speech_rate > 0.0) {
            errors.push(InkreelError::validation(format!(
                "scene '{}' has non-positive speech rate",
                scene.id
            )));
        }

        let mut asset_ids = HashSet::new();
        for asset in board.assets_for(&scene.id) {
            if !asset_ids.insert(&asset.id) {
                errors.push(InkreelError::validation(format!(
                    "duplicate asset id '{}' in scene '{}'",
                    asset.id, scene.id
                )));
            }
            if !(asset.scale.is_finite() && asset.scale > 0.0) {
                errors.push(InkreelError::validation(format!(
                    "asset '{}' in scene '{}' has non-positive scale",
                    asset.id, scene.id
                )));
            }
            if !(asset.offset_x.is_finite() && asset.offset_y.is_finite()) {
                errors.push(InkreelError::validation(format!(
                    "asset '{}' in scene '{}' has a non-finite offset",
                    asset.id, scene.id
                )));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetSource, PositionedAsset};
    use crate::scene::{Scene, SceneId};

    #[test]
    fn test_validate_empty_project() {
        assert!(validate_project(&Project::new("empty")).is_err());
    }

    #[test]
    fn test_validate_valid_project() {
        let mut p = Project::new("ok");
        p.add_scene(Scene::new("a", 0, 2_000).with_text("Hello"));
        p.add_asset(
            &SceneId::new("a"),
            PositionedAsset::new("pen", AssetSource::Builtin("pen".into())),
        );
        assert!(validate_project(&p).is_ok());
    }

    #[test]
    fn test_validate_short_and_duplicate_scenes() {
        let mut p = Project::new("bad");
        p.add_scene(Scene::new("a", 0, 100));
        p.add_scene(Scene::new("a", 0, 1_000));
        let errors = validate_project(&p).unwrap_err();
        let text: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert!(text.iter().any(|e| e.contains("minimum")));
        assert!(text.iter().any(|e| e.contains("duplicate scene id")));
        assert!(text.iter().any(|e| e.contains("order index")));
    }

    #[test]
    fn test_validate_bad_asset_scale_and_orphans() {
        let mut p = Project::new("assets");
        p.add_scene(Scene::new("a", 0, 1_000));
        p.add_asset(
            &SceneId::new("a"),
            PositionedAsset::new("zero", AssetSource::Builtin("pen".into())).with_scale(0.0),
        );
        p.add_asset(
            &SceneId::new("ghost"),
            PositionedAsset::new("lost", AssetSource::Builtin("pen".into())),
        );
        let errors = validate_project(&p).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("non-positive scale"));
        assert!(errors[1].to_string().contains("ghost"));
    }
}
