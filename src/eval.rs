//! Per-frame evaluation of a scene, shared by the preview and the offline
//! renderer. Pure: the same scene, track and time always give the same state.

use crate::animation::{compute_transform, AnimatedTransform};
use crate::captions::CaptionTrack;
use crate::graph::RenderScene;
use serde::Serialize;

/// One visual layer at an instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerState {
    /// Index into `RenderScene::assets`
    pub asset_index: usize,
    pub transform: AnimatedTransform,
}

/// Everything needed to paint a scene at `local_time`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameState {
    pub local_time: f64,
    /// Visible layers, in paint order
    pub layers: Vec<LayerState>,
    pub caption_entry: Option<usize>,
    pub highlighted_word: Option<usize>,
}

impl FrameState {
    pub fn is_blank(&self) -> bool {
        self.layers.is_empty() && self.caption_entry.is_none()
    }
}

pub fn evaluate_scene(scene: &RenderScene, track: &CaptionTrack, local_time: f64) -> FrameState {
    let layers = scene
        .assets
        .iter()
        .enumerate()
        .filter(|(_, asset)| asset.is_visual())
        .map(|(asset_index, asset)| LayerState {
            asset_index,
            transform: compute_transform(asset, local_time, scene.duration),
        })
        .filter(|layer| layer.transform.is_visible())
        .collect();

    FrameState {
        local_time,
        layers,
        caption_entry: track.active_entry(local_time),
        highlighted_word: track.active_word(local_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationType;
    use crate::graph::{Asset, AssetKind, SceneGraphBuilder};
    use crate::project::SceneRecord;

    fn scene_with(assets: Vec<Asset>) -> RenderScene {
        let mut scene = SceneGraphBuilder::new("http://localhost:3001")
            .build_scene(&SceneRecord::new("s1", "hello world", 10.0));
        scene.assets = assets;
        scene
    }

    #[test]
    fn test_layers_in_paint_order() {
        let bg = Asset {
            animation_type: AnimationType::None,
            ..Asset::new("bg", AssetKind::Image, "bg.png")
        };
        let fg = Asset {
            z_index: 2,
            ..Asset::new("fg", AssetKind::Image, "fg.png")
        };
        let scene = scene_with(vec![bg, fg]);
        let track = CaptionTrack::default();

        // fadeIn has opacity 0 at t=0, so only the background shows
        let state = evaluate_scene(&scene, &track, 0.0);
        assert_eq!(state.layers.len(), 1);
        assert_eq!(state.layers[0].asset_index, 0);

        let state = evaluate_scene(&scene, &track, 2.0);
        let order: Vec<_> = state.layers.iter().map(|l| l.asset_index).collect();
        assert_eq!(order, vec![0, 1]);
        assert_eq!(state.layers[1].transform.opacity, 1.0);
    }

    #[test]
    fn test_caption_highlight() {
        let scene = scene_with(vec![]);
        let track = CaptionTrack::from_srt("1\n00:00:00,000 --> 00:00:10,000\nhello world\n");

        let state = evaluate_scene(&scene, &track, 7.0);
        assert_eq!(state.caption_entry, Some(0));
        assert_eq!(state.highlighted_word, Some(2));
        assert_eq!(track.words()[2].text, "world");
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let scene = scene_with(vec![Asset {
            animation_type: AnimationType::KenBurns,
            ..Asset::new("a", AssetKind::Video, "clip.mp4")
        }]);
        let track = CaptionTrack::from_plain_text(&scene.text, scene.duration);
        for t in [0.0, 0.33, 4.2, 9.99] {
            assert_eq!(
                evaluate_scene(&scene, &track, t),
                evaluate_scene(&scene, &track, t)
            );
        }
    }

    #[test]
    fn test_blank_frame() {
        let scene = scene_with(vec![]);
        let state = evaluate_scene(&scene, &CaptionTrack::default(), 1.0);
        assert!(state.is_blank());
        assert_eq!(state.highlighted_word, None);
    }
}
