use crate::animation::{AnimationType, Easing};
use crate::error::StoryreelError;
use crate::project::Project;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Longest scene a project may declare, in seconds
pub const MAX_SCENE_DURATION: f64 = 24.0 * 60.0 * 60.0;

/// Loads project exports (scene records as stored) from JSON
pub struct ProjectParser;

impl ProjectParser {
    /// Parse a JSON project file
    pub fn parse_json(path: &Path) -> Result<Project> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project file: {}", path.display()))?;

        Self::parse_str(&content)
            .with_context(|| format!("Failed to load project: {}", path.display()))
    }

    pub fn parse_str(content: &str) -> Result<Project> {
        let mut project: Project =
            serde_json::from_str(content).context("Failed to parse project JSON")?;

        Self::validate_project(&project)?;

        // scenes without an explicit order keep their position, after ordered ones
        project
            .scenes
            .sort_by_key(|s| (s.order.is_none(), s.order.unwrap_or_default()));

        Ok(project)
    }

    /// Reject what cannot be rendered; warn about what will be defaulted
    fn validate_project(project: &Project) -> Result<()> {
        if project.scenes.is_empty() {
            return Err(
                StoryreelError::invalid_project("project must contain at least one scene").into(),
            );
        }

        let mut seen = HashSet::new();
        for (idx, scene) in project.scenes.iter().enumerate() {
            if scene.id.trim().is_empty() {
                return Err(
                    StoryreelError::invalid_project(format!("scene {} has empty ID", idx)).into(),
                );
            }
            if !(scene.duration.is_finite() && scene.duration > 0.0) {
                return Err(StoryreelError::invalid_project(format!(
                    "scene '{}' duration must be positive, got {}",
                    scene.id, scene.duration
                ))
                .into());
            }
            if scene.duration > MAX_SCENE_DURATION {
                return Err(StoryreelError::invalid_project(format!(
                    "scene '{}' duration {}s exceeds the {}s limit",
                    scene.id, scene.duration, MAX_SCENE_DURATION
                ))
                .into());
            }
            if !seen.insert(scene.id.as_str()) {
                warn!(scene = %scene.id, "duplicate scene id");
            }

            for asset in scene.assets.iter().flatten() {
                if asset.url.trim().is_empty() {
                    warn!(
                        scene = %scene.id,
                        asset = %asset.id,
                        "asset has no url, it will render as a placeholder"
                    );
                }
                if let Some(name) = asset.animation_type.as_deref() {
                    if !AnimationType::is_known(name) {
                        warn!(
                            scene = %scene.id,
                            asset = %asset.id,
                            animation = name,
                            "unknown animation type, asset will not animate"
                        );
                    }
                }
                if let Some(name) = asset.animation_easing.as_deref() {
                    if !Easing::is_known(name) {
                        warn!(
                            scene = %scene.id,
                            asset = %asset.id,
                            easing = name,
                            "unknown easing, using linear"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Get a summary of the project structure
    pub fn summarize(project: &Project) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("Project: {}\n", project.id));
        if let Some(title) = &project.title {
            summary.push_str(&format!("Title: {}\n", title));
        }
        let total: f64 = project.scenes.iter().map(|s| s.duration).sum();
        summary.push_str(&format!("Duration: {:.2}s\n", total));
        summary.push_str(&format!("Scenes: {}\n", project.scenes.len()));

        for (idx, scene) in project.scenes.iter().enumerate() {
            let mut extras = Vec::new();
            if scene.captions_url.is_some() {
                extras.push("captions");
            }
            if scene.asset_count() == 0 && scene.media_url.is_some() {
                extras.push("legacy media");
            }
            summary.push_str(&format!(
                "  Scene {}: '{}' ({:.2}s, {} assets{})\n",
                idx + 1,
                scene.id,
                scene.duration,
                scene.asset_count(),
                if extras.is_empty() {
                    String::new()
                } else {
                    format!(", {}", extras.join(", "))
                }
            ));
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = r#"
    {
        "_id": "p1",
        "title": "Ocean facts",
        "scenes": [
            {
                "id": "s2",
                "text": "Second",
                "duration": 3.0,
                "order": 1,
                "assets": [{"id": "a1", "type": "image", "url": "images/wave.png"}]
            },
            {
                "id": "s1",
                "text": "First",
                "duration": 5.0,
                "order": 0,
                "captionsUrl": "/storage/captions/s1.srt",
                "mediaUrl": "clips/intro.mp4"
            }
        ]
    }
    "#;

    #[test]
    fn test_parse_valid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let project = ProjectParser::parse_json(file.path()).unwrap();
        assert_eq!(project.id, "p1");
        let ids: Vec<_> = project.scenes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_unordered_scenes_keep_position() {
        let json = r#"{"id": "p", "scenes": [
            {"id": "x", "duration": 1},
            {"id": "y", "duration": 1, "order": 5},
            {"id": "z", "duration": 1}
        ]}"#;
        let project = ProjectParser::parse_str(json).unwrap();
        let ids: Vec<_> = project.scenes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x", "z"]);
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = ProjectParser::parse_str(r#"{"id": "p", "scenes": []}"#);
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoryreelError>(),
            Some(StoryreelError::InvalidProject(_))
        ));
    }

    #[test]
    fn test_validate_scene_duration() {
        let json = r#"{"id": "p", "scenes": [{"id": "s1", "duration": 0}]}"#;
        let err = ProjectParser::parse_str(json).unwrap_err();
        assert!(err.to_string().contains("duration must be positive"));

        let json = r#"{"id": "p", "scenes": [{"id": "s1", "duration": 1e300}]}"#;
        let err = ProjectParser::parse_str(json).unwrap_err();
        assert!(err.to_string().contains("exceeds"));

        let json = r#"{"id": "p", "scenes": [{"id": "", "duration": 2}]}"#;
        assert!(ProjectParser::parse_str(json).is_err());
    }

    #[test]
    fn test_unknown_animation_is_not_fatal() {
        let json = r#"{"id": "p", "scenes": [{"id": "s1", "duration": 2, "assets": [
            {"id": "a", "type": "image", "url": "", "animationType": "wobble", "animationEasing": "bouncy"}
        ]}]}"#;
        assert!(ProjectParser::parse_str(json).is_ok());
    }

    #[test]
    fn test_summarize() {
        let project = ProjectParser::parse_str(VALID).unwrap();
        let summary = ProjectParser::summarize(&project);
        assert!(summary.contains("Ocean facts"));
        assert!(summary.contains("Duration: 8.00s"));
        assert!(summary.contains("Scene 1: 's1' (5.00s, 0 assets, captions, legacy media)"));
        assert!(summary.contains("Scene 2: 's2' (3.00s, 1 assets)"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let result = ProjectParser::parse_json(Path::new("/nonexistent/file.json"));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read project file"));
    }
}
