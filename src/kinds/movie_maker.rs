//! Trip movie maker: upload clips, edit title and style, preview and render.

use crate::collaborator::Generator;
use crate::wizard::{Draft, WizardKind};
use anyhow::{ensure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const MEDIA: &str = "media";
pub const TITLE: &str = "title";
pub const TEMPLATE: &str = "template";
pub const MUSIC: &str = "music";

pub const MIN_MEDIA: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieStep {
    Upload,
    Edit,
    Preview,
}

const STEPS: &[MovieStep] = &[MovieStep::Upload, MovieStep::Edit, MovieStep::Preview];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    Cinematic,
    Vlog,
    Slideshow,
}

impl Template {
    pub fn seconds_per_clip(self) -> u32 {
        match self {
            Template::Cinematic => 4,
            Template::Vlog => 3,
            Template::Slideshow => 5,
        }
    }
}

/// Media entries are opaque references; only their count matters here.
pub fn media_count(draft: &Draft) -> usize {
    match draft.get(MEDIA) {
        Some(serde_json::Value::Array(items)) => items.len(),
        _ => 0,
    }
}

fn title(draft: &Draft) -> Option<&str> {
    draft.text(TITLE).map(str::trim).filter(|t| !t.is_empty())
}

fn template(draft: &Draft) -> Option<Template> {
    draft.parse(TEMPLATE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedVideo {
    pub video_ref: String,
    pub duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub title: String,
    pub template: Template,
    pub music: Option<String>,
    pub clip_count: usize,
    pub duration_secs: u32,
    pub video_ref: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MovieMaker;

impl WizardKind for MovieMaker {
    type Step = MovieStep;
    type Generated = RenderedVideo;
    type Output = VideoDescriptor;

    fn name(&self) -> &'static str {
        "movie-maker"
    }

    fn steps(&self) -> &'static [MovieStep] {
        STEPS
    }

    fn can_advance(&self, step: MovieStep, draft: &Draft) -> bool {
        match step {
            MovieStep::Upload => media_count(draft) >= MIN_MEDIA,
            MovieStep::Edit => title(draft).is_some() && template(draft).is_some(),
            MovieStep::Preview => {
                media_count(draft) >= MIN_MEDIA
                    && title(draft).is_some()
                    && template(draft).is_some()
            }
        }
    }

    fn initial_draft(&self) -> Draft {
        Draft::new()
            .with_field(MEDIA, serde_json::json!([]))
            .with_field(TITLE, "Jejak Nusantara")
            .with_field(TEMPLATE, "cinematic")
    }

    fn commit(&self, draft: &Draft, video: RenderedVideo) -> VideoDescriptor {
        VideoDescriptor {
            title: title(draft).unwrap_or_default().to_string(),
            template: template(draft).unwrap_or(Template::Cinematic),
            music: draft
                .text(MUSIC)
                .filter(|m| !m.trim().is_empty())
                .map(str::to_string),
            clip_count: media_count(draft),
            duration_secs: video.duration_secs,
            video_ref: video.video_ref,
        }
    }

    fn summarize(&self, video: &VideoDescriptor) -> Vec<String> {
        let mut lines = vec![
            format!("Video: {} ({:?})", video.title, video.template),
            format!(
                "Clips: {}  Duration: {}s",
                video.clip_count, video.duration_secs
            ),
        ];
        if let Some(music) = video.music.as_deref() {
            lines.push(format!("Music: {music}"));
        }
        lines.push(format!("Output: {}", video.video_ref));
        lines
    }
}

/// Built-in renderer producing a descriptor instead of real footage.
#[derive(Debug, Default, Clone, Copy)]
pub struct MovieRenderer;

#[async_trait]
impl Generator<RenderedVideo> for MovieRenderer {
    async fn generate(&self, draft: &Draft) -> Result<RenderedVideo> {
        let clips = media_count(draft);
        ensure!(clips >= MIN_MEDIA, "at least {MIN_MEDIA} media items are required");
        let template = template(draft).unwrap_or(Template::Cinematic);
        let slug: String = title(draft)
            .unwrap_or("trip")
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        Ok(RenderedVideo {
            video_ref: format!("video://{slug}-{clips}clips.mp4"),
            duration_secs: clips as u32 * template.seconds_per_clip(),
        })
    }
}
