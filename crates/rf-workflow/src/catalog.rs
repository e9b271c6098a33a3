//! Static registry of step definitions for the media-generation pipeline.
//!
//! The catalog is pure data: each entry carries its 1-based ordinal, unique
//! name, declared prerequisites, and a duration estimate. Dependencies are
//! informational -- execution runs strictly sequentially by `step_id` and
//! never gates on them.

/// Immutable definition of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    /// 1-based position in the execution order.
    pub step_id: i64,
    /// Unique key used in the database and executor registry.
    pub step_name: &'static str,
    /// Human-readable name for reports.
    pub display_name: &'static str,
    /// One-line description of the work performed.
    pub description: &'static str,
    /// Names of steps whose output this step consumes. Informational only.
    pub dependencies: &'static [&'static str],
    /// Rough wall-clock estimate used by the dry-run report and ETA fallback.
    pub estimated_duration_secs: u64,
    /// Project subdirectory this step writes its artifacts into.
    pub output_dir: &'static str,
}

/// The fixed step sequence producing one output video.
const STEPS: &[StepDefinition] = &[
    StepDefinition {
        step_id: 1,
        step_name: "script_generation",
        display_name: "Script Generation",
        description: "Generate the narration script from the project theme",
        dependencies: &[],
        estimated_duration_secs: 120,
        output_dir: "scripts",
    },
    StepDefinition {
        step_id: 2,
        step_name: "voice_synthesis",
        display_name: "Voice Synthesis",
        description: "Synthesize narration audio from the script",
        dependencies: &["script_generation"],
        estimated_duration_secs: 180,
        output_dir: "audio",
    },
    StepDefinition {
        step_id: 3,
        step_name: "image_generation",
        display_name: "Image Generation",
        description: "Generate scene images for each script segment",
        dependencies: &["script_generation"],
        estimated_duration_secs: 240,
        output_dir: "images",
    },
    StepDefinition {
        step_id: 4,
        step_name: "subtitle_generation",
        display_name: "Subtitle Generation",
        description: "Produce subtitle tracks aligned to the narration",
        dependencies: &["voice_synthesis"],
        estimated_duration_secs: 60,
        output_dir: "subtitles",
    },
    StepDefinition {
        step_id: 5,
        step_name: "video_assembly",
        display_name: "Video Assembly",
        description: "Encode images, audio, and subtitles into the final video",
        dependencies: &["voice_synthesis", "image_generation"],
        estimated_duration_secs: 300,
        output_dir: "video",
    },
    StepDefinition {
        step_id: 6,
        step_name: "thumbnail_generation",
        display_name: "Thumbnail Generation",
        description: "Render a thumbnail image for the finished video",
        dependencies: &["image_generation"],
        estimated_duration_secs: 45,
        output_dir: "metadata",
    },
    StepDefinition {
        step_id: 7,
        step_name: "metadata_export",
        display_name: "Metadata Export",
        description: "Write title, description, and tags for publishing",
        dependencies: &["video_assembly"],
        estimated_duration_secs: 30,
        output_dir: "metadata",
    },
];

/// Read-only lookup over the step definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepCatalog;

impl StepCatalog {
    /// All definitions sorted ascending by `step_id`.
    pub fn all(&self) -> Vec<StepDefinition> {
        let mut steps: Vec<StepDefinition> = STEPS.to_vec();
        steps.sort_by_key(|s| s.step_id);
        steps
    }

    /// Look up one definition by name.
    pub fn by_name(&self, step_name: &str) -> Option<StepDefinition> {
        STEPS.iter().find(|s| s.step_name == step_name).cloned()
    }

    /// Look up one definition by ordinal.
    pub fn by_id(&self, step_id: i64) -> Option<StepDefinition> {
        STEPS.iter().find(|s| s.step_id == step_id).cloned()
    }

    /// Number of steps in the catalog.
    pub fn len(&self) -> usize {
        STEPS.len()
    }

    /// Whether the catalog is empty. Always false for the built-in catalog.
    pub fn is_empty(&self) -> bool {
        STEPS.is_empty()
    }
}
