//! Closed behavior vocabulary.
//!
//! The analysis pipeline only ever emits labels from this set. The clinical
//! definitions below are used verbatim when building model prompts, and the
//! visual/audio partition backs modality inference for responses that omit it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether a behavior is observed in the video or heard on the audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Visual,
    Audio,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One of the 14 closed-vocabulary behavior labels (9 visual, 5 audio).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Behavior {
    // Visual
    BodyRocking,
    HandFlapping,
    Spinning,
    HeadBanging,
    ToeWalking,
    Jumping,
    CoveringEars,
    CoveringEyes,
    RepetitiveObjectPlay,
    // Audio
    Crying,
    Screaming,
    Laughing,
    Echolalia,
    Humming,
}

impl Behavior {
    /// Every label, visual first, in prompt order.
    pub const ALL: [Behavior; 14] = [
        Behavior::BodyRocking,
        Behavior::HandFlapping,
        Behavior::Spinning,
        Behavior::HeadBanging,
        Behavior::ToeWalking,
        Behavior::Jumping,
        Behavior::CoveringEars,
        Behavior::CoveringEyes,
        Behavior::RepetitiveObjectPlay,
        Behavior::Crying,
        Behavior::Screaming,
        Behavior::Laughing,
        Behavior::Echolalia,
        Behavior::Humming,
    ];

    /// The wire label, e.g. `body-rocking`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BodyRocking => "body-rocking",
            Self::HandFlapping => "hand-flapping",
            Self::Spinning => "spinning",
            Self::HeadBanging => "head-banging",
            Self::ToeWalking => "toe-walking",
            Self::Jumping => "jumping",
            Self::CoveringEars => "covering-ears",
            Self::CoveringEyes => "covering-eyes",
            Self::RepetitiveObjectPlay => "repetitive-object-play",
            Self::Crying => "crying",
            Self::Screaming => "screaming",
            Self::Laughing => "laughing",
            Self::Echolalia => "echolalia",
            Self::Humming => "humming",
        }
    }

    /// Which side of the visual/audio partition this label belongs to.
    pub fn modality(&self) -> Modality {
        match self {
            Self::BodyRocking
            | Self::HandFlapping
            | Self::Spinning
            | Self::HeadBanging
            | Self::ToeWalking
            | Self::Jumping
            | Self::CoveringEars
            | Self::CoveringEyes
            | Self::RepetitiveObjectPlay => Modality::Visual,
            Self::Crying | Self::Screaming | Self::Laughing | Self::Echolalia | Self::Humming => {
                Modality::Audio
            }
        }
    }

    /// One-sentence clinical definition, included verbatim in prompts.
    pub fn definition(&self) -> &'static str {
        match self {
            Self::BodyRocking => {
                "Rhythmic forward-and-back or side-to-side movement of the torso while seated or standing."
            }
            Self::HandFlapping => {
                "Rapid repetitive flapping or waving of the hands, typically at or above shoulder height."
            }
            Self::Spinning => "Turning the whole body in circles repeatedly without a play context.",
            Self::HeadBanging => {
                "Striking the head against a surface or object, or forceful repetitive head movement."
            }
            Self::ToeWalking => "Walking on the balls of the feet or toes without heel contact.",
            Self::Jumping => "Repeated jumping in place without an apparent play context.",
            Self::CoveringEars => {
                "Pressing the hands over the ears, with or without an evident sound trigger."
            }
            Self::CoveringEyes => "Shielding or pressing the hands over the eyes.",
            Self::RepetitiveObjectPlay => {
                "Manipulating an object in a repetitive, non-functional way such as lining up, spinning, or flicking it."
            }
            Self::Crying => "Audible crying or sobbing vocalization.",
            Self::Screaming => "Loud, high-pitched vocal outburst.",
            Self::Laughing => "Laughter without an apparent social trigger or context.",
            Self::Echolalia => {
                "Repetition of words or phrases previously heard, either immediate or delayed."
            }
            Self::Humming => "Sustained non-word vocalization such as humming or droning.",
        }
    }

    /// Parse a label as emitted by the model. Case-insensitive, whitespace
    /// trimmed; anything outside the closed vocabulary is `None`.
    pub fn from_label(label: &str) -> Option<Behavior> {
        let normalized = label.trim().to_lowercase();
        Behavior::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == normalized)
    }

    /// Labels on one side of the partition, in prompt order.
    pub fn with_modality(modality: Modality) -> impl Iterator<Item = Behavior> {
        Behavior::ALL
            .iter()
            .copied()
            .filter(move |b| b.modality() == modality)
    }
}

impl std::fmt::Display for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
