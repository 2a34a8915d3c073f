//! Mode prompt compiler
//!
//! Turns a [`GenerationRequest`] plus the current variation index and identity
//! reference into the ordered image list and instruction text for one call.
//! Compilation is pure: identical inputs always yield identical output.
//!
//! Image order per mode:
//!
//! | Mode | Images |
//! |---|---|
//! | `RE_POSE` | subject |
//! | `TRY_ON` | target person, outfit |
//! | `CREATE_MODEL` | outfit, identity reference (when present) |
//! | `COPY_CONCEPT` | concept source, identity source |

use crate::error::{AppError, Result};
use crate::orchestrator::types::{GenerationMode, GenerationRequest, IdentityReference, ImageRef};

/// Role an image plays in a compiled request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// Person to re-pose (RE_POSE primary)
    Subject,
    /// Person being dressed (TRY_ON primary)
    TargetPerson,
    /// Garment reference (TRY_ON secondary, CREATE_MODEL primary)
    Outfit,
    /// Earlier image of the same batch (CREATE_MODEL)
    Identity,
    /// Head and identity donor (COPY_CONCEPT primary)
    FaceSource,
    /// Composition, outfit and lighting donor (COPY_CONCEPT secondary)
    ConceptSource,
}

/// Image slot of a compiled request
#[derive(Debug, Clone, PartialEq)]
pub struct PromptImage<'a> {
    pub role: ImageRole,
    pub source: &'a ImageRef,
}

/// Output of [`compile`]
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPrompt<'a> {
    pub images: Vec<PromptImage<'a>>,
    pub instruction: String,
}

impl CompiledPrompt<'_> {
    pub fn roles(&self) -> Vec<ImageRole> {
        self.images.iter().map(|i| i.role).collect()
    }
}

pub const STYLE_BLOCK: &str = "STYLE REQUIREMENTS: The result must be a photorealistic photograph, \
indistinguishable from a real camera capture, with natural skin texture, true-to-life fabric \
detail and physically plausible lighting. Do NOT produce cartoon, anime, illustration, \
3D render, CGI, painting or any other non-photographic style.";

pub const DEFAULT_PERSONA: &str = "Use this model: an adult in their mid-twenties with a \
friendly, confident expression, natural makeup, shoulder-length dark brown hair, warm olive \
skin and a slim athletic build.";

/// Header that opens every variation directive
pub const VARIATION_HEADER: &str = "VARIATION";

pub const OVERRIDE_HEADER: &str = "ADDITIONAL USER INSTRUCTIONS";

/// Compile one generation call.
///
/// `variation_index` is zero-based; the directive text uses 1-based numbering.
/// `identity` is ignored by every mode except `CREATE_MODEL` without `random_face`.
pub fn compile<'a>(
    request: &'a GenerationRequest,
    variation_index: u32,
    identity: Option<&'a IdentityReference>,
) -> Result<CompiledPrompt<'a>> {
    let primary = request
        .primary_image
        .as_ref()
        .ok_or_else(|| missing(request.mode, "primary"))?;

    let mut sections = Vec::with_capacity(5);
    let images = match request.mode {
        GenerationMode::RePose => {
            sections.push(re_pose_instruction());
            vec![PromptImage {
                role: ImageRole::Subject,
                source: primary,
            }]
        }
        GenerationMode::TryOn => {
            let outfit = secondary(request)?;
            sections.push(try_on_instruction(pose_may_vary(request)));
            vec![
                PromptImage {
                    role: ImageRole::TargetPerson,
                    source: primary,
                },
                PromptImage {
                    role: ImageRole::Outfit,
                    source: outfit,
                },
            ]
        }
        GenerationMode::CreateModel => {
            let identity = identity.filter(|_| !request.random_face);
            sections.push(create_model_instruction(request.random_face, identity.is_some()));

            let mut images = vec![PromptImage {
                role: ImageRole::Outfit,
                source: primary,
            }];
            if let Some(identity) = identity {
                images.push(PromptImage {
                    role: ImageRole::Identity,
                    source: identity.image(),
                });
            }
            images
        }
        GenerationMode::CopyConcept => {
            let concept = secondary(request)?;
            sections.push(copy_concept_instruction());
            vec![
                PromptImage {
                    role: ImageRole::ConceptSource,
                    source: concept,
                },
                PromptImage {
                    role: ImageRole::FaceSource,
                    source: primary,
                },
            ]
        }
    };

    sections.push(STYLE_BLOCK.to_string());

    if request.batch_size > 1 {
        sections.push(variation_directive(variation_index, request.batch_size));
    }

    if let Some(text) = request.override_text() {
        sections.push(format!(
            "{}: {}\nThese take precedence over the guidance above where they conflict, \
             but every requirement above still applies.",
            OVERRIDE_HEADER, text
        ));
    }

    Ok(CompiledPrompt {
        images,
        instruction: sections.join("\n\n"),
    })
}

/// Pose may change in TRY_ON only when explicitly relaxed or when a batch needs variety
fn pose_may_vary(request: &GenerationRequest) -> bool {
    request.flexible_mode || request.batch_size > 1
}

fn secondary(request: &GenerationRequest) -> Result<&ImageRef> {
    request
        .secondary_image
        .as_ref()
        .ok_or_else(|| missing(request.mode, "secondary"))
}

fn missing(mode: GenerationMode, which: &str) -> AppError {
    AppError::InvalidRequest(format!("{} requires a {} image", mode, which))
}

fn re_pose_instruction() -> String {
    "TASK: Image 1 shows the subject. Generate a new photograph of exactly the same person in a \
     new pose that clearly differs from the original and does not duplicate it. Preserve the \
     face, hair, skin tone and the complete outfit without any change. Keep the environment, \
     background mood and overall vibe of the original photo."
        .to_string()
}

fn try_on_instruction(pose_may_vary: bool) -> String {
    let pose = if pose_may_vary {
        "The pose may change naturally to present the outfit well, while the person's identity \
         and the setting stay consistent."
    } else {
        "POSE LOCK: keep the exact pose, body position, framing and background of Image 1."
    };

    format!(
        "TASK: Image 1 shows the target person. Image 2 shows the outfit reference. Dress the \
         person from Image 1 in the outfit from Image 2, reproducing its garments, colours, \
         fabrics, patterns and fit faithfully. The person's identity is locked: face, hair, skin \
         tone and body shape stay unchanged. {}",
        pose
    )
}

fn create_model_instruction(random_face: bool, has_identity: bool) -> String {
    let face = if random_face {
        "FACE: give the model a unique, distinctive face that is not copied from any reference \
         or earlier image."
            .to_string()
    } else if has_identity {
        "FACE: Image 2 shows the model generated earlier in this set. It must be the same \
         person: match the face, hair, skin tone and body type of Image 2 exactly."
            .to_string()
    } else {
        format!("FACE: {}", DEFAULT_PERSONA)
    };

    format!(
        "TASK: Image 1 shows the outfit reference. Generate a photograph of a fashion model \
         wearing exactly this outfit, reproducing garments, colours, fabrics and fit faithfully, \
         in a clean professional fashion-shoot setting. {}",
        face
    )
}

fn copy_concept_instruction() -> String {
    "TASK: Image 1 is the concept reference (outfit, composition, scene and lighting). Image 2 is \
     the identity source. Recreate the photograph of Image 1 with the same outfit, composition, \
     background and lighting, but with the head and identity of the person in Image 2 (face, \
     hair, skin tone). The body pose follows Image 1; only micro-adjustments of the neck and \
     shoulders are allowed so the head attaches naturally. HEAD SIZE: keep the head proportional \
     to the body, never enlarged or shrunk."
        .to_string()
}

fn variation_directive(variation_index: u32, total: u32) -> String {
    let position = variation_index + 1;
    format!(
        "{} {} OF {}: this is image {} of {} in one set. Use a camera angle and a pose distinct \
         from every other image in the set; never repeat the same framing.",
        VARIATION_HEADER, position, total, position, total
    )
}
