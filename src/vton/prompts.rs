//! Prompt templates. These are data: the constraints they spell out (identity
//! preservation, garment-only focus, Turkish localization, monochrome output)
//! matter, the exact wording does not.

use super::ProductContext;

pub const MODEL_ANALYSIS: &str = "\
Describe the person in this image so an image generator can reproduce them faithfully.

Cover only:
1. Physical identity: gender, ethnicity, skin tone, approximate age, face shape and body type (slim, athletic, curvy, ...).
2. Hair: color, length, texture and style.
3. Pose: stance, head angle, gaze direction and body rotation.
4. Hands: where they are, if visible.

Rules:
- Do NOT describe the clothing. Ignore the outfit entirely.
- No introductions such as \"Here is the description\".
- Answer with one concise, comma-separated descriptive string.";

const GARMENT_ANALYSIS: &str = "\
You are a technical fashion designer. Describe the garment in this image for an image-generation prompt.

Cover only:
1. Type and fit: exact category (cropped hoodie, maxi dress, ...), silhouette and cut.
2. Fabric and texture: material, surface finish and weight.
3. Neckline and sleeves.
4. Details: prints, patterns, embroidery, buttons, zippers, pockets, seams.
5. Color: precise names (\"crimson red\", not \"red\").";

const GARMENT_RULES: &str = "\
Rules:
- Do NOT describe the background, hanger or whoever is wearing it.
- No introductions such as \"Here is the description\".
- Answer with one concise, comma-separated descriptive string.";

const GHOST_ANALYSIS: &str = "\
You are a technical fashion designer and product photographer. Describe ONLY the garment in this image so it can be recreated on an invisible ghost mannequin.

Cover only:
1. Fabric and drape: exact material, weight and how it folds.
2. Construction: seams, stitching, hem finish.
3. Neckline and hardware: collar, zippers, buttons, drawstrings.
4. Silhouette: fit and sleeve style.
5. Color: precise shade (\"heather grey\", not \"grey\").";

const GHOST_RULES: &str = "\
Rules:
- IGNORE the person: skin, hair, face and hands.
- IGNORE the background and any props.
- No introductions such as \"The image shows\".
- Answer with one concise, comma-separated string of descriptive keywords.";

pub const FABRIC_MACRO: &str = "\
Generate a high-resolution fabric texture close-up for an online product page, recreating the material of the provided product image.

Show gentle, authentic micro-folds and soft waves, as if the fabric were lightly gathered during a studio macro shoot. Keep the waves subtle and true to how this material behaves; no dramatic draping.

The whole frame must be sharp: no blur, no depth of field, no soft gradients, edge-to-edge clarity.

Use neutral, even lighting that reveals weave, fibers and surface relief without harsh shadows. Colors and structure must stay true to the original product.

The result should read as a premium e-commerce textile macro: realistic micro-folds, natural volume, full-frame sharpness and a trustworthy material representation.";

pub const SIZE_CHART_TR: &str = "\
Create a clean, minimalist, premium black-and-white size chart for a women's fashion store, based on the provided size chart image. Rewrite ALL text in Turkish. Never include product, model or fabric codes. Keep the same measurement categories but redesign the layout in a modern, balanced style: a table with clear borders, evenly spaced columns for S-M, L-XL and 2XL-3XL, and aligned rows labeled \"Boy\", \"Göğüs\", \"Bel\", \"Etek Ucu\", \"Kol Boyu\". On the right, draw a simplified female silhouette with numbered measurement markers (1-5) matching the table rows. Every number and label must be Turkish. Use only black, white and grey; no color allowed. Keep every generation consistent: monochrome, editorial, highly legible typography, perfectly aligned, no decoration, no gradients, no shadows. Always follow this exact layout and never add extra information.";

pub fn garment_analysis(fabric_hint: Option<&str>) -> String {
    let mut prompt = GARMENT_ANALYSIS.to_string();
    if let Some(hint) = non_blank(fabric_hint) {
        prompt.push_str(&format!(
            "\n\nOperator fabric note: {hint}. Use it to sharpen the material and texture description."
        ));
    }
    prompt.push_str("\n\n");
    prompt.push_str(GARMENT_RULES);
    prompt
}

pub fn ghost_analysis(context: &ProductContext, fabric_hint: Option<&str>) -> String {
    let mut prompt = GHOST_ANALYSIS.to_string();
    if let Some(hint) = non_blank(fabric_hint) {
        prompt.push_str(&format!(
            "\n\nOperator fabric note: {hint}. Use it to sharpen the fabric and drape description."
        ));
    }
    prompt.push_str(&format!(
        "\n\nProduct name: {}\nProduct category: {}\n\n",
        context.title, context.category
    ));
    prompt.push_str(GHOST_RULES);
    prompt
}

pub fn regular_tryon(
    model_description: &str,
    garment_description: &str,
    context: &ProductContext,
) -> String {
    format!(
        "Professional editorial fashion photography. The exact same model from image 1 wearing a \
{garment_description}. Model description: {model_description}.

Identity:
- Keep the facial features, bone structure and expression of the model in image 1.
- Keep the camera angle, background and environment of image 1.
- Do not alter face shape, eye color or skin texture.

Rendering:
- The garment fits naturally with realistic fabric physics, folds and drape.
- High-fidelity texture, studio lighting, sharp focus, photorealistic.
- Accurate body proportions, realistic hands, natural pose.

Context:
- Product name: {title}
- Product type: {category}",
        title = context.title,
        category = context.category,
    )
}

pub fn ghost_mannequin(garment_description: &str) -> String {
    format!(
        "Professional studio product photography of a {garment_description}. Invisible ghost \
mannequin effect: the garment is worn by an invisible form, with realistic 3D volume, folds and \
drape, as if floating. Show only the clean inner fabric through the neck opening. Background: pure, \
seamless flat white. Lighting: soft and even, highlighting the fabric texture. View: front, centered. \
No visible mannequin, no hangers, no human models, no neck labels, no brand tags."
    )
}

/// The fixed macro prompt, with an optional fabric clause appended.
pub fn fabric_macro(fabric_hint: Option<&str>) -> String {
    match non_blank(fabric_hint) {
        Some(hint) => format!(
            "{FABRIC_MACRO}\n\nFabric type: {hint}. Reflect this material's real texture in the macro shot."
        ),
        None => FABRIC_MACRO.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
