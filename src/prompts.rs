//! The instruction text sent to the cleanup model with every image.
//!
//! Centralised here so changing the default behaviour requires editing
//! exactly one place, and so tests can inspect the prompt without a live
//! service. Callers override it via
//! [`crate::config::AssemblyConfig::cleanup_prompt`]; the constant is used
//! only when no override is provided.

/// Default instruction for cleaning one photographed document page.
///
/// The model must answer with an image part only; any text answer is treated
/// as a failure by the response parser.
pub const DEFAULT_CLEANUP_PROMPT: &str = r#"You are restoring a photograph of a paper document into a clean scan.

Follow these rules precisely:

1. GEOMETRY
   - Correct the perspective so the page appears flat and viewed straight-on
   - Deskew the text lines to horizontal
   - Crop to the document edges, removing the desk or background around it

2. LIGHTING
   - Remove shadows, lighting gradients and glare
   - Whiten the paper background to a uniform near-white

3. CONTENT
   - Preserve all text, ink, stamps and signatures exactly as photographed
   - Do not add, remove, sharpen or "improve" any content
   - Keep the original colours of ink and images on the page

4. OUTPUT
   - Return ONLY the cleaned document image
   - Do NOT reply with text, commentary or explanations"#;
