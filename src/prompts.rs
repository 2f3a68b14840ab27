//! Instructions sent to the model for each stage.
//!
//! Every prompt lives here so a wording change touches exactly one place and
//! unit tests can inspect the prompts without a model.
//!
//! The OCR prompt asks for a single flowing German paragraph per page rather
//! than a layout-faithful transcription: downstream translation works
//! paragraph by paragraph, and headers, footers and captions are noise for it.

/// OCR instruction: read a scanned German page and restate it as one paragraph.
pub const OCR_PROMPT: &str = "You are an expert OCR tool. Analyze the provided image and express its content following these rules:
1. Read and understand all the text content on the page.
2. Rewrite the entire page's content as a single, flowing paragraph in German.
3. Make minimal adjustments to connect ideas smoothly while keeping the original meaning.
4. Maintain all technical information, facts, and key points accurately.
5. Exclude headers, footers, page numbers, and image captions.
6. Keep the technical terminology exactly as written.
7. Output only the final paragraph without any additional text or commentary.
8. Focus on creating a natural flow while preserving the original German content.";

/// German → English instruction. The source text follows in the user turn
/// between `---` delimiters.
pub const GERMAN_TO_ENGLISH_PROMPT: &str = "Translate the following German paragraph to English. Rules:
1. Maintain technical accuracy and terminology
2. Keep the same flowing, paragraph style
3. Preserve all technical information
4. Output only the English translation, no additional text";

/// English → Urdu instruction. The source text follows in the user turn
/// between `---` delimiters.
pub const ENGLISH_TO_URDU_PROMPT: &str = "Translate the following English paragraph into Urdu.
Rules:
1. Maintain full meaning and accuracy.
2. Use fluent, natural Urdu, not transliteration.
3. Keep the paragraph format same as original.
4. Output only the Urdu translation, no additional comments.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_prompt_asks_for_german_paragraph() {
        assert!(OCR_PROMPT.contains("single, flowing paragraph in German"));
        assert!(OCR_PROMPT.contains("Exclude headers, footers"));
    }

    #[test]
    fn translation_prompts_forbid_commentary() {
        assert!(GERMAN_TO_ENGLISH_PROMPT.contains("Output only the English translation"));
        assert!(ENGLISH_TO_URDU_PROMPT.contains("Output only the Urdu translation"));
    }
}
