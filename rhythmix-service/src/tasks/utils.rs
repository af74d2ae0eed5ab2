/// Strip a Markdown code fence the model may have wrapped around JSON
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    unfenced.strip_suffix("```").unwrap_or(unfenced).trim()
}
