use anyhow::{anyhow, bail};
use mrml::prelude::render::RenderOptions;
use tracing::warn;

/// How structural warnings in the markup are treated. The enqueue side is
/// soft (a slightly off template still goes out); the worker is strict
/// because a malformed queued message must fail loudly there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Soft,
    Strict,
}

/// Compiles MJML markup to final HTML.
pub fn compile_mjml(markup: &str, level: ValidationLevel) -> anyhow::Result<String> {
    let parsed = mrml::parse(markup).map_err(|e| anyhow!("mjml parse error: {e}"))?;

    if !parsed.warnings.is_empty() {
        match level {
            ValidationLevel::Strict => {
                bail!("mjml document has {} structural warnings", parsed.warnings.len())
            }
            ValidationLevel::Soft => {
                for warning in &parsed.warnings {
                    warn!(warning = ?warning, "mjml structural warning");
                }
            }
        }
    }

    parsed
        .element
        .render(&RenderOptions::default())
        .map_err(|e| anyhow!("mjml render error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str =
        "<mjml><mj-body><mj-section><mj-column><mj-text>Hello</mj-text></mj-column></mj-section></mj-body></mjml>";

    #[test]
    fn valid_document_compiles_to_html() {
        let html = compile_mjml(VALID, ValidationLevel::Strict).unwrap();
        assert!(html.contains("Hello"));
        assert!(html.contains("<html"));
    }

    #[test]
    fn unparseable_markup_fails_under_both_levels() {
        assert!(compile_mjml("not mjml at all", ValidationLevel::Soft).is_err());
        assert!(compile_mjml("not mjml at all", ValidationLevel::Strict).is_err());
    }
}
