//! This module provides a service for rendering templates using the minijinja
//! templating engine.

use minijinja::Environment;
use thiserror::Error;

/// A service for rendering message templates.
pub struct TemplateService {
    env: Environment<'static>,
}

/// Error type for the TemplateService.
#[derive(Debug, Error)]
pub enum TemplateServiceError {
    /// An error occurred while compiling or rendering the template.
    #[error("Failed to render template: {0}")]
    RenderError(#[from] minijinja::Error),
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateService {
    /// Creates a new instance with strict undefined handling, so a template
    /// referring to an unknown variable fails instead of rendering blanks.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        Self { env }
    }

    /// Renders a template with the given context.
    pub fn render(
        &self,
        template_str: &str,
        context: serde_json::Value,
    ) -> Result<String, TemplateServiceError> {
        match self.env.render_str(template_str, context) {
            Ok(rendered_string) => Ok(rendered_string),
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}", template_str, e);
                Err(TemplateServiceError::RenderError(e))
            }
        }
    }

    /// Checks that a template compiles.
    pub fn validate(&self, template_str: &str) -> Result<(), TemplateServiceError> {
        self.env.template_from_str(template_str)?;
        Ok(())
    }
}
