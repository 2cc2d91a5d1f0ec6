//! Document Renderer
//!
//! Two independent paths over the same [`DocumentModel`]: the thermal path
//! builds an ESC/POS byte stream in-process, the page path fills an HTML
//! template and rasterizes it through the shared rendering engine.

pub mod engine;
pub mod model;
pub mod pdf;
pub mod template;
pub mod thermal;

use print_common::PrintRole;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use engine::{ChromeEngine, RenderEngine};
pub use model::{generate_invoice_number, DocumentModel};
pub use pdf::PdfRenderer;
pub use template::{Template, TemplateError};
pub use thermal::{render_receipt, ThermalLayout};

/// Errors from either render path
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),

    #[error("no rendering engine available: {0}")]
    EngineUnavailable(String),

    #[error("rendering engine failed: {0}")]
    Engine(String),

    #[error("render timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("renderer is shut down")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TemplateError> for RenderError {
    fn from(err: TemplateError) -> Self {
        RenderError::Template(err.to_string())
    }
}

/// Compiled HTML templates, one per role
#[derive(Debug, Clone)]
pub struct Templates {
    receipt: Template,
    invoice: Template,
    service_note: Template,
    custom_note: Template,
}

impl Templates {
    /// Templates shipped with the service
    pub fn builtin() -> Result<Self, RenderError> {
        Ok(Self {
            receipt: Template::parse(include_str!("../../templates/receipt.html"))?,
            invoice: Template::parse(include_str!("../../templates/invoice.html"))?,
            service_note: Template::parse(include_str!("../../templates/service-note.html"))?,
            custom_note: Template::parse(include_str!("../../templates/custom-note.html"))?,
        })
    }

    pub fn for_role(&self, role: PrintRole) -> &Template {
        match role {
            PrintRole::Receipt => &self.receipt,
            PrintRole::Invoice => &self.invoice,
            PrintRole::ServiceNote => &self.service_note,
            PrintRole::CustomNote => &self.custom_note,
        }
    }
}

/// Both render paths behind one handle
#[derive(Clone)]
pub struct DocumentRenderer {
    templates: Templates,
    pdf: PdfRenderer,
    layout: ThermalLayout,
}

impl DocumentRenderer {
    pub fn new(templates: Templates, pdf: PdfRenderer, layout: ThermalLayout) -> Self {
        Self {
            templates,
            pdf,
            layout,
        }
    }

    /// ESC/POS bytes for a receipt
    pub fn render_thermal(&self, model: &DocumentModel) -> Vec<u8> {
        render_receipt(model, &self.layout)
    }

    /// Fill the role's HTML template without rasterizing it
    pub fn render_html(&self, model: &DocumentModel) -> Result<String, RenderError> {
        let data =
            serde_json::to_value(model).map_err(|e| RenderError::Template(e.to_string()))?;
        Ok(self.templates.for_role(model.role).render(&data))
    }

    /// Render the document to a PDF artifact and return its path.
    ///
    /// The caller owns the file.
    pub async fn render_pdf(&self, model: &DocumentModel) -> Result<PathBuf, RenderError> {
        let html = self.render_html(model)?;
        self.pdf.render_to_file(html).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_compile() {
        let templates = Templates::builtin().unwrap();
        for role in PrintRole::ALL {
            let html = templates.for_role(role).render(&serde_json::json!({}));
            assert!(html.contains("@page"));
        }
    }
}
