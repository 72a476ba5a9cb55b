//! `report`: files a claim/report with the captured context.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::context::{Context, ContextPatch};
use crate::executors::keys;
use crate::services::{Report, ReportService};
use crate::text::render_template;
use crate::traits::{parse_config, NodeExecutor, NodeResult};
use crate::NodeError;

#[derive(Debug, Default, Deserialize)]
struct ReportConfig {
    #[serde(default)]
    category: Option<String>,
    /// Variable holding the description the correspondent wrote.
    #[serde(default)]
    variable: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

pub struct ReportExecutor {
    reports: Arc<dyn ReportService>,
}

impl ReportExecutor {
    pub fn new(reports: Arc<dyn ReportService>) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl NodeExecutor for ReportExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: ReportConfig = parse_config(config)?;
        let report = Report {
            phone: ctx.text(keys::PHONE).unwrap_or_default(),
            category: cfg.category.unwrap_or_else(|| "reclamo".into()),
            description: ctx
                .text(cfg.variable.as_deref().unwrap_or("descripcion"))
                .unwrap_or_default(),
            context: ctx.without_transient().to_json(),
        };

        match self.reports.create_report(&report).await {
            Ok(id) => {
                info!(report_id = %id, category = %report.category, "report created");
                let patch = ContextPatch::new().with(keys::REPORT_ID, id);

                let mut rendered = ctx.clone();
                rendered.apply(&patch);
                let text = cfg
                    .text
                    .as_deref()
                    .unwrap_or("📝 Registramos tu reclamo #{{report_id}}. Te contactaremos pronto.");

                Ok(NodeResult::advance()
                    .with_text(render_template(text, &rendered))
                    .with_patch(patch))
            }
            Err(e) => {
                warn!(error = %e, "report creation failed");
                Ok(NodeResult::advance().with_text("No pudimos registrar tu reclamo. Intentá más tarde."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingReports;
    use crate::OutboundMessage;
    use serde_json::json;

    #[tokio::test]
    async fn files_report_with_context_snapshot() {
        let reports = Arc::new(RecordingReports::default());
        let mut ctx = Context::new();
        ctx.insert(keys::PHONE, "549111");
        ctx.insert("detalle", "llegó frío");
        ctx.insert("_scratch", "x");

        let result = ReportExecutor::new(reports.clone())
            .execute(&json!({ "category": "calidad", "variable": "detalle" }), &ctx)
            .await
            .unwrap();

        let filed = reports.reports();
        assert_eq!(filed.len(), 1);
        assert_eq!(filed[0].category, "calidad");
        assert_eq!(filed[0].description, "llegó frío");
        assert!(filed[0].context.get("_scratch").is_none());

        assert_eq!(
            result.updated_context.get(keys::REPORT_ID),
            Some(Some(&"R-1".into()))
        );
        assert!(OutboundMessage::join_text(&result.messages).contains("#R-1"));
    }
}
