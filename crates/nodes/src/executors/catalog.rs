//! `catalog`: product listing grouped by category; the answer is parsed
//! into a cart.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::context::{Context, ContextPatch, ContextValue};
use crate::executors::keys;
use crate::services::{cart_total, CatalogService, OrderService, Product};
use crate::text::{format_money, format_quantity, render_template};
use crate::traits::{parse_config, InputOutcome, NodeExecutor, NodeResult};
use crate::{NodeError, OutboundMessage};

const DEFAULT_HEADER: &str = "🛒 *Catálogo*";
const DEFAULT_FOOTER: &str = "Escribí tu pedido, por ejemplo: 2 manzanas, 1 leche";
const UNCATEGORIZED: &str = "Otros";

#[derive(Debug, Default, Deserialize)]
struct CatalogConfig {
    #[serde(default)]
    header: Option<String>,
    #[serde(default)]
    footer: Option<String>,
}

pub struct CatalogExecutor {
    catalog: Arc<dyn CatalogService>,
    orders: Arc<dyn OrderService>,
}

impl CatalogExecutor {
    pub fn new(catalog: Arc<dyn CatalogService>, orders: Arc<dyn OrderService>) -> Self {
        Self { catalog, orders }
    }
}

/// Group products by category, keeping the catalog's order of first
/// appearance for both categories and products.
fn group_by_category(products: &[Product]) -> Vec<(&str, Vec<&Product>)> {
    let mut groups: Vec<(&str, Vec<&Product>)> = Vec::new();
    for product in products {
        let category = product.category.as_deref().unwrap_or(UNCATEGORIZED);
        match groups.iter_mut().find(|(name, _)| *name == category) {
            Some((_, items)) => items.push(product),
            None => groups.push((category, vec![product])),
        }
    }
    groups
}

fn render_catalog(header: &str, footer: &str, products: &[Product]) -> String {
    let mut out = String::from(header);
    for (category, items) in group_by_category(products) {
        out.push_str(&format!("\n\n*{category}*"));
        for product in items {
            out.push_str(&format!("\n• {} - {}", product.name, format_money(product.price)));
        }
    }
    if !footer.is_empty() {
        out.push_str("\n\n");
        out.push_str(footer);
    }
    out
}

#[async_trait]
impl NodeExecutor for CatalogExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: CatalogConfig = parse_config(config)?;
        let products = self.catalog.get_products().await?;

        if products.is_empty() {
            return Ok(NodeResult::advance().with_text("No hay productos disponibles en este momento."));
        }

        let header = render_template(cfg.header.as_deref().unwrap_or(DEFAULT_HEADER), ctx);
        let footer = cfg.footer.as_deref().unwrap_or(DEFAULT_FOOTER);
        debug!(products = products.len(), "rendering catalog");

        Ok(NodeResult::wait().with_text(render_catalog(&header, footer, &products)))
    }

    async fn capture_input(
        &self,
        _config: &Value,
        input: &str,
        _ctx: &Context,
    ) -> Result<InputOutcome, NodeError> {
        let items = self.orders.parse_order_text(input).await?;
        if items.is_empty() {
            return Ok(InputOutcome::stay(
                "No encontré productos en tu mensaje. Probá con algo como: 2 manzanas, 1 leche",
            ));
        }

        let total = cart_total(&items);
        let lines: Vec<String> = items
            .iter()
            .map(|item| format!("{} x {}", format_quantity(item.quantity), item.name))
            .collect();

        let patch = ContextPatch::new()
            .with(keys::CART, ContextValue::structured(&items)?)
            .with(keys::CART_TOTAL, total);

        Ok(InputOutcome::Advance {
            patch,
            messages: vec![OutboundMessage::text(format!(
                "Anoté: {}. Total: {}",
                lines.join(", "),
                format_money(total)
            ))],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{sample_products, MemoryOrders, StaticCatalog};
    use crate::services::CartItem;
    use serde_json::json;

    fn executor() -> CatalogExecutor {
        let catalog = Arc::new(StaticCatalog::new(sample_products()));
        let orders = Arc::new(MemoryOrders::new(catalog.clone()));
        CatalogExecutor::new(catalog, orders)
    }

    #[tokio::test]
    async fn lists_products_grouped_by_category() {
        let result = executor().execute(&json!({}), &Context::new()).await.unwrap();
        assert!(result.wait_for_input);

        let text = OutboundMessage::join_text(&result.messages);
        assert!(text.starts_with(DEFAULT_HEADER));
        assert!(text.contains("*Frutas*\n• Manzana - $2.50\n• Banana - $1.80"));
        assert!(text.contains("*Lácteos*\n• Leche - $3.00"));
    }

    #[tokio::test]
    async fn free_text_becomes_a_cart() {
        let outcome = executor()
            .capture_input(&json!({}), "2 manzana, 1 leche", &Context::new())
            .await
            .unwrap();

        let InputOutcome::Advance { patch, .. } = outcome else {
            panic!("expected the order to be accepted");
        };
        let mut ctx = Context::new();
        ctx.apply(&patch);

        let cart: Vec<CartItem> = ctx.structured(keys::CART).unwrap();
        assert_eq!(cart.len(), 2);
        assert_eq!(ctx.number(keys::CART_TOTAL), Some(2.0 * 2.5 + 3.0));
    }

    #[tokio::test]
    async fn unparseable_text_keeps_waiting() {
        let outcome = executor()
            .capture_input(&json!({}), "qué tal", &Context::new())
            .await
            .unwrap();
        assert!(matches!(outcome, InputOutcome::Stay { .. }));
    }
}
