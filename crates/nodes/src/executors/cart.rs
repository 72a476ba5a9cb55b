//! Stock lookup and cart handling: `stockCheck`, `addToCart`, `orderSummary`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::context::{Context, ContextPatch, ContextValue};
use crate::executors::keys;
use crate::services::{cart_total, CartItem, CatalogService};
use crate::text::{format_money, format_quantity, parse_quantity_and_term, render_template};
use crate::traits::{parse_config, InputOutcome, NodeExecutor, NodeResult};
use crate::{NodeError, OutboundMessage};

/// Outcome of a stock lookup, stored under `_stock_result` until
/// `addToCart` consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockResult {
    pub found: bool,
    pub available: bool,
    pub product_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub requested: f64,
    pub stock: Option<f64>,
}

/// Read the cart from the context; a missing or malformed cart is empty.
pub fn read_cart(ctx: &Context) -> Vec<CartItem> {
    ctx.structured(keys::CART).unwrap_or_default()
}

/// `• 2 x Manzana - $5.00` lines.
pub fn render_cart_lines(cart: &[CartItem]) -> String {
    cart.iter()
        .map(|item| {
            format!(
                "• {} x {} - {}",
                format_quantity(item.quantity),
                item.name,
                format_money(item.subtotal())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// stockCheck
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct StockCheckConfig {
    #[serde(default)]
    text: Option<String>,
}

pub struct StockCheckExecutor {
    catalog: Arc<dyn CatalogService>,
}

impl StockCheckExecutor {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl NodeExecutor for StockCheckExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: StockCheckConfig = parse_config(config)?;
        let prompt = cfg
            .text
            .as_deref()
            .unwrap_or("¿Qué producto y cuántas unidades querés? (ej: 2 manzanas)");
        Ok(NodeResult::wait().with_text(render_template(prompt, ctx)))
    }

    async fn capture_input(
        &self,
        _config: &Value,
        input: &str,
        _ctx: &Context,
    ) -> Result<InputOutcome, NodeError> {
        let (quantity, term) = parse_quantity_and_term(input);
        let product = self.catalog.find_product(&term).await?;
        debug!(%term, quantity, found = product.is_some(), "stock lookup");

        let (result, reply) = match product {
            Some(p) => {
                let available = p.has_stock_for(quantity);
                let reply = if available {
                    format!("✅ Tenemos {} ({} c/u).", p.name, format_money(p.price))
                } else {
                    format!(
                        "❌ Solo quedan {} unidades de {}.",
                        format_quantity(p.stock.unwrap_or_default()),
                        p.name
                    )
                };
                let result = StockResult {
                    found: true,
                    available,
                    product_id: Some(p.id),
                    name: p.name,
                    price: p.price,
                    requested: quantity,
                    stock: p.stock,
                };
                (result, reply)
            }
            None => {
                let reply = format!("❌ No encontré \"{term}\" en el catálogo.");
                let result = StockResult {
                    found: false,
                    available: false,
                    product_id: None,
                    name: term,
                    price: 0.0,
                    requested: quantity,
                    stock: None,
                };
                (result, reply)
            }
        };

        let patch = ContextPatch::new()
            .with(keys::STOCK_AVAILABLE, result.available)
            .with(keys::QUANTITY, quantity)
            .with(keys::STOCK_RESULT, ContextValue::structured(&result)?);

        Ok(InputOutcome::Advance {
            patch,
            messages: vec![OutboundMessage::text(reply)],
        })
    }
}

// ---------------------------------------------------------------------------
// addToCart
// ---------------------------------------------------------------------------

/// Appends the last stock lookup to the cart and clears the scratch keys.
pub struct AddToCartExecutor;

#[async_trait]
impl NodeExecutor for AddToCartExecutor {
    async fn execute(&self, _config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let mut patch = ContextPatch::new()
            .without(keys::STOCK_RESULT)
            .without(keys::QUANTITY);

        let stock: Option<StockResult> = ctx.structured(keys::STOCK_RESULT);
        let line = stock.filter(|s| s.found && s.available).and_then(|s| {
            let quantity = ctx.number(keys::QUANTITY).unwrap_or(s.requested);
            s.product_id.map(|product_id| CartItem {
                product_id,
                name: s.name,
                quantity,
                price: s.price,
            })
        });

        let Some(line) = line else {
            return Ok(NodeResult::advance()
                .with_text("No se pudo agregar el producto al carrito.")
                .with_patch(patch));
        };

        let mut cart = read_cart(ctx);
        let added = format!("🛒 Agregado: {} x {}", format_quantity(line.quantity), line.name);
        cart.push(line);
        let total = cart_total(&cart);

        patch.set(keys::CART, ContextValue::structured(&cart)?);
        patch.set(keys::CART_TOTAL, total);

        Ok(NodeResult::advance()
            .with_text(format!("{added}. Total: {}", format_money(total)))
            .with_patch(patch))
    }
}

// ---------------------------------------------------------------------------
// orderSummary
// ---------------------------------------------------------------------------

pub struct OrderSummaryExecutor;

#[async_trait]
impl NodeExecutor for OrderSummaryExecutor {
    async fn execute(&self, _config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cart = read_cart(ctx);
        if cart.is_empty() {
            return Ok(NodeResult::advance().with_text("Tu carrito está vacío."));
        }

        let text = format!(
            "🧾 *Resumen de tu pedido*\n{}\n\n*Total: {}*",
            render_cart_lines(&cart),
            format_money(cart_total(&cart))
        );
        Ok(NodeResult::advance().with_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{sample_products, StaticCatalog};
    use serde_json::json;

    fn stock_check() -> StockCheckExecutor {
        StockCheckExecutor::new(Arc::new(StaticCatalog::new(sample_products())))
    }

    async fn check(ctx: &mut Context, input: &str) {
        match stock_check().capture_input(&json!({}), input, ctx).await.unwrap() {
            InputOutcome::Advance { patch, .. } => ctx.apply(&patch),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stock_check_writes_structured_result() {
        let mut ctx = Context::new();
        check(&mut ctx, "3 manzanas").await;

        let result: StockResult = ctx.structured(keys::STOCK_RESULT).unwrap();
        assert!(result.found && result.available);
        assert_eq!(result.name, "Manzana");
        assert_eq!(ctx.number(keys::QUANTITY), Some(3.0));
        assert_eq!(ctx.get(keys::STOCK_AVAILABLE), Some(&ContextValue::Bool(true)));
    }

    #[tokio::test]
    async fn stock_check_reports_shortage() {
        let mut ctx = Context::new();
        check(&mut ctx, "50 pan").await;
        let result: StockResult = ctx.structured(keys::STOCK_RESULT).unwrap();
        assert!(result.found);
        assert!(!result.available);
    }

    #[tokio::test]
    async fn add_to_cart_appends_line_totals_and_clears_scratch() {
        let mut ctx = Context::new();

        check(&mut ctx, "2 manzanas").await;
        let first = AddToCartExecutor.execute(&json!({}), &ctx).await.unwrap();
        ctx.apply(&first.updated_context);

        check(&mut ctx, "3 leche").await;
        let second = AddToCartExecutor.execute(&json!({}), &ctx).await.unwrap();
        ctx.apply(&second.updated_context);

        assert!(!ctx.contains(keys::STOCK_RESULT));
        assert!(!ctx.contains(keys::QUANTITY));

        let cart = read_cart(&ctx);
        assert_eq!(cart.len(), 2);
        let expected: f64 = cart.iter().map(|i| i.price * i.quantity).sum();
        assert_eq!(ctx.number(keys::CART_TOTAL), Some(expected));
        assert_eq!(expected, 2.0 * 2.5 + 3.0 * 3.0);
    }

    #[tokio::test]
    async fn add_to_cart_without_stock_result_only_clears() {
        let mut ctx = Context::new();
        ctx.insert(keys::QUANTITY, 2.0);
        let result = AddToCartExecutor.execute(&json!({}), &ctx).await.unwrap();
        ctx.apply(&result.updated_context);

        assert!(!ctx.contains(keys::QUANTITY));
        assert!(!ctx.contains(keys::CART));
        assert!(!result.wait_for_input);
    }

    #[tokio::test]
    async fn summary_lists_lines_and_total() {
        let mut ctx = Context::new();
        let cart = vec![CartItem {
            product_id: "p1".into(),
            name: "Manzana".into(),
            quantity: 2.0,
            price: 2.5,
        }];
        ctx.insert(keys::CART, ContextValue::structured(&cart).unwrap());

        let result = OrderSummaryExecutor.execute(&json!({}), &ctx).await.unwrap();
        let text = OutboundMessage::join_text(&result.messages);
        assert!(text.contains("• 2 x Manzana - $5.00"));
        assert!(text.contains("*Total: $5.00*"));
    }
}
