//! `createOrder` and `document` (receipt) nodes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::context::{Context, ContextPatch, ContextValue};
use crate::executors::cart::read_cart;
use crate::executors::keys;
use crate::services::{DocumentRenderer, Order, OrderMetadata, OrderService};
use crate::text::{format_money, render_template};
use crate::traits::{parse_config, NodeExecutor, NodeResult};
use crate::{NodeError, OutboundMessage, ServiceError};

/// First non-empty text among several accepted variable names.
fn first_text(ctx: &Context, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| ctx.text(name))
        .map(|value| value.trim().to_owned())
        .find(|value| !value.is_empty())
}

/// Collect order metadata from the variables earlier nodes captured.
pub fn order_metadata(ctx: &Context) -> OrderMetadata {
    OrderMetadata {
        phone: ctx.text(keys::PHONE).unwrap_or_default(),
        customer_name: first_text(ctx, &["nombre", "name", "customer_name"]),
        address: first_text(ctx, &["direccion", "address"]),
        payment_method: first_text(ctx, &["payment_method", "metodo_pago", "pago"]),
        slot_id: first_text(ctx, &[keys::SLOT_ID]),
        slot_label: first_text(ctx, &[keys::SLOT_LABEL]),
        notes: first_text(ctx, &["notas", "notes"]),
    }
}

// ---------------------------------------------------------------------------
// createOrder
// ---------------------------------------------------------------------------

pub struct CreateOrderExecutor {
    orders: Arc<dyn OrderService>,
}

impl CreateOrderExecutor {
    pub fn new(orders: Arc<dyn OrderService>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl NodeExecutor for CreateOrderExecutor {
    async fn execute(&self, _config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cart = read_cart(ctx);
        if cart.is_empty() {
            return Ok(NodeResult::advance()
                .with_text("Tu carrito está vacío, no se pudo crear el pedido."));
        }

        let metadata = order_metadata(ctx);
        let order = match self.orders.create_order(&cart, &metadata).await {
            Ok(order) => order,
            Err(ServiceError::SlotUnavailable(slot)) => {
                warn!(%slot, "order rejected: slot no longer available");
                return Ok(NodeResult::advance()
                    .with_text("⚠️ El horario elegido ya no está disponible. Elegí otro horario e intentá de nuevo.")
                    .with_patch(ContextPatch::new().with(keys::ORDER_ERROR, "slot_unavailable")));
            }
            Err(e) => {
                error!(error = %e, phone = %metadata.phone, "order creation failed");
                return Ok(NodeResult::advance()
                    .with_text("⚠️ No pudimos registrar tu pedido. Intentá nuevamente en unos minutos.")
                    .with_patch(ContextPatch::new().with(keys::ORDER_ERROR, "failed")));
            }
        };

        info!(order_id = %order.id, total = order.total, "order created");

        let assignee = match self.orders.auto_assign_order(&order.id).await {
            Ok(assignee) => assignee,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "auto-assignment failed");
                None
            }
        };

        let mut confirmation = format!(
            "✅ ¡Pedido #{} confirmado! Total: {}",
            order.id,
            format_money(order.total)
        );
        if let Some(label) = &metadata.slot_label {
            confirmation.push_str(&format!("\nEntrega: {label}"));
        }

        let mut result = NodeResult::advance().with_text(confirmation);
        if let Some(assignee) = assignee {
            result = result.with_text(format!("🛵 Tu pedido fue asignado a {assignee}."));
        }

        let patch = ContextPatch::new()
            .with(keys::ORDER_ID, order.id.clone())
            .with(keys::ORDER_TOTAL, order.total)
            .with(keys::ORDER, ContextValue::structured(&order)?)
            .without(keys::CART)
            .without(keys::CART_TOTAL)
            .without(keys::ORDER_ERROR);

        Ok(result.with_patch(patch))
    }
}

// ---------------------------------------------------------------------------
// document
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentConfig {
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

/// Renders the last order's receipt and sends it as a document.
pub struct DocumentExecutor {
    renderer: Arc<dyn DocumentRenderer>,
}

impl DocumentExecutor {
    pub fn new(renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl NodeExecutor for DocumentExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: DocumentConfig = parse_config(config)?;
        let Some(order) = ctx.structured::<Order>(keys::ORDER) else {
            return Ok(NodeResult::advance().with_text("No hay un pedido para generar el comprobante."));
        };

        match self.renderer.generate_receipt(&order).await {
            Ok(bytes) => {
                let file_name = cfg
                    .file_name
                    .map(|name| render_template(&name, ctx))
                    .unwrap_or_else(|| format!("pedido-{}.pdf", order.id));
                let caption = cfg.caption.map(|c| render_template(&c, ctx));
                Ok(NodeResult::advance().with_message(OutboundMessage::Document {
                    file_name,
                    mime_type: "application/pdf".into(),
                    bytes,
                    caption,
                }))
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "receipt rendering failed");
                Ok(NodeResult::advance().with_text("No pudimos generar el comprobante."))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{sample_products, MemoryOrders, StaticCatalog, TextReceiptRenderer};
    use crate::services::CartItem;
    use serde_json::json;

    fn cart_context() -> Context {
        let mut ctx = Context::new();
        ctx.insert(keys::PHONE, "5491155550000");
        ctx.insert("nombre", "Lucas");
        ctx.insert("direccion", "Calle 123");
        let cart = vec![CartItem {
            product_id: "p-manzana".into(),
            name: "Manzana".into(),
            quantity: 2.0,
            price: 2.5,
        }];
        ctx.insert(keys::CART, ContextValue::structured(&cart).unwrap());
        ctx
    }

    fn orders() -> Arc<MemoryOrders> {
        Arc::new(MemoryOrders::new(Arc::new(StaticCatalog::new(sample_products()))))
    }

    #[test]
    fn metadata_is_collected_from_aliases() {
        let meta = order_metadata(&cart_context());
        assert_eq!(meta.phone, "5491155550000");
        assert_eq!(meta.customer_name.as_deref(), Some("Lucas"));
        assert_eq!(meta.address.as_deref(), Some("Calle 123"));
        assert_eq!(meta.slot_id, None);
    }

    #[tokio::test]
    async fn creates_order_and_clears_cart() {
        let orders = MemoryOrders::new(Arc::new(StaticCatalog::new(sample_products())))
            .with_assignee("Repartidor 1");
        let executor = CreateOrderExecutor::new(Arc::new(orders));
        let mut ctx = cart_context();

        let result = executor.execute(&json!({}), &ctx).await.unwrap();
        ctx.apply(&result.updated_context);

        assert!(!ctx.contains(keys::CART));
        assert!(ctx.contains(keys::ORDER_ID));
        assert_eq!(ctx.number(keys::ORDER_TOTAL), Some(5.0));
        let text = OutboundMessage::join_text(&result.messages);
        assert!(text.contains("confirmado"));
        assert!(text.contains("Repartidor 1"));
    }

    #[tokio::test]
    async fn failure_is_reported_without_error() {
        let orders = orders();
        orders.fail_next_create(ServiceError::Failed("db down".into()));
        let executor = CreateOrderExecutor::new(orders);
        let mut ctx = cart_context();

        let result = executor.execute(&json!({}), &ctx).await.unwrap();
        ctx.apply(&result.updated_context);

        assert!(ctx.contains(keys::CART), "cart is kept for a retry");
        assert_eq!(ctx.text(keys::ORDER_ERROR).as_deref(), Some("failed"));
        assert!(OutboundMessage::join_text(&result.messages).contains("No pudimos registrar"));
    }

    #[tokio::test]
    async fn empty_cart_does_not_call_order_service() {
        let orders = orders();
        let executor = CreateOrderExecutor::new(orders.clone());
        let result = executor.execute(&json!({}), &Context::new()).await.unwrap();
        assert_eq!(orders.created().len(), 0);
        assert_eq!(result.messages.len(), 1);
    }

    #[tokio::test]
    async fn document_sends_rendered_receipt() {
        let orders = orders();
        let mut ctx = cart_context();
        let created = CreateOrderExecutor::new(orders)
            .execute(&json!({}), &ctx)
            .await
            .unwrap();
        ctx.apply(&created.updated_context);

        let result = DocumentExecutor::new(Arc::new(TextReceiptRenderer))
            .execute(&json!({ "caption": "Gracias {{nombre}}" }), &ctx)
            .await
            .unwrap();

        match &result.messages[..] {
            [OutboundMessage::Document { file_name, mime_type, bytes, caption }] => {
                assert!(file_name.starts_with("pedido-"));
                assert_eq!(mime_type, "application/pdf");
                assert!(!bytes.is_empty());
                assert_eq!(caption.as_deref(), Some("Gracias Lucas"));
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }
}
