//! Order assembly from cart contents and live catalog prices.

use common::UserId;
use domain::{OrderItem, ProductId};

use crate::error::SagaError;
use crate::services::{CartReader, Catalog, CatalogError};

/// Items ready to be placed as one order.
#[derive(Debug, Clone)]
pub struct AssembledOrder {
    pub buyer_id: UserId,
    pub items: Vec<OrderItem>,
    /// Requested products left out because the catalog no longer lists them.
    pub skipped: Vec<ProductId>,
}

/// Builds order items from the requested cart lines.
///
/// Prices are looked up once here and frozen into the items. With a single
/// requested product a missing catalog entry fails the call; with several,
/// the missing line is skipped so the rest can still be ordered.
pub struct OrderAssembler<C, P> {
    cart: C,
    catalog: P,
}

impl<C, P> OrderAssembler<C, P>
where
    C: CartReader,
    P: Catalog,
{
    pub fn new(cart: C, catalog: P) -> Self {
        Self { cart, catalog }
    }

    pub fn cart(&self) -> &C {
        &self.cart
    }

    #[tracing::instrument(skip(self, product_ids), fields(requested = product_ids.len()))]
    pub async fn assemble(
        &self,
        buyer_id: UserId,
        product_ids: &[ProductId],
    ) -> Result<AssembledOrder, SagaError> {
        let cart = self
            .cart
            .get_cart(buyer_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(SagaError::EmptyCart)?;

        let lines: Vec<_> = cart
            .lines
            .into_iter()
            .filter(|line| product_ids.contains(&line.product_id))
            .collect();
        if lines.is_empty() {
            return Err(SagaError::NoMatchingCartLines);
        }

        let single = product_ids.len() == 1;
        let mut items = Vec::with_capacity(lines.len());
        let mut skipped = Vec::new();

        for line in lines {
            let price = match self.catalog.get_product_price(&line.product_id).await {
                Ok(price) => price,
                Err(CatalogError::ProductNotFound(product_id)) if !single => {
                    tracing::warn!(%product_id, "product no longer listed; skipping cart line");
                    skipped.push(product_id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            items.push(OrderItem::new(
                line.product_id,
                line.seller_id,
                line.product_name,
                line.quantity,
                price,
            ));
        }

        if items.is_empty() {
            return Err(SagaError::NothingToOrder);
        }

        Ok(AssembledOrder {
            buyer_id,
            items,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{CartLine, InMemoryCartStore, InMemoryCatalog};
    use common::ErrorKind;
    use domain::{ItemStatus, Money};

    struct Fixture {
        assembler: OrderAssembler<InMemoryCartStore, InMemoryCatalog>,
        catalog: InMemoryCatalog,
        buyer: UserId,
    }

    async fn fixture() -> Fixture {
        let carts = InMemoryCartStore::new();
        let catalog = InMemoryCatalog::new();
        let buyer = UserId::new();
        let seller_a = UserId::new();
        let seller_b = UserId::new();

        carts
            .add_line(buyer, CartLine::new("p1", seller_a, "Lamp", 2))
            .await;
        carts
            .add_line(buyer, CartLine::new("p2", seller_b, "Mug", 1))
            .await;
        carts
            .add_line(buyer, CartLine::new("p3", seller_b, "Plate", 4))
            .await;
        catalog.set_price("p1", Money::from_dollars(50)).await;
        catalog.set_price("p2", Money::from_dollars(30)).await;
        catalog.set_price("p3", Money::from_dollars(5)).await;

        Fixture {
            assembler: OrderAssembler::new(carts, catalog.clone()),
            catalog,
            buyer,
        }
    }

    fn ids(ids: &[&str]) -> Vec<ProductId> {
        ids.iter().copied().map(ProductId::new).collect()
    }

    #[tokio::test]
    async fn assembles_only_requested_lines() {
        let f = fixture().await;

        let assembled = f
            .assembler
            .assemble(f.buyer, &ids(&["p1", "p2"]))
            .await
            .unwrap();

        assert_eq!(assembled.items.len(), 2);
        let total: Money = assembled.items.iter().map(OrderItem::total_price).sum();
        assert_eq!(total, Money::from_dollars(130));
        assert!(
            assembled
                .items
                .iter()
                .all(|i| i.active && i.status == ItemStatus::Requested)
        );
    }

    #[tokio::test]
    async fn price_is_snapshotted_from_catalog() {
        let f = fixture().await;
        f.catalog.set_price("p1", Money::from_dollars(45)).await;

        let assembled = f.assembler.assemble(f.buyer, &ids(&["p1"])).await.unwrap();

        assert_eq!(assembled.items[0].unit_price, Money::from_dollars(45));
    }

    #[tokio::test]
    async fn empty_or_absent_cart_is_not_found() {
        let f = fixture().await;

        let err = f
            .assembler
            .assemble(UserId::new(), &ids(&["p1"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::EmptyCart));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn no_matching_lines_is_not_found() {
        let f = fixture().await;

        let err = f
            .assembler
            .assemble(f.buyer, &ids(&["p7", "p8"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::NoMatchingCartLines));
    }

    #[tokio::test]
    async fn single_product_missing_from_catalog_fails() {
        let f = fixture().await;
        f.catalog.remove_product(&ProductId::new("p2")).await;

        let err = f
            .assembler
            .assemble(f.buyer, &ids(&["p2"]))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn batch_skips_missing_products() {
        let f = fixture().await;
        f.catalog.remove_product(&ProductId::new("p2")).await;

        let assembled = f
            .assembler
            .assemble(f.buyer, &ids(&["p1", "p2", "p3"]))
            .await
            .unwrap();

        assert_eq!(assembled.items.len(), 2);
        assert_eq!(assembled.skipped, ids(&["p2"]));
    }

    #[tokio::test]
    async fn batch_with_nothing_orderable_fails() {
        let f = fixture().await;
        f.catalog.remove_product(&ProductId::new("p1")).await;
        f.catalog.remove_product(&ProductId::new("p2")).await;

        let err = f
            .assembler
            .assemble(f.buyer, &ids(&["p1", "p2"]))
            .await
            .unwrap_err();

        assert!(matches!(err, SagaError::NothingToOrder));
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
    }
}
