use serde::{Deserialize, Serialize};

/// Smallest total the financing provider will accept, in minor units ($50).
///
/// Checked before any provider interaction so an undersized cart never burns
/// a checkout attempt the provider would reject anyway.
pub const MIN_FINANCEABLE_MINOR: i64 = 5_000;

/// A single cart row as handed over by the storefront cart store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Stable SKU-like key, unique within the cart.
    pub id: String,
    /// Display name shown to the buyer.
    pub name: String,
    /// Unit price in minor units.
    pub unit_price_minor: i64,
    pub quantity: i64,
    /// Product page URL, absolute or relative to the merchant origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartLineItem {
    /// Build a row from the major-unit price a storefront cart holds.
    pub fn from_major(id: impl Into<String>, name: impl Into<String>, price: f64, quantity: i64) -> Self {
        CartLineItem {
            id: id.into(),
            name: name.into(),
            unit_price_minor: crate::money::to_minor_units(price),
            quantity,
            url: None,
            image_url: None,
        }
    }

    /// Whether the row may be admitted into a checkout payload.
    pub fn is_chargeable(&self) -> bool {
        self.unit_price_minor > 0 && self.quantity > 0
    }

    pub fn subtotal_minor(&self) -> i64 {
        self.unit_price_minor * self.quantity
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("no chargeable items left in cart")]
    EmptyCart,
    #[error("cart total of {total_minor} cents is below the {minimum_minor} cent minimum")]
    BelowMinimum { total_minor: i64, minimum_minor: i64 },
}

/// Immutable, validated view of a cart at the moment checkout starts.
///
/// The volatile cart store is untrusted; every invariant the checkout flow
/// relies on (chargeable rows only, non-empty, above the financeable floor)
/// is enforced here, once, at construction.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    items: Vec<CartLineItem>,
    shipping_minor: i64,
    tax_minor: i64,
}

impl CartSnapshot {
    /// Validate raw cart rows into a snapshot.
    ///
    /// Rows with a non-positive price or quantity are dropped, not coerced.
    pub fn build(
        raw_items: Vec<CartLineItem>,
        shipping_minor: i64,
        tax_minor: i64,
    ) -> Result<Self, SnapshotError> {
        let items: Vec<CartLineItem> = raw_items
            .into_iter()
            .filter(CartLineItem::is_chargeable)
            .collect();

        if items.is_empty() {
            return Err(SnapshotError::EmptyCart);
        }

        let snapshot = CartSnapshot {
            items,
            shipping_minor: shipping_minor.max(0),
            tax_minor: tax_minor.max(0),
        };

        let total_minor = snapshot.total_minor();
        if total_minor < MIN_FINANCEABLE_MINOR {
            return Err(SnapshotError::BelowMinimum {
                total_minor,
                minimum_minor: MIN_FINANCEABLE_MINOR,
            });
        }

        Ok(snapshot)
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    pub fn shipping_minor(&self) -> i64 {
        self.shipping_minor
    }

    pub fn tax_minor(&self) -> i64 {
        self.tax_minor
    }

    pub fn subtotal_minor(&self) -> i64 {
        self.items.iter().map(CartLineItem::subtotal_minor).sum()
    }

    /// The exact amount transmitted to the provider: item sum + shipping + tax.
    pub fn total_minor(&self) -> i64 {
        self.subtotal_minor() + self.shipping_minor + self.tax_minor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, unit_price_minor: i64, quantity: i64) -> CartLineItem {
        CartLineItem {
            id: id.to_string(),
            name: format!("Item {id}"),
            unit_price_minor,
            quantity,
            url: None,
            image_url: None,
        }
    }

    #[test]
    fn from_major_normalizes_the_price() {
        let row = CartLineItem::from_major("BIKE-01", "Trail Bike", 1499.999, 1);
        assert_eq!(row.unit_price_minor, 150_000);
        assert!(row.is_chargeable());

        let bad = CartLineItem::from_major("BAD-01", "Broken", f64::NAN, 1);
        assert!(!bad.is_chargeable());
    }

    #[test]
    fn drops_non_chargeable_rows() {
        let snapshot = CartSnapshot::build(
            vec![item("a", 10_000, 1), item("b", 0, 3), item("c", 500, 0)],
            0,
            0,
        )
        .unwrap();

        assert_eq!(snapshot.items().len(), 1);
        assert_eq!(snapshot.items()[0].id, "a");
    }

    #[test]
    fn empty_after_filtering_is_rejected() {
        let err = CartSnapshot::build(vec![item("a", 0, 1)], 0, 0).unwrap_err();
        assert!(matches!(err, SnapshotError::EmptyCart));

        let err = CartSnapshot::build(vec![], 100, 100).unwrap_err();
        assert!(matches!(err, SnapshotError::EmptyCart));
    }

    #[test]
    fn below_minimum_is_rejected_before_any_provider_work() {
        let err = CartSnapshot::build(vec![item("a", 1_000, 2)], 500, 0).unwrap_err();
        match err {
            SnapshotError::BelowMinimum {
                total_minor,
                minimum_minor,
            } => {
                assert_eq!(total_minor, 2_500);
                assert_eq!(minimum_minor, MIN_FINANCEABLE_MINOR);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn total_is_item_sum_plus_shipping_plus_tax() {
        let snapshot = CartSnapshot::build(
            vec![item("a", 2_000, 2), item("b", 1_500, 1)],
            750,
            425,
        )
        .unwrap();

        assert_eq!(snapshot.subtotal_minor(), 5_500);
        assert_eq!(snapshot.total_minor(), 6_675);
    }

    #[test]
    fn negative_shipping_and_tax_clamp_to_zero() {
        let snapshot = CartSnapshot::build(vec![item("a", 10_000, 1)], -500, -1).unwrap();
        assert_eq!(snapshot.total_minor(), 10_000);
    }
}
