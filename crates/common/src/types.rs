use serde::{Deserialize, Serialize};

/// Identifier of a persisted order.
///
/// Assigned by the order store on insert; never generated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    /// Wraps a raw store-assigned identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Store-assigned identifiers are always positive.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<OrderId> for i64 {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

/// Identifier of a stocked product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    /// Wraps a raw product identifier.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A single ordered line.
///
/// Immutable once the order exists; copied into every event that needs
/// item detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_cents: Option<i64>,
}

impl OrderItem {
    /// Creates a line with only the fields reservation needs.
    pub fn new(product_id: i64, quantity: u32) -> Self {
        Self {
            product_id: ProductId::new(product_id),
            quantity,
            name: None,
            unit_price_cents: None,
        }
    }

    /// Attaches a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a unit price in cents.
    pub fn with_unit_price_cents(mut self, cents: i64) -> Self {
        self.unit_price_cents = Some(cents);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_validity() {
        assert!(OrderId::new(1).is_valid());
        assert!(!OrderId::new(0).is_valid());
        assert!(!OrderId::new(-4).is_valid());
    }

    #[test]
    fn test_product_ids_order_numerically() {
        let mut ids = vec![ProductId::new(10), ProductId::new(2), ProductId::new(7)];
        ids.sort();
        assert_eq!(ids, vec![ProductId::new(2), ProductId::new(7), ProductId::new(10)]);
    }

    #[test]
    fn test_order_item_builder_sets_optional_fields() {
        let item = OrderItem::new(3, 2)
            .with_name("Garlic Bread")
            .with_unit_price_cents(499);
        assert_eq!(item.product_id, ProductId::new(3));
        assert_eq!(item.quantity, 2);
        assert_eq!(item.name.as_deref(), Some("Garlic Bread"));
        assert_eq!(item.unit_price_cents, Some(499));
    }

    #[test]
    fn test_order_item_json_omits_missing_optionals() {
        let json = serde_json::to_value(OrderItem::new(1, 2)).unwrap();
        assert_eq!(json, serde_json::json!({ "product_id": 1, "quantity": 2 }));
    }
}
