//! Shopping basket kept client-side in the `cart` cookie.
//!
//! The cookie only stores product ids and quantities; names, images and prices are
//! looked up from the catalog whenever the basket is rendered. Prices are only used for
//! the on-page totals; the backend recomputes the order amount at checkout.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    models::{NewOrderLine, Product},
    session::{CredentialStore, decode_value},
};

/// Flat delivery charge added to any non-empty basket.
pub const DELIVERY_FEE: f64 = 40.0;

/// What the cookie holds per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub quantity: u32,
}

/// CartLine
///
/// A basket line joined with its catalog entry, as rendered on the cart page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.price.unwrap_or(0.0) * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
}

/// CartView
///
/// What the cart and checkout pages render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub totals: CartTotals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Loads the basket from the credential store. A missing or unreadable cookie is an
    /// empty basket.
    pub fn load<S>(store: &S, key: &str) -> Self
    where
        S: CredentialStore + ?Sized,
    {
        store
            .get(key)
            .and_then(|raw| decode_value(&raw))
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// JSON form written back into the cookie (the caller percent-encodes it).
    pub fn to_json(&self) -> String {
        // Vec<CartItem> serialization cannot fail: every field is a plain value.
        serde_json::to_string(&self.items).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    /// Adds one unit of the product, merging with an existing line for the same id.
    pub fn add(&mut self, id: &str) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.quantity = item.quantity.saturating_add(1);
            return;
        }
        self.items.push(CartItem {
            id: id.to_string(),
            quantity: 1,
        });
    }

    /// Applies `delta` to a line's quantity, never going below one unit.
    /// Returns false when the product is not in the basket.
    pub fn change_quantity(&mut self, id: &str, delta: i32) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        let updated = i64::from(item.quantity) + i64::from(delta);
        item.quantity = u32::try_from(updated.max(1)).unwrap_or(u32::MAX);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drops lines whose product is no longer in `catalog`. Returns true when any was dropped.
    pub fn retain_available(&mut self, catalog: &[Product]) -> bool {
        let before = self.items.len();
        self.items
            .retain(|item| catalog.iter().any(|product| product.id == item.id));
        self.items.len() != before
    }

    /// Joins every line with its catalog entry. Lines missing from `catalog` are skipped.
    pub fn lines(&self, catalog: &[Product]) -> Vec<CartLine> {
        self.items
            .iter()
            .filter_map(|item| {
                let product = catalog.iter().find(|product| product.id == item.id)?;
                Some(CartLine {
                    id: item.id.clone(),
                    name: product.name.clone(),
                    image: product.image.clone(),
                    category: product.category.clone(),
                    price: product.price,
                    quantity: item.quantity,
                })
            })
            .collect()
    }

    pub fn view(&self, catalog: &[Product]) -> CartView {
        let lines = self.lines(catalog);
        let subtotal: f64 = lines.iter().map(CartLine::line_total).sum();
        let delivery_fee = if lines.is_empty() { 0.0 } else { DELIVERY_FEE };
        CartView {
            item_count: lines.iter().map(|line| line.quantity).sum(),
            totals: CartTotals {
                subtotal,
                delivery_fee,
                total: subtotal + delivery_fee,
            },
            lines,
        }
    }

    pub fn order_lines(&self) -> Vec<NewOrderLine> {
        self.items
            .iter()
            .map(|item| NewOrderLine {
                product: item.id.clone(),
                quantity: item.quantity,
            })
            .collect()
    }
}
