//! Shopping cart sink.
//!
//! A finished build is handed to a [`CartSink`] one part at a time. The
//! bundled [`FileCart`] keeps the storefront's cart semantics: one line per
//! product id, quantities merged on repeat adds, stock limits enforced per
//! add, and the whole cart rewritten to a JSON file after every change.

use crate::money::Price;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Payload handed to a cart for one product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub name: String,
    pub price: Price,
    pub image_url: String,
    /// Stock at the time the item was picked; caps the quantity in the cart
    pub stock_count: u32,
}

/// Reasons a cart refuses a change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("only {stock} of {id} in stock ({in_cart} already in cart, {requested} requested)")]
    StockExceeded {
        id: String,
        requested: u32,
        in_cart: u32,
        stock: u32,
    },

    #[error("{0} is not in the cart")]
    NotInCart(String),

    #[error("failed to save cart: {0}")]
    Persist(String),
}

/// Destination for finished builds
pub trait CartSink {
    /// Add `quantity` units of `item`.
    fn add(&mut self, item: &CartItem, quantity: u32) -> std::result::Result<(), CartError>;

    /// Take back `quantity` units previously added. Used to undo a partially
    /// applied all-or-nothing handoff.
    fn remove(&mut self, id: &str, quantity: u32) -> std::result::Result<(), CartError>;
}

/// One line of the persisted cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: String,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: String,
    pub qty: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> Price {
        self.price.times(self.qty)
    }
}

/// Cart persisted to a JSON file after every mutation
#[derive(Debug, Clone, Default)]
pub struct FileCart {
    path: Option<PathBuf>,
    lines: Vec<CartLine>,
}

impl FileCart {
    /// A cart that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the cart stored at `path`.
    ///
    /// A missing, unreadable or non-array file yields an empty cart. Lines
    /// whose `qty` is missing or not a positive integer are healed to 1;
    /// lines that are otherwise malformed are dropped.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let lines = match fs::read_to_string(&path) {
            Ok(content) => Self::parse_lines(&content),
            Err(e) => {
                tracing::debug!("No cart at {:?} ({}), starting empty", path, e);
                Vec::new()
            }
        };

        Self {
            path: Some(path),
            lines,
        }
    }

    fn parse_lines(content: &str) -> Vec<CartLine> {
        let values = match serde_json::from_str::<serde_json::Value>(content) {
            Ok(serde_json::Value::Array(values)) => values,
            Ok(_) | Err(_) => {
                tracing::warn!("Cart file is not a JSON array, starting empty");
                return Vec::new();
            }
        };

        values
            .into_iter()
            .filter_map(|mut value| {
                let qty = value
                    .get("qty")
                    .and_then(serde_json::Value::as_u64)
                    .filter(|q| *q > 0)
                    .and_then(|q| u32::try_from(q).ok())
                    .unwrap_or(1);
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("qty".to_string(), qty.into());
                }
                match serde_json::from_value::<CartLine>(value) {
                    Ok(line) => Some(line),
                    Err(e) => {
                        tracing::warn!("Dropping malformed cart line: {}", e);
                        None
                    }
                }
            })
            .collect()
    }

    /// Write the cart to its file. No-op for in-memory carts.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json =
            serde_json::to_string_pretty(&self.lines).context("Failed to serialize cart to JSON")?;
        fs::write(path, json).with_context(|| format!("Failed to write cart to {:?}", path))?;
        Ok(())
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn quantity_of(&self, id: &str) -> u32 {
        self.lines
            .iter()
            .find(|line| line.id == id)
            .map_or(0, |line| line.qty)
    }

    /// Total number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.qty).sum()
    }

    pub fn total(&self) -> Price {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Apply `change` and persist; the in-memory cart is restored if saving fails.
    fn commit<F>(&mut self, change: F) -> std::result::Result<(), CartError>
    where
        F: FnOnce(&mut Vec<CartLine>) -> std::result::Result<(), CartError>,
    {
        let before = self.lines.clone();
        change(&mut self.lines)?;
        if let Err(e) = self.save() {
            self.lines = before;
            return Err(CartError::Persist(format!("{e:#}")));
        }
        Ok(())
    }
}

impl CartSink for FileCart {
    fn add(&mut self, item: &CartItem, quantity: u32) -> std::result::Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let in_cart = self.quantity_of(&item.id);
        if in_cart.saturating_add(quantity) > item.stock_count {
            return Err(CartError::StockExceeded {
                id: item.id.clone(),
                requested: quantity,
                in_cart,
                stock: item.stock_count,
            });
        }

        self.commit(|lines| {
            match lines.iter_mut().find(|line| line.id == item.id) {
                Some(line) => line.qty += quantity,
                None => lines.push(CartLine {
                    id: item.id.clone(),
                    name: item.name.clone(),
                    price: item.price,
                    image: item.image_url.clone(),
                    qty: quantity,
                }),
            }
            Ok(())
        })?;

        tracing::debug!("Cart: added {} x {}", quantity, item.id);
        Ok(())
    }

    fn remove(&mut self, id: &str, quantity: u32) -> std::result::Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        self.commit(|lines| {
            let index = lines
                .iter()
                .position(|line| line.id == id)
                .ok_or_else(|| CartError::NotInCart(id.to_string()))?;
            if lines[index].qty <= quantity {
                lines.remove(index);
            } else {
                lines[index].qty -= quantity;
            }
            Ok(())
        })
    }
}
