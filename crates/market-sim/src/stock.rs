//! Shelves and the stock service agents shop from

use std::collections::BTreeMap;

use glam::Vec3;
use market_core::{ProductType, ShelfId};
use market_events::{Event, EventBus};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One physical item taken off a shelf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductHandle {
    pub shelf: ShelfId,
    pub product: ProductType,
}

/// Stock as the agents see it
pub trait StockService {
    fn is_out_of_stock(&self, product: ProductType) -> bool;

    /// Take one item of `product`, if any shelf still carries it
    fn take_one(&mut self, product: ProductType) -> Option<ProductHandle>;

    /// Put a previously taken item back on its shelf
    fn return_item(&mut self, item: ProductHandle);

    /// Where customers go to pick up `product`
    fn product_position(&self, product: ProductType) -> Option<Vec3>;

    /// Every product type the store sells, in a stable order
    fn product_types(&self) -> Vec<ProductType>;

    /// Free slots on a shelf
    fn missing(&self, shelf: ShelfId) -> u32;

    /// Show or hide the restock placeholders on a shelf
    fn set_placeholders(&mut self, shelf: ShelfId, active: bool);
}

/// Static description of a shelf, as loaded from the store layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelfSpec {
    pub name: String,
    pub product: u32,
    pub position: Vec3,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct Shelf {
    pub id: ShelfId,
    pub name: String,
    pub product: ProductType,
    pub position: Vec3,
    pub capacity: u32,
    count: u32,
    placeholders: bool,
}

impl Shelf {
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn placeholders_active(&self) -> bool {
        self.placeholders
    }
}

/// Shelf inventory. Publishes `ShelfDepleted` when a shelf hits zero and
/// `StockPlaced` for every item the player puts back.
#[derive(Debug)]
pub struct Stock {
    shelves: BTreeMap<ShelfId, Shelf>,
    bus: EventBus,
    next_shelf: u32,
}

impl Stock {
    pub fn new(bus: EventBus) -> Self {
        Self {
            shelves: BTreeMap::new(),
            bus,
            next_shelf: 0,
        }
    }

    pub fn from_specs(bus: EventBus, specs: &[ShelfSpec]) -> Self {
        let mut stock = Self::new(bus);
        for spec in specs {
            stock.add_shelf(
                spec.name.clone(),
                ProductType(spec.product),
                spec.position,
                spec.capacity,
            );
        }
        stock
    }

    /// Add a full shelf
    pub fn add_shelf(
        &mut self,
        name: impl Into<String>,
        product: ProductType,
        position: Vec3,
        capacity: u32,
    ) -> ShelfId {
        let id = ShelfId(self.next_shelf);
        self.next_shelf += 1;
        self.shelves.insert(
            id,
            Shelf {
                id,
                name: name.into(),
                product,
                position,
                capacity,
                count: capacity,
                placeholders: false,
            },
        );
        id
    }

    pub fn shelf(&self, id: ShelfId) -> Option<&Shelf> {
        self.shelves.get(&id)
    }

    pub fn shelves(&self) -> impl Iterator<Item = &Shelf> {
        self.shelves.values()
    }

    /// Items of `product` across all shelves
    pub fn available(&self, product: ProductType) -> u32 {
        self.shelves
            .values()
            .filter(|s| s.product == product)
            .map(|s| s.count)
            .sum()
    }

    /// Player places one item on a shelf with active placeholders
    pub fn place_item(&mut self, shelf: ShelfId) -> bool {
        let Some(entry) = self.shelves.get_mut(&shelf) else {
            return false;
        };
        if !entry.placeholders || entry.count >= entry.capacity {
            return false;
        }
        entry.count += 1;
        debug!(%shelf, count = entry.count, "stock placed");
        self.bus.publish(Event::StockPlaced { shelf });
        true
    }

    /// Fill every shelf back to capacity (start of a new day)
    pub fn refill_all(&mut self) {
        for shelf in self.shelves.values_mut() {
            shelf.count = shelf.capacity;
            shelf.placeholders = false;
        }
    }
}

impl StockService for Stock {
    fn is_out_of_stock(&self, product: ProductType) -> bool {
        self.available(product) == 0
    }

    fn take_one(&mut self, product: ProductType) -> Option<ProductHandle> {
        let shelf = self
            .shelves
            .values_mut()
            .find(|s| s.product == product && s.count > 0)?;
        shelf.count -= 1;
        let item = ProductHandle {
            shelf: shelf.id,
            product,
        };
        if shelf.count == 0 {
            info!(shelf = %shelf.id, name = %shelf.name, "shelf depleted");
            self.bus.publish(Event::ShelfDepleted {
                shelf: item.shelf,
                product,
            });
        }
        Some(item)
    }

    fn return_item(&mut self, item: ProductHandle) {
        if let Some(shelf) = self.shelves.get_mut(&item.shelf) {
            shelf.count = (shelf.count + 1).min(shelf.capacity);
        }
    }

    fn product_position(&self, product: ProductType) -> Option<Vec3> {
        self.shelves
            .values()
            .find(|s| s.product == product)
            .map(|s| s.position)
    }

    fn product_types(&self) -> Vec<ProductType> {
        let mut products: Vec<ProductType> = self.shelves.values().map(|s| s.product).collect();
        products.sort();
        products.dedup();
        products
    }

    fn missing(&self, shelf: ShelfId) -> u32 {
        self.shelves
            .get(&shelf)
            .map(|s| s.capacity - s.count)
            .unwrap_or(0)
    }

    fn set_placeholders(&mut self, shelf: ShelfId, active: bool) {
        if let Some(shelf) = self.shelves.get_mut(&shelf) {
            shelf.placeholders = active;
        }
    }
}
