//! In-process data access for stores and their catalog records.
//!
//! Each table sits behind its own tokio `RwLock`. The catalog can be taken
//! offline, after which every operation fails the way an unreachable
//! database would.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Billboard, Category, Color, Order, Product, Size, Store};

pub type Table<T> = RwLock<HashMap<Uuid, T>>;

/// A store-scoped record kept in one of the catalog tables.
pub trait Record: Clone + Send + Sync + 'static {
    /// Body of the 404 returned when the record is missing.
    const NOT_FOUND: &'static str;

    fn id(&self) -> Uuid;
    fn store_id(&self) -> Uuid;
    fn created_at(&self) -> chrono::DateTime<Utc>;
    fn table(catalog: &Catalog) -> &Table<Self>;
}

macro_rules! impl_record {
    ($ty:ty, $field:ident, $not_found:literal) => {
        impl Record for $ty {
            const NOT_FOUND: &'static str = $not_found;

            fn id(&self) -> Uuid {
                self.id
            }

            fn store_id(&self) -> Uuid {
                self.store_id
            }

            fn created_at(&self) -> chrono::DateTime<Utc> {
                self.created_at
            }

            fn table(catalog: &Catalog) -> &Table<Self> {
                &catalog.$field
            }
        }
    };
}

impl_record!(Billboard, billboards, "Billboard not found");
impl_record!(Category, categories, "Category not found");
impl_record!(Color, colors, "Color not found");
impl_record!(Size, sizes, "Size not found");
impl_record!(Product, products, "Product not found");
impl_record!(Order, orders, "Order not found");

pub struct Catalog {
    online: AtomicBool,
    stores: Table<Store>,
    billboards: Table<Billboard>,
    categories: Table<Category>,
    colors: Table<Color>,
    sizes: Table<Size>,
    products: Table<Product>,
    orders: Table<Order>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            stores: RwLock::new(HashMap::new()),
            billboards: RwLock::new(HashMap::new()),
            categories: RwLock::new(HashMap::new()),
            colors: RwLock::new(HashMap::new()),
            sizes: RwLock::new(HashMap::new()),
            products: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Internal("Database unavailable".to_string()))
        }
    }

    /// Reachability check used by the health report.
    pub async fn ping(&self) -> Result<()> {
        self.ensure_online()?;
        let _stores = self.stores.read().await;
        Ok(())
    }

    pub async fn create_store(&self, user_id: &str, name: String) -> Result<Store> {
        self.ensure_online()?;
        let store = Store {
            id: Uuid::new_v4(),
            name,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        self.stores.write().await.insert(store.id, store.clone());
        Ok(store)
    }

    pub async fn stores_for_user(&self, user_id: &str) -> Result<Vec<Store>> {
        self.ensure_online()?;
        let mut stores: Vec<Store> = self
            .stores
            .read()
            .await
            .values()
            .filter(|store| store.user_id == user_id)
            .cloned()
            .collect();
        stores.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(stores)
    }

    pub async fn store(&self, store_id: Uuid) -> Result<Option<Store>> {
        self.ensure_online()?;
        Ok(self.stores.read().await.get(&store_id).cloned())
    }

    pub async fn insert<R: Record>(&self, record: R) -> Result<R> {
        self.ensure_online()?;
        R::table(self).write().await.insert(record.id(), record.clone());
        Ok(record)
    }

    pub async fn get<R: Record>(&self, store_id: Uuid, id: Uuid) -> Result<Option<R>> {
        self.ensure_online()?;
        Ok(R::table(self)
            .read()
            .await
            .get(&id)
            .filter(|record| record.store_id() == store_id)
            .cloned())
    }

    /// All records of a store, newest first.
    pub async fn list<R: Record>(&self, store_id: Uuid) -> Result<Vec<R>> {
        self.ensure_online()?;
        let mut records: Vec<R> = R::table(self)
            .read()
            .await
            .values()
            .filter(|record| record.store_id() == store_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(records)
    }

    /// Replace an existing record of the same store. `None` if there is none.
    pub async fn update<R: Record>(&self, record: R) -> Result<Option<R>> {
        self.ensure_online()?;
        let mut table = R::table(self).write().await;
        match table.get_mut(&record.id()) {
            Some(existing) if existing.store_id() == record.store_id() => {
                *existing = record.clone();
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    pub async fn remove<R: Record>(&self, store_id: Uuid, id: Uuid) -> Result<Option<R>> {
        self.ensure_online()?;
        let mut table = R::table(self).write().await;
        if table.get(&id).is_some_and(|record| record.store_id() == store_id) {
            Ok(table.remove(&id))
        } else {
            Ok(None)
        }
    }

    /// Products of `store_id` among `ids`, in the order requested.
    pub async fn products_by_ids(&self, store_id: Uuid, ids: &[Uuid]) -> Result<Vec<Product>> {
        self.ensure_online()?;
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id))
            .filter(|product| product.store_id == store_id && !product.is_archived)
            .cloned()
            .collect())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(store_id: Uuid, name: &str) -> Color {
        Color {
            id: Uuid::new_v4(),
            store_id,
            name: name.to_string(),
            value: "#000000".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_records_are_scoped_to_store() {
        let catalog = Catalog::new();
        let store_a = catalog.create_store("user_1", "A".to_string()).await.unwrap();
        let store_b = catalog.create_store("user_1", "B".to_string()).await.unwrap();

        let black = catalog.insert(color(store_a.id, "Black")).await.unwrap();

        assert!(catalog.get::<Color>(store_a.id, black.id).await.unwrap().is_some());
        assert!(catalog.get::<Color>(store_b.id, black.id).await.unwrap().is_none());
        assert!(catalog.remove::<Color>(store_b.id, black.id).await.unwrap().is_none());
        assert_eq!(catalog.list::<Color>(store_a.id).await.unwrap().len(), 1);
        assert!(catalog.remove::<Color>(store_a.id, black.id).await.unwrap().is_some());
        assert!(catalog.list::<Color>(store_a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_ownership() {
        let catalog = Catalog::new();
        let store = catalog.create_store("owner", "Shop".to_string()).await.unwrap();

        assert_eq!(catalog.store(store.id).await.unwrap(), Some(store.clone()));
        assert!(catalog.store(Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(catalog.stores_for_user("owner").await.unwrap(), vec![store]);
        assert!(catalog.stores_for_user("intruder").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let catalog = Catalog::new();
        let store_id = Uuid::new_v4();
        let mut red = catalog.insert(color(store_id, "Red")).await.unwrap();

        red.value = "#ff0000".to_string();
        assert!(catalog.update(red.clone()).await.unwrap().is_some());
        assert_eq!(
            catalog.get::<Color>(store_id, red.id).await.unwrap().unwrap().value,
            "#ff0000"
        );

        assert!(catalog.update(color(store_id, "Ghost")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_catalog_fails() {
        let catalog = Catalog::new();
        catalog.set_online(false);

        assert!(catalog.ping().await.is_err());
        assert!(matches!(
            catalog.list::<Color>(Uuid::new_v4()).await,
            Err(AppError::Internal(_))
        ));

        catalog.set_online(true);
        assert!(catalog.ping().await.is_ok());
    }
}
