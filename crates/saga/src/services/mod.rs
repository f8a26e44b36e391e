//! Event handlers of the inventory, kitchen and delivery services.

pub mod delivery;
pub mod inventory;
pub mod kitchen;

pub use delivery::DeliveryService;
pub use inventory::InventoryService;
pub use kitchen::KitchenService;
