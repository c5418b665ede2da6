// Checkout-side escrow payment flow
pub mod processor;
pub mod reference;
pub mod vendors;

pub use processor::{CheckoutOutcome, PaymentProcessor};
pub use vendors::VendorDirectory;
