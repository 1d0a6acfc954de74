//! Business-rule services over the storage boundary.
//!
//! Each operation is an independent, stateless request-handler invocation;
//! the services hold no locks and rely on the store's per-document atomicity
//! (see [`crate::store`]).

pub mod cart;
pub mod codes;
pub mod users;
pub mod vouchers;
pub mod wishlist;

pub use cart::{CartEntry, CartService};
pub use users::UserService;
pub use vouchers::{ClaimedVoucher, DiscountQuote, NewVoucher, VoucherService, VoucherUpdate};
pub use wishlist::{WishlistService, WishlistToggle};
