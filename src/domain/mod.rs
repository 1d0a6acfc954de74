//! Domain model
pub mod product;
pub mod user;
pub mod voucher;

pub use product::{Gender, Product, ProductFilter};
pub use user::{CartLine, Notification, NotificationStatus, Role, User, UserStatus, VoucherClaim};
pub use voucher::{DiscountType, Voucher, VoucherKind};
