//! Storage boundary.
//!
//! The services talk to a document store through the [`Store`] trait. The
//! contract mirrors what the business rules need from the database and
//! nothing more: atomic single-document writes, unique-index enforcement on
//! voucher codes (case-insensitive) and user email/phone, and two atomic
//! *conditional* updates — [`Store::try_claim`] and [`Store::push_claim`] —
//! that fold a check-then-act sequence into one operation so concurrent
//! claims cannot overshoot a voucher's cap.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{DiscountType, Product, User, Voucher, VoucherKind};
use crate::error::Result;

pub use memory::MemoryStore;

/// Lookup used by the voucher code generator. Kept separate from [`Store`]
/// so collision behavior can be tested against a minimal fake.
#[async_trait]
pub trait CodeIndex: Send + Sync {
    /// True when a voucher with this code exists, compared case-insensitively.
    async fn code_taken(&self, code: &str) -> Result<bool>;
}

/// Filters for the admin voucher listing.
#[derive(Clone, Debug, Default)]
pub struct VoucherQuery {
    /// Case-insensitive substring match on the title.
    pub title: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub kind: Option<VoucherKind>,
}

/// Outcome of the atomic conditional claim update.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The counter was incremented; carries the updated voucher.
    Claimed(Voucher),
    NotFound,
    Inactive,
    LimitReached,
}

#[async_trait]
pub trait Store: CodeIndex {
    // --- users ---

    /// Inserts a user, enforcing email and phone uniqueness (`Conflict`).
    async fn insert_user(&self, user: User) -> Result<()>;
    async fn user(&self, id: Uuid) -> Result<Option<User>>;
    /// Replaces the whole user document (atomic per document), enforcing
    /// email and phone uniqueness against other users.
    async fn put_user(&self, user: User) -> Result<()>;
    /// Atomically appends a claim record for `voucher_id` to the user,
    /// rejecting with `AlreadyClaimed` if one is already present.
    async fn push_claim(&self, user_id: Uuid, voucher_id: Uuid) -> Result<()>;
    /// Removes the user's claim record for `voucher_id`, if any.
    async fn pull_claim(&self, user_id: Uuid, voucher_id: Uuid) -> Result<()>;
    /// Removes the claim record for `voucher_id` from every user document.
    /// Returns the number of users touched. Best-effort batch: no isolation
    /// against claims running concurrently with the sweep.
    async fn pull_claim_from_all(&self, voucher_id: Uuid) -> Result<u64>;

    // --- products ---

    async fn insert_product(&self, product: Product) -> Result<()>;
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn put_product(&self, product: Product) -> Result<()>;
    /// Returns false when the product did not exist. Cart and wishlist
    /// references to it are left dangling on purpose; reads prune them.
    async fn delete_product(&self, id: Uuid) -> Result<bool>;
    /// Atomically adds `delta` to the product's stock in one conditional
    /// update; a decrement that would push stock below zero fails with
    /// `InsufficientStock` and leaves the document untouched. This is the
    /// only mutation path for stock after creation.
    async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<Product>;
    /// Newest first. Returns the page plus the total count.
    async fn list_products(&self, limit: u32, offset: u64) -> Result<(Vec<Product>, u64)>;

    // --- vouchers ---

    /// Inserts a voucher, enforcing case-insensitive code uniqueness.
    async fn insert_voucher(&self, voucher: Voucher) -> Result<()>;
    async fn voucher(&self, id: Uuid) -> Result<Option<Voucher>>;
    async fn voucher_by_code(&self, code: &str) -> Result<Option<Voucher>>;
    /// Replaces the voucher document, enforcing code uniqueness against
    /// other vouchers.
    async fn put_voucher(&self, voucher: Voucher) -> Result<()>;
    async fn delete_voucher(&self, id: Uuid) -> Result<bool>;
    /// Newest first. Returns the page plus the total count under the query.
    async fn list_vouchers(&self, query: &VoucherQuery, limit: u32, offset: u64) -> Result<(Vec<Voucher>, u64)>;
    /// Atomically increments `claimed_count` if and only if the voucher is
    /// active and still below `max_use`. One store operation; this is what
    /// keeps `claimed_count <= max_use` under concurrent claims.
    async fn try_claim(&self, id: Uuid) -> Result<ClaimOutcome>;
}
