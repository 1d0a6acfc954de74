//! Registration and the notification surface of the user document.
//!
//! Credential handling (password hashing, token issuance) and the welcome
//! email belong to external collaborators; registration here covers the
//! persisted side effects: the user document, the welcome voucher, its
//! claim record, and the two greeting notifications.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::user::VoucherClaim;
use crate::domain::{Notification, NotificationStatus, User, Voucher};
use crate::error::{Error, Result};
use crate::service::vouchers::VoucherService;
use crate::store::Store;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    vouchers: VoucherService,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let vouchers = VoucherService::new(store.clone());
        Self { store, vouchers }
    }

    /// Creates a user and issues their welcome voucher. The voucher is
    /// created pre-claimed, so only the claim record and the greeting
    /// notifications are appended here.
    pub async fn register(&self, name: &str, email: &str, phone: &str) -> Result<(User, Voucher)> {
        if name.trim().is_empty() || email.trim().is_empty() || phone.trim().is_empty() {
            return Err(Error::invalid("name, email and phone are required"));
        }
        let mut user = User::new(name.trim(), email.trim(), phone.trim());
        self.store.insert_user(user.clone()).await?;

        let voucher = self.vouchers.issue_welcome(&user).await?;
        user.vouchers.push(VoucherClaim {
            voucher_id: voucher.id,
            is_used: false,
            claimed_at: voucher.created_at,
        });
        user.notify(
            "Registration complete 🎉",
            format!("Welcome {name}! Your account is ready. Start browsing the catalog."),
        );
        user.notify(
            "New user voucher 🎁",
            format!(
                "As a welcome gift you received voucher {}. Use it before {} for 15% off your first purchase.",
                voucher.code,
                voucher.expiry_date.format("%Y-%m-%d")
            ),
        );
        user.touch();
        self.store.put_user(user.clone()).await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok((user, voucher))
    }

    pub async fn get(&self, user_id: Uuid) -> Result<User> {
        self.store.user(user_id).await?.ok_or(Error::NotFound("user"))
    }

    /// Updates email and/or phone, re-checking uniqueness against other
    /// users before persisting.
    pub async fn update_contact(&self, user_id: Uuid, email: Option<String>, phone: Option<String>) -> Result<User> {
        let mut user = self.get(user_id).await?;
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(phone) = phone {
            user.phone = phone;
        }
        user.touch();
        self.store.put_user(user.clone()).await?;
        Ok(user)
    }

    pub async fn notifications(&self, user_id: Uuid, status: Option<NotificationStatus>) -> Result<Vec<Notification>> {
        let user = self.get(user_id).await?;
        Ok(user
            .notifications
            .into_iter()
            .filter(|n| status.map_or(true, |s| n.status == s))
            .collect())
    }

    pub async fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<Notification> {
        let mut user = self.get(user_id).await?;
        let notification = user
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or(Error::NotFound("notification"))?;
        notification.status = NotificationStatus::Read;
        let updated = notification.clone();
        user.touch();
        self.store.put_user(user).await?;
        Ok(updated)
    }

    /// Marks every unread notification read; returns how many changed.
    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        let mut user = self.get(user_id).await?;
        let mut updated = 0;
        for notification in &mut user.notifications {
            if notification.status == NotificationStatus::Unread {
                notification.status = NotificationStatus::Read;
                updated += 1;
            }
        }
        if updated > 0 {
            user.touch();
            self.store.put_user(user).await?;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VoucherKind;
    use crate::store::MemoryStore;

    fn service() -> (UserService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (UserService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn registration_issues_a_claimed_welcome_voucher() {
        let (svc, store) = service();
        let (user, voucher) = svc.register("Dina Putri", "dina@example.com", "0811").await.unwrap();

        assert_eq!(voucher.kind, VoucherKind::NewUser);
        assert_eq!(voucher.claimed_count, 1);
        assert_eq!(voucher.max_use, 1);
        assert!(voucher.code.starts_with("WELCOME-DINAPUTRI-"));

        let stored = store.user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.vouchers.len(), 1);
        assert_eq!(stored.vouchers[0].voucher_id, voucher.id);
        assert!(!stored.vouchers[0].is_used);
        assert_eq!(stored.notifications.len(), 2);
        assert!(stored.notifications.iter().all(|n| n.status == NotificationStatus::Unread));
    }

    #[tokio::test]
    async fn registration_enforces_unique_email_and_phone() {
        let (svc, _) = service();
        svc.register("Dina", "dina@example.com", "0811").await.unwrap();

        let err = svc.register("Dion", "dina@example.com", "0812").await.unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "email", .. }));
        let err = svc.register("Dion", "dion@example.com", "0811").await.unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "phone", .. }));
    }

    #[tokio::test]
    async fn contact_update_rechecks_uniqueness() {
        let (svc, _) = service();
        let (a, _) = svc.register("Dina", "dina@example.com", "0811").await.unwrap();
        svc.register("Dion", "dion@example.com", "0812").await.unwrap();

        let err = svc
            .update_contact(a.id, Some("dion@example.com".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "email", .. }));

        let updated = svc.update_contact(a.id, None, Some("0813".into())).await.unwrap();
        assert_eq!(updated.phone, "0813");
    }

    #[tokio::test]
    async fn notifications_filter_and_mark_read() {
        let (svc, _) = service();
        let (user, _) = svc.register("Dina", "dina@example.com", "0811").await.unwrap();

        let unread = svc.notifications(user.id, Some(NotificationStatus::Unread)).await.unwrap();
        assert_eq!(unread.len(), 2);

        let first = unread[0].id;
        let updated = svc.mark_notification_read(user.id, first).await.unwrap();
        assert_eq!(updated.status, NotificationStatus::Read);
        assert_eq!(
            svc.notifications(user.id, Some(NotificationStatus::Unread)).await.unwrap().len(),
            1
        );

        assert_eq!(svc.mark_all_notifications_read(user.id).await.unwrap(), 1);
        assert_eq!(svc.mark_all_notifications_read(user.id).await.unwrap(), 0);
        assert!(matches!(
            svc.mark_notification_read(user.id, Uuid::new_v4()).await,
            Err(Error::NotFound("notification"))
        ));
    }
}
