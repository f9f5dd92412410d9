use tracing::info;

use crate::error::CatalogError;
use crate::outbox::{AccountCreated, OutboxRecorder};
use crate::store::{Store, UnitOfWork};

use super::model::{require_text, AccountUser};

/// Account users. Creating one announces it through the outbox.
#[derive(Clone, Default)]
pub struct AccountService {
    recorder: OutboxRecorder,
}

impl AccountService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recorder(recorder: OutboxRecorder) -> Self {
        Self { recorder }
    }

    /// Stage the user and its `AccountCreated` notification in `uow`.
    ///
    /// Nothing is published here; the dispatcher picks the record up once the
    /// unit of work has committed.
    pub fn create_user<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        name: &str,
        email: &str,
    ) -> Result<AccountUser, CatalogError> {
        let name = require_text("name", name)?;
        let email = require_text("email", email)?;
        let user = AccountUser {
            id: uow.next_id::<AccountUser>()?,
            name,
            email,
        };
        uow.persist(&user)?;

        let record = self.recorder.record(
            uow,
            &AccountCreated {
                user_id: user.id,
                name: user.name.clone(),
                email: user.email.clone(),
            },
        )?;
        info!(user_id = user.id, outbox_id = record.id, "account user created");
        Ok(user)
    }

    pub fn find_user<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<Option<AccountUser>, CatalogError> {
        Ok(uow.find(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::{OutboxStatus, OutboxStore};
    use crate::store::InMemoryStore;

    #[test]
    fn user_and_notification_commit_together() {
        let store = InMemoryStore::new();
        let accounts = AccountService::new();

        let user = store
            .transaction(|uow| accounts.create_user(uow, "Red", "red@kanto.com"))
            .unwrap();

        let records = store.outbox_records_by_status(OutboxStatus::Pending).unwrap();
        assert_eq!(records.len(), 1);
        let event: AccountCreated = records[0].decode().unwrap();
        assert_eq!(event.user_id, user.id);
        assert_eq!(event.email, "red@kanto.com");
        assert_eq!(records[0].attempts, 0);
    }

    #[test]
    fn failed_unit_of_work_leaves_neither_user_nor_notification() {
        let store = InMemoryStore::new();
        let accounts = AccountService::new();

        let result: Result<(), CatalogError> = store.transaction(|uow| {
            accounts.create_user(uow, "Blue", "blue@kanto.com")?;
            Err(CatalogError::validation("later step failed"))
        });

        assert!(result.is_err());
        assert_eq!(store.count("users").unwrap(), 0);
        assert!(store.outbox_records_pending().unwrap().is_empty());
    }

    #[test]
    fn invalid_user_records_nothing() {
        let store = InMemoryStore::new();
        let mut uow = store.begin();
        assert!(AccountService::new().create_user(&mut uow, "", "x@y.z").is_err());
        assert_eq!(uow.pending_writes(), 0);
    }
}
