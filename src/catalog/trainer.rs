use tracing::info;

use crate::error::CatalogError;
use crate::store::{Store, UnitOfWork};

use super::model::{require_text, Trainer};

/// Trainer CRUD.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrainerService;

impl TrainerService {
    pub fn new() -> Self {
        Self
    }

    pub fn create<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        name: &str,
        email: &str,
    ) -> Result<Trainer, CatalogError> {
        let name = require_text("name", name)?;
        let email = require_text("email", email)?;
        let trainer = Trainer {
            id: uow.next_id::<Trainer>()?,
            name,
            email,
        };
        uow.persist(&trainer)?;
        info!(trainer_id = trainer.id, "trainer created");
        Ok(trainer)
    }

    pub fn find<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<Option<Trainer>, CatalogError> {
        Ok(uow.find(id)?)
    }

    pub fn list<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
    ) -> Result<Vec<Trainer>, CatalogError> {
        Ok(uow.find_all()?)
    }

    /// Returns `None` when there is no such trainer.
    pub fn update<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
        name: &str,
        email: &str,
    ) -> Result<Option<Trainer>, CatalogError> {
        let Some(mut trainer) = uow.find::<Trainer>(id)? else {
            return Ok(None);
        };
        trainer.name = require_text("name", name)?;
        trainer.email = require_text("email", email)?;
        Ok(Some(uow.merge(&trainer)?))
    }

    /// Removing an unknown id is a no-op. Captures of the trainer are left in
    /// place.
    pub fn delete<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<bool, CatalogError> {
        Ok(uow.remove::<Trainer>(id)?)
    }
}
