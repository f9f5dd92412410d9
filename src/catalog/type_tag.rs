use tracing::info;

use crate::error::CatalogError;
use crate::store::{IndexKey, Store, UnitOfWork};

use super::model::{require_text, TypeTag, NAME_INDEX};

/// TypeTag CRUD.
///
/// Names are case-sensitive and unique among the tags visible to the unit of
/// work. Two units of work racing on the same new name can both commit.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeService;

impl TypeService {
    pub fn new() -> Self {
        Self
    }

    pub fn create<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        name: &str,
    ) -> Result<TypeTag, CatalogError> {
        let name = require_text("name", name)?;
        self.ensure_unique(uow, &name, None)?;
        let tag = TypeTag {
            id: uow.next_id::<TypeTag>()?,
            name,
        };
        uow.persist(&tag)?;
        info!(type_id = tag.id, name = %tag.name, "type created");
        Ok(tag)
    }

    pub fn find<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<Option<TypeTag>, CatalogError> {
        Ok(uow.find(id)?)
    }

    pub fn find_by_name<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        name: &str,
    ) -> Result<Option<TypeTag>, CatalogError> {
        let tags = uow.find_by_index::<TypeTag>(&IndexKey::new(NAME_INDEX, name))?;
        Ok(tags.into_iter().next())
    }

    pub fn list<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
    ) -> Result<Vec<TypeTag>, CatalogError> {
        Ok(uow.find_all()?)
    }

    pub fn update<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
        name: &str,
    ) -> Result<Option<TypeTag>, CatalogError> {
        let name = require_text("name", name)?;
        let Some(mut tag) = uow.find::<TypeTag>(id)? else {
            return Ok(None);
        };
        self.ensure_unique(uow, &name, Some(id))?;
        tag.name = name;
        Ok(Some(uow.merge(&tag)?))
    }

    pub fn delete<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<bool, CatalogError> {
        Ok(uow.remove::<TypeTag>(id)?)
    }

    fn ensure_unique<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        name: &str,
        except: Option<u64>,
    ) -> Result<(), CatalogError> {
        match self.find_by_name(uow, name)? {
            Some(existing) if Some(existing.id) != except => Err(CatalogError::validation(format!(
                "type name '{}' already used by type {}",
                name, existing.id
            ))),
            _ => Ok(()),
        }
    }
}
